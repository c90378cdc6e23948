use anyhow::{bail, Result};
use serde::Serialize;

/// Who currently holds the shared audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioOwner {
    Released,
    Listening(u64),
    Speaking(u64),
}

/// Single-owner token for the audio device shared by recognition and
/// synthesis. Listening and speaking never hold it at the same time.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    owner: AudioOwner,
}

impl Default for AudioDevice {
    fn default() -> Self {
        Self {
            owner: AudioOwner::Released,
        }
    }
}

impl AudioDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> AudioOwner {
        self.owner
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.owner, AudioOwner::Speaking(_))
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.owner, AudioOwner::Listening(_))
    }

    /// Fails while an utterance holds the device.
    pub fn claim_for_listening(&mut self, worker_id: u64) -> Result<()> {
        if let AudioOwner::Speaking(speaker) = self.owner {
            bail!("audio device busy speaking (utterance {speaker})");
        }
        self.owner = AudioOwner::Listening(worker_id);
        Ok(())
    }

    /// Always succeeds and evicts whoever held the device. Returns the
    /// previous owner so the caller can shut it down.
    pub fn claim_for_speaking(&mut self, worker_id: u64) -> AudioOwner {
        std::mem::replace(&mut self.owner, AudioOwner::Speaking(worker_id))
    }

    /// Releases only if `owner` is still the holder; stale releases are no-ops.
    pub fn release(&mut self, owner: AudioOwner) -> bool {
        if self.owner == owner {
            self.owner = AudioOwner::Released;
            true
        } else {
            false
        }
    }

    pub fn release_all(&mut self) {
        self.owner = AudioOwner::Released;
    }
}
