use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    /// Length of the exercise in whole seconds.
    pub duration: u32,
    pub description: String,
}

impl Exercise {
    pub fn new(name: impl Into<String>, duration: u32, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration,
            description: description.into(),
        }
    }
}

/// Ordered list of exercises. An empty workout means "no workout".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub exercises: Vec<Exercise>,
}

impl Workout {
    pub fn new(exercises: Vec<Exercise>) -> Self {
        Self { exercises }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn exercise(&self, index: usize) -> Option<&Exercise> {
        self.exercises.get(index)
    }

    pub fn total_seconds(&self) -> u64 {
        self.exercises.iter().map(|e| u64::from(e.duration)).sum()
    }
}
