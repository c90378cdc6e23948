use std::{fs, path::Path};

use anyhow::{bail, Context, Result};

use crate::models::{Exercise, Workout};

pub const PRESET_NAMES: [&str; 3] = ["option1", "option2", "option3"];

/// Built-in workouts offered by the console runner.
pub fn preset(name: &str) -> Option<Workout> {
    let exercises = match name {
        "option1" => vec![
            Exercise::new("Push-ups", 30, "Standard push-ups"),
            Exercise::new("Squats", 45, "Bodyweight squats"),
            Exercise::new("Plank", 60, "Hold plank position"),
        ],
        "option2" => vec![
            Exercise::new("Pull-ups", 30, "Standard pull-ups"),
            Exercise::new("Jumping Jacks", 45, "Standard jumping jacks"),
            Exercise::new("Pull-ups", 20, "Standard pull-ups"),
        ],
        "option3" => vec![
            Exercise::new("Plank", 30, "Hold plank position"),
            Exercise::new("Sit-ups", 45, "Standard sit ups"),
            Exercise::new("Push-ups", 45, "Standard push ups"),
            Exercise::new("Plank", 60, "Hold plank position"),
        ],
        _ => return None,
    };
    Some(Workout::new(exercises))
}

/// Reads a workout from a JSON file shaped like `{"exercises": [...]}`.
pub fn load_workout(path: &Path) -> Result<Workout> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read workout from {}", path.display()))?;
    let workout: Workout = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid workout file {}", path.display()))?;

    if let Some(bad) = workout.exercises.iter().find(|e| e.duration == 0) {
        bail!("exercise '{}' must have a positive duration", bad.name);
    }

    Ok(workout)
}

/// Resolves a preset name first, then falls back to treating `source` as a path.
pub fn resolve(source: &str) -> Result<Workout> {
    match preset(source) {
        Some(workout) => Ok(workout),
        None => load_workout(Path::new(source)),
    }
}
