mod workout;

pub use workout::{Exercise, Workout};
