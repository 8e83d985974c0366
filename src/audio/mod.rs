pub mod calibrate_exercise;
pub mod capture;
pub mod challenge_exercise;
pub mod devices;
pub mod practice_exercise;
pub mod prompt;
