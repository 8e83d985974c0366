pub mod feed;
pub mod hold_meter;
pub mod pitch_display;
pub mod scale_ladder;
pub mod timer;
pub mod volume_meter;
