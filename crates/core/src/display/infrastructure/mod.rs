pub mod fan_out_display;
pub mod recording_display;
pub mod snapshot_display;
pub mod window_display;
