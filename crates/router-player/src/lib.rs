pub mod clip;
pub mod config;
pub mod device;
pub mod playback;
pub mod queue;
pub mod resample;
pub mod route;
