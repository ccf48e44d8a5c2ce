/// Tuning parameters shared by the resample and playback stages.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Resampler input chunk size in frames.
    pub chunk_frames: usize,
    /// Max samples pulled per output callback refill.
    pub refill_max_frames: usize,
    /// Target buffer duration for queue sizing.
    pub buffer_seconds: f32,
}

impl Default for PlayerConfig {
    /// Defaults tuned for low-risk playback across common devices.
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
        }
    }
}
