//! Output stream stage (CPAL, one routed hardware channel).
//!
//! Builds the CPAL output stream and provides the real-time audio callback.
//! The callback:
//! - refills a small local buffer from the sample queue without blocking
//! - writes each mono sample to exactly one slot of the interleaved frame,
//!   silence to every other slot
//! - converts `f32` samples to the device sample format
//!
//! A stream error raises the shared failure flag and closes the queue so the
//! blocked play call can bail out instead of waiting forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::DeviceTrait;
use thiserror::Error;

use crate::device::DeviceError;
use crate::queue::SampleQueue;

/// Failures while routing a clip to a device channel.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("no output device with id {id}")]
    DeviceNotFound { id: usize },

    #[error("{label}: {channels} output channels, need at least {needed}")]
    TooFewChannels {
        label: String,
        channels: u16,
        needed: u16,
    },

    #[error("unsupported sample format {format:?}")]
    UnsupportedSampleFormat { format: cpal::SampleFormat },

    #[error("build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("output stream failed while playing {clip}")]
    Stream { clip: String },

    #[error("resample {clip}: {reason}")]
    Resample { clip: String, reason: String },
}

/// Build a CPAL output stream that plays mono audio from `queue` on a single
/// hardware channel.
///
/// `slot` is the 0-based position of that channel within an interleaved
/// output frame; every other slot gets silence. The queue must already be at
/// the stream's sample rate.
pub fn build_routed_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    slot: usize,
    refill_max_frames: usize,
    failed: &Arc<AtomicBool>,
) -> Result<cpal::Stream, PlaybackError> {
    match sample_format {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(device, config, queue, slot, refill_max_frames, failed)
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(device, config, queue, slot, refill_max_frames, failed)
        }
        cpal::SampleFormat::I32 => {
            build_stream::<i32>(device, config, queue, slot, refill_max_frames, failed)
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(device, config, queue, slot, refill_max_frames, failed)
        }
        other => Err(PlaybackError::UnsupportedSampleFormat { format: other }),
    }
}

/// Type-specialized stream builder for CPAL sample formats.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    slot: usize,
    refill_max_frames: usize,
    failed: &Arc<AtomicBool>,
) -> Result<cpal::Stream, PlaybackError>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;

    let state = Arc::new(Mutex::new(FillState {
        pos: 0,
        src: Vec::new(),
    }));

    let refill_max = refill_max_frames.max(1);
    let queue_cb = queue.clone();

    let failed_err = failed.clone();
    let queue_err = queue.clone();
    let err_fn = move |err| {
        tracing::warn!("output stream error: {err}");
        failed_err.store(true, Ordering::Relaxed);
        // Unblock a producer stuck in push_blocking.
        queue_err.close();
    };

    let state_cb = state.clone();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let mut st = state_cb.lock().unwrap();

            let silence = <T as cpal::Sample>::from_sample::<f32>(0.0);
            let frames = data.len() / channels_out;

            for frame in 0..frames {
                if st.pos >= st.src.len() {
                    st.pos = 0;
                    st.src.clear();
                    if let Some(v) = queue_cb.pop_up_to(refill_max) {
                        st.src = v;
                    } else {
                        // No audio ready; fill the rest with silence.
                        for idx in (frame * channels_out)..data.len() {
                            data[idx] = silence;
                        }
                        break;
                    }
                }

                let sample = st.src[st.pos];
                st.pos += 1;

                for ch in 0..channels_out {
                    data[frame * channels_out + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(routed_sample(ch, slot, sample));
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Local refill buffer state for the CPAL callback.
///
/// A small Vec of mono samples fetched from the queue keeps the callback from
/// locking the queue on every frame.
struct FillState {
    pos: usize,
    src: Vec<f32>,
}

/// The routed value for one slot of an interleaved frame: the sample on the
/// mapped slot, silence everywhere else.
fn routed_sample(ch: usize, slot: usize, sample: f32) -> f32 {
    if ch == slot { sample } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routed_frame_is_silent_off_slot() {
        let frame: Vec<f32> = (0..4).map(|ch| routed_sample(ch, 2, 0.7)).collect();
        assert_eq!(frame, vec![0.0, 0.0, 0.7, 0.0]);
    }

    #[test]
    fn routed_frame_stereo_left_and_right() {
        let left: Vec<f32> = (0..2).map(|ch| routed_sample(ch, 0, 0.5)).collect();
        let right: Vec<f32> = (0..2).map(|ch| routed_sample(ch, 1, 0.5)).collect();
        assert_eq!(left, vec![0.5, 0.0]);
        assert_eq!(right, vec![0.0, 0.5]);
    }
}
