//! Channel routing and sequential playback.
//!
//! The routing table is fixed: the left logical channel always plays on
//! hardware channel 1 and the right on hardware channel 2, one after the
//! other. `play_selection` blocks until both channels have fully played or
//! the first failure; callers rely on that ordering.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use cpal::traits::StreamTrait;

use crate::clip::AudioClip;
use crate::config::PlayerConfig;
use crate::device::{self, OutputDevice};
use crate::playback::{self, PlaybackError};
use crate::queue::{self, SampleQueue};
use crate::resample;

/// Logical output channel of the routing surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    /// The 1-based hardware output channel this logical channel always maps
    /// to. The mapping never changes at runtime.
    pub fn hardware_channel(self) -> u16 {
        match self {
            Channel::Left => 1,
            Channel::Right => 2,
        }
    }

    /// 0-based slot within an interleaved output frame.
    pub(crate) fn frame_slot(self) -> usize {
        usize::from(self.hardware_channel() - 1)
    }
}

/// Minimum hardware channels a device needs before any routing is attempted.
const MIN_OUTPUT_CHANNELS: u16 = 2;

struct RouteStep<'a> {
    channel: Channel,
    clip: &'a AudioClip,
}

/// The fixed two-step plan: left first, then right.
fn route_plan<'a>(left: &'a AudioClip, right: &'a AudioClip) -> [RouteStep<'a>; 2] {
    [
        RouteStep {
            channel: Channel::Left,
            clip: left,
        },
        RouteStep {
            channel: Channel::Right,
            clip: right,
        },
    ]
}

fn run_plan<F>(plan: [RouteStep<'_>; 2], mut play_step: F) -> Result<(), PlaybackError>
where
    F: FnMut(Channel, &AudioClip) -> Result<(), PlaybackError>,
{
    for step in plan {
        play_step(step.channel, step.clip)?;
    }
    Ok(())
}

fn ensure_routable(device: &OutputDevice) -> Result<(), PlaybackError> {
    if device.max_output_channels < MIN_OUTPUT_CHANNELS {
        return Err(PlaybackError::TooFewChannels {
            label: device.label(),
            channels: device.max_output_channels,
            needed: MIN_OUTPUT_CHANNELS,
        });
    }
    Ok(())
}

/// Play `left` on hardware channel 1, then `right` on hardware channel 2.
///
/// The device id is re-resolved against a fresh enumeration; an id that no
/// longer names an output-capable device fails before any playback starts,
/// as does a device with fewer than two output channels. A failure on the
/// left channel means the right channel is never attempted.
pub fn play_selection(
    host: &cpal::Host,
    device_id: usize,
    left: &AudioClip,
    right: &AudioClip,
    cfg: &PlayerConfig,
) -> Result<(), PlaybackError> {
    let resolved = device::output_device_by_id(host, device_id)?;
    let (device, info) =
        resolved.ok_or(PlaybackError::DeviceNotFound { id: device_id })?;
    ensure_routable(&info)?;

    let label = info.label();
    run_plan(route_plan(left, right), |channel, clip| {
        tracing::info!(
            device = %label,
            hw_channel = channel.hardware_channel(),
            clip = clip.name(),
            duration_ms = clip.duration_ms(),
            "playing clip"
        );
        play_one_channel(&device, &label, channel, clip, cfg)
    })
}

/// Play one clip on one hardware channel, blocking until it has drained.
fn play_one_channel(
    device: &cpal::Device,
    label: &str,
    channel: Channel,
    clip: &AudioClip,
    cfg: &PlayerConfig,
) -> Result<(), PlaybackError> {
    let config = device::pick_output_config(device, label, clip.sample_rate(), MIN_OUTPUT_CHANNELS)?;
    let mut stream_config: cpal::StreamConfig = config.clone().into();
    if let Some(buf) = device::pick_buffer_size(&config) {
        stream_config.buffer_size = buf;
    }

    // The config pick filters by channel count, but a stream that cannot
    // reach this channel's slot would play it as pure silence, so re-check
    // against the config actually opened.
    if usize::from(stream_config.channels) <= channel.frame_slot() {
        return Err(PlaybackError::TooFewChannels {
            label: label.to_string(),
            channels: stream_config.channels,
            needed: channel.hardware_channel(),
        });
    }

    let samples = prepare_samples(clip, stream_config.sample_rate, cfg.chunk_frames)?;

    let queue = Arc::new(SampleQueue::new(queue::queue_capacity(
        stream_config.sample_rate,
        cfg.buffer_seconds,
    )));
    let failed = Arc::new(AtomicBool::new(false));

    let stream = playback::build_routed_stream(
        device,
        &stream_config,
        config.sample_format(),
        &queue,
        channel.frame_slot(),
        cfg.refill_max_frames,
        &failed,
    )?;
    stream.play()?;

    queue.push_blocking(&samples);
    queue.close();

    let drained = queue::wait_until_drained_or_failed(&queue, &failed);

    // The queue draining means the callback has consumed the audio, not that
    // the device has played it; wait out the buffered tail before teardown.
    thread::sleep(playout_grace(
        &stream_config.buffer_size,
        cfg.refill_max_frames,
        stream_config.sample_rate,
    ));
    drop(stream);

    if !drained {
        return Err(PlaybackError::Stream {
            clip: clip.name().to_string(),
        });
    }
    Ok(())
}

/// Samples at the stream's rate: the clip's own buffer when the rates already
/// match, an offline-resampled copy otherwise.
fn prepare_samples<'a>(
    clip: &'a AudioClip,
    stream_rate: u32,
    chunk_frames: usize,
) -> Result<Cow<'a, [f32]>, PlaybackError> {
    if stream_rate == clip.sample_rate() {
        return Ok(Cow::Borrowed(clip.samples()));
    }
    let resampled = resample::resample_clip(
        clip.samples(),
        clip.sample_rate(),
        stream_rate,
        chunk_frames,
        clip.name(),
    )?;
    Ok(Cow::Owned(resampled))
}

/// Worst-case audio still in flight after the queue drains: the stream's own
/// buffer plus the callback's refill buffer, at the stream rate, plus a small
/// fixed margin.
fn playout_grace(buffer_size: &cpal::BufferSize, refill_max_frames: usize, rate_hz: u32) -> Duration {
    let frames = match buffer_size {
        cpal::BufferSize::Fixed(n) => u64::from(*n),
        cpal::BufferSize::Default => 4_096,
    } + refill_max_frames as u64;
    Duration::from_millis(frames.saturating_mul(1_000) / u64::from(rate_hz.max(1)) + 50)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(name: &str) -> AudioClip {
        AudioClip::from_samples(name, 48_000, vec![0.0; 480])
    }

    fn output_device(channels: u16) -> OutputDevice {
        OutputDevice {
            id: 3,
            name: "Test Device".into(),
            max_output_channels: channels,
        }
    }

    #[test]
    fn hardware_mapping_is_fixed() {
        assert_eq!(Channel::Left.hardware_channel(), 1);
        assert_eq!(Channel::Right.hardware_channel(), 2);
        assert_eq!(Channel::Left.frame_slot(), 0);
        assert_eq!(Channel::Right.frame_slot(), 1);
    }

    #[test]
    fn plan_is_left_then_right() {
        let (ba, da) = (clip("ba"), clip("da"));
        let plan = route_plan(&ba, &da);

        assert_eq!(plan[0].channel, Channel::Left);
        assert_eq!(plan[0].clip.name(), "ba");
        assert_eq!(plan[1].channel, Channel::Right);
        assert_eq!(plan[1].clip.name(), "da");
    }

    #[test]
    fn run_plan_executes_steps_in_order() {
        let (ba, da) = (clip("ba"), clip("da"));
        let mut steps = Vec::new();

        run_plan(route_plan(&ba, &da), |channel, clip| {
            steps.push((channel, clip.name().to_string()));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            steps,
            vec![
                (Channel::Left, "ba".to_string()),
                (Channel::Right, "da".to_string()),
            ]
        );
    }

    #[test]
    fn run_plan_stops_after_first_failure() {
        let (ba, da) = (clip("ba"), clip("da"));
        let mut steps = Vec::new();

        let err = run_plan(route_plan(&ba, &da), |channel, clip| {
            steps.push((channel, clip.name().to_string()));
            Err(PlaybackError::Stream {
                clip: clip.name().to_string(),
            })
        })
        .unwrap_err();

        assert_eq!(steps, vec![(Channel::Left, "ba".to_string())]);
        assert!(matches!(err, PlaybackError::Stream { clip } if clip == "ba"));
    }

    #[test]
    fn mono_device_is_rejected() {
        let err = ensure_routable(&output_device(1)).unwrap_err();
        match err {
            PlaybackError::TooFewChannels {
                channels, needed, ..
            } => {
                assert_eq!(channels, 1);
                assert_eq!(needed, 2);
            }
            other => panic!("expected TooFewChannels, got {other:?}"),
        }
    }

    #[test]
    fn stereo_and_wider_devices_are_routable() {
        assert!(ensure_routable(&output_device(2)).is_ok());
        assert!(ensure_routable(&output_device(8)).is_ok());
    }

    #[test]
    fn matching_rate_borrows_clip_unchanged() {
        let ba = clip("ba");
        let samples = prepare_samples(&ba, 48_000, 1024).unwrap();
        assert!(matches!(samples, Cow::Borrowed(_)));
        assert_eq!(samples.as_ref(), ba.samples());
    }

    #[test]
    fn rate_mismatch_resamples() {
        let tone: Vec<f32> = (0..4800).map(|i| (i as f32 * 0.01).sin()).collect();
        let ba = AudioClip::from_samples("ba", 48_000, tone);
        let samples = prepare_samples(&ba, 24_000, 1024).unwrap();
        assert!(matches!(samples, Cow::Owned(_)));
        assert!(samples.len() < ba.samples().len());
    }

    #[test]
    fn playout_grace_covers_fixed_buffer_and_refill() {
        // 16384 + 4096 frames at 48 kHz is ~426 ms of buffered audio.
        let grace = playout_grace(&cpal::BufferSize::Fixed(16_384), 4_096, 48_000);
        assert_eq!(grace, Duration::from_millis(476));
    }

    #[test]
    fn playout_grace_assumes_a_buffer_for_default() {
        let grace = playout_grace(&cpal::BufferSize::Default, 4_096, 48_000);
        assert_eq!(grace, Duration::from_millis(220));
    }

    #[test]
    fn unknown_id_fails_before_any_playback() {
        // Hosts without audio hardware may fail enumeration instead; both
        // outcomes are errors raised before a stream is ever built.
        let host = cpal::default_host();
        let (ba, da) = (clip("ba"), clip("da"));

        match play_selection(&host, usize::MAX, &ba, &da, &PlayerConfig::default()) {
            Err(PlaybackError::DeviceNotFound { id }) => assert_eq!(id, usize::MAX),
            Err(_) => {}
            Ok(()) => panic!("usize::MAX should never resolve to a device"),
        }
    }
}
