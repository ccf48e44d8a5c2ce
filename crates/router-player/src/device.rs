//! Output device discovery and stream config selection.
//!
//! Thin wrappers around CPAL for:
//! - listing output-capable devices as an ordered snapshot
//! - re-resolving a device by its enumeration id
//! - choosing the best supported output config for a clip's sample rate

use cpal::traits::{DeviceTrait, HostTrait};
use thiserror::Error;

/// Device discovery failures.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device enumeration failed: {0}")]
    Enumerate(#[from] cpal::DevicesError),

    #[error("supported output configs unavailable: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("{label}: no supported output config")]
    NoSupportedConfig { label: String },
}

/// One output-capable device, snapshotted at enumeration time.
///
/// `id` is the device's position in the host's *full* enumeration (including
/// devices with no outputs), so ids stay meaningful across the output filter
/// but are not necessarily contiguous.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputDevice {
    pub id: usize,
    pub name: String,
    pub max_output_channels: u16,
}

impl OutputDevice {
    /// Display label. The id always leads, so splitting on the first `:`
    /// recovers it regardless of what the device name contains.
    pub fn label(&self) -> String {
        format!("{}: {}", self.id, self.name)
    }
}

/// Snapshot the host's output-capable devices in enumeration order.
///
/// Devices reporting zero output channels are filtered out. No caching and no
/// retry; callers re-enumerate whenever they want a fresh view.
pub fn list_output_devices(host: &cpal::Host) -> Result<Vec<OutputDevice>, DeviceError> {
    let devices = host.devices()?;
    let mut out = Vec::new();
    for (index, device) in devices.enumerate() {
        if let Some(info) = output_device_info(index, &device) {
            out.push(info);
        }
    }
    tracing::debug!(count = out.len(), "enumerated output devices");
    Ok(out)
}

/// Re-resolve an enumeration id against the current device list.
///
/// Returns `Ok(None)` when the id no longer names an output-capable device,
/// which callers surface as their own not-found error.
pub fn output_device_by_id(
    host: &cpal::Host,
    id: usize,
) -> Result<Option<(cpal::Device, OutputDevice)>, DeviceError> {
    for (index, device) in host.devices()?.enumerate() {
        if index != id {
            continue;
        }
        return Ok(output_device_info(index, &device).map(|info| (device, info)));
    }
    Ok(None)
}

fn output_device_info(index: usize, device: &cpal::Device) -> Option<OutputDevice> {
    let name = device.description().ok()?.to_string();
    let max_output_channels = max_output_channels(device);
    if max_output_channels == 0 {
        return None;
    }
    Some(OutputDevice {
        id: index,
        name,
        max_output_channels,
    })
}

fn max_output_channels(device: &cpal::Device) -> u16 {
    let mut max = 0u16;
    if let Ok(ranges) = device.supported_output_configs() {
        for r in ranges {
            max = max.max(r.channels());
        }
    }
    if max == 0 {
        if let Ok(cfg) = device.default_output_config() {
            max = max.max(cfg.channels());
        }
    }
    max
}

/// Case-insensitive substring match used for `--device` preselection.
pub fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

/// Choose the best output config for `target_rate` among ranges with at
/// least `min_channels` output channels.
///
/// Some backends enumerate one range per channel count with otherwise
/// identical rates and formats, so ranges below `min_channels` are skipped
/// outright rather than left to lose a tie-break. Among the survivors,
/// prefers rates at or below the target (highest first), then the friendlier
/// sample format.
pub fn pick_output_config(
    device: &cpal::Device,
    label: &str,
    target_rate: u32,
    min_channels: u16,
) -> Result<cpal::SupportedStreamConfig, DeviceError> {
    let mut best: Option<(bool, u32, u8, cpal::SupportedStreamConfig)> = None;

    for range in device.supported_output_configs()? {
        let Some((below, rate, format_rank)) = candidate_for_range(
            range.channels(),
            min_channels,
            range.min_sample_rate(),
            range.max_sample_rate(),
            range.sample_format(),
            target_rate,
        ) else {
            continue;
        };
        let cfg = range.with_sample_rate(rate);
        let replace = match &best {
            None => true,
            Some((b_below, b_rate, b_rank, _)) => {
                is_better_candidate(below, rate, format_rank, *b_below, *b_rate, *b_rank)
            }
        };
        if replace {
            best = Some((below, rate, format_rank, cfg));
        }
    }

    match best {
        Some((_, _, _, cfg)) => Ok(cfg),
        None => Err(DeviceError::NoSupportedConfig {
            label: label.to_string(),
        }),
    }
}

/// Prefer a fixed buffer size if the device advertises one.
///
/// Returns `None` when the device only supports the default buffer size.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            const MAX_FRAMES: u32 = 16_384;
            let chosen = if *max > MAX_FRAMES {
                if *min > MAX_FRAMES { *min } else { MAX_FRAMES }
            } else {
                *max
            };
            Some(cpal::BufferSize::Fixed(chosen))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Rank one supported range as a pick candidate, or `None` when it cannot
/// carry the required channel count.
fn candidate_for_range(
    channels: u16,
    min_channels: u16,
    min_rate: u32,
    max_rate: u32,
    format: cpal::SampleFormat,
    target_rate: u32,
) -> Option<(bool, u32, u8)> {
    if channels < min_channels {
        return None;
    }
    let rate = pick_rate_for_range(min_rate, max_rate, target_rate);
    Some((rate <= target_rate, rate, sample_format_rank(format)))
}

fn pick_rate_for_range(min: u32, max: u32, target: u32) -> u32 {
    if target < min {
        min
    } else if target > max {
        max
    } else {
        target
    }
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn is_better_candidate(
    below: bool,
    rate: u32,
    format_rank: u8,
    best_below: bool,
    best_rate: u32,
    best_rank: u8,
) -> bool {
    if below != best_below {
        below && !best_below
    } else if rate != best_rate {
        rate > best_rate
    } else {
        format_rank < best_rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_round_trips_id() {
        let d = OutputDevice {
            id: 7,
            name: "USB DAC: rev 2".into(),
            max_output_channels: 2,
        };
        let label = d.label();
        let (id_part, name_part) = label.split_once(": ").unwrap();
        assert_eq!(id_part.parse::<usize>().unwrap(), 7);
        assert_eq!(name_part, "USB DAC: rev 2");
    }

    #[test]
    fn listed_devices_are_output_capable_and_ordered() {
        // Hosts without audio hardware may legitimately fail or return nothing.
        let host = cpal::default_host();
        let Ok(devices) = list_output_devices(&host) else {
            return;
        };
        for d in &devices {
            assert!(d.max_output_channels >= 1, "{} has no outputs", d.label());
        }
        for pair in devices.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", ""));
    }

    #[test]
    fn pick_rate_for_range_prefers_target_when_in_range() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, 48_000), 48_000);
    }

    #[test]
    fn pick_rate_for_range_clamps_below_min() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, 22_050), 44_100);
    }

    #[test]
    fn pick_rate_for_range_clamps_above_max() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, 192_000), 96_000);
    }

    #[test]
    fn candidate_for_range_skips_too_few_channels() {
        // A mono range must never enter the pick when stereo is required,
        // even if its rate and format would otherwise tie or win.
        assert!(
            candidate_for_range(1, 2, 48_000, 48_000, cpal::SampleFormat::F32, 48_000).is_none()
        );
    }

    #[test]
    fn candidate_for_range_keeps_stereo_and_wider() {
        assert_eq!(
            candidate_for_range(2, 2, 44_100, 96_000, cpal::SampleFormat::F32, 48_000),
            Some((true, 48_000, 0))
        );
        assert_eq!(
            candidate_for_range(8, 2, 44_100, 44_100, cpal::SampleFormat::I16, 48_000),
            Some((true, 44_100, 2))
        );
    }

    #[test]
    fn is_better_candidate_prefers_below_target() {
        assert!(is_better_candidate(true, 48_000, 1, false, 48_000, 1));
    }

    #[test]
    fn is_better_candidate_prefers_higher_rate() {
        assert!(is_better_candidate(true, 96_000, 2, true, 48_000, 2));
    }

    #[test]
    fn is_better_candidate_prefers_lower_rank() {
        assert!(is_better_candidate(true, 48_000, 0, true, 48_000, 2));
    }
}
