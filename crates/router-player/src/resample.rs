//! Offline clip resampling.
//!
//! Converts a whole decoded mono clip to the output device rate before
//! playback starts. Clips are short and already fully in memory, so the
//! conversion runs to completion inline rather than as a streaming stage.

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::playback::PlaybackError;

/// Resample mono `samples` from `src_rate` to `dst_rate`.
///
/// Callers are expected to skip the call entirely when the rates already
/// match. `clip` is only used to label errors.
pub fn resample_clip(
    samples: &[f32],
    src_rate: u32,
    dst_rate: u32,
    chunk_frames: usize,
    clip: &str,
) -> Result<Vec<f32>, PlaybackError> {
    let f_ratio = f64::from(dst_rate) / f64::from(src_rate);

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let chunk_in_frames = chunk_frames.max(1);

    let mut resampler =
        Async::<f32>::new_sinc(f_ratio, 1.1, &params, chunk_in_frames, 1, FixedAsync::Input)
            .map_err(|e| resample_error(clip, &e))?;

    let mut out = Vec::with_capacity((samples.len() as f64 * f_ratio).ceil() as usize + chunk_in_frames);
    let mut out_chunk = vec![0.0f32; resampler.output_frames_max()];

    let mut indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len: None,
    };

    let mut offset = 0usize;
    while offset < samples.len() {
        let take = (samples.len() - offset).min(chunk_in_frames);
        let chunk = &samples[offset..offset + take];

        let input = InterleavedSlice::new(chunk, 1, take).map_err(|e| resample_error(clip, &e))?;
        let out_capacity = out_chunk.len();
        let mut output = InterleavedSlice::new_mut(&mut out_chunk, 1, out_capacity)
            .map_err(|e| resample_error(clip, &e))?;

        indexing.partial_len = if take < chunk_in_frames { Some(take) } else { None };

        let (_consumed, produced) = resampler
            .process_into_buffer(&input, &mut output, Some(&indexing))
            .map_err(|e| resample_error(clip, &e))?;

        out.extend_from_slice(&out_chunk[..produced]);
        offset += take;
    }

    tracing::debug!(
        clip = clip,
        src_rate_hz = src_rate,
        dst_rate_hz = dst_rate,
        in_samples = samples.len(),
        out_samples = out.len(),
        "clip resampled"
    );

    Ok(out)
}

fn resample_error(clip: &str, err: &dyn std::fmt::Display) -> PlaybackError {
    PlaybackError::Resample {
        clip: clip.to_string(),
        reason: err.to_string(),
    }
}
