//! Clip loading (whole-file decode to memory).
//!
//! Uses Symphonia to probe the container and decode every packet into a single
//! mono `f32` buffer. Clips are loaded once at startup and never mutated; a
//! source with more than one channel is rejected outright.

use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Why a clip file could not be turned into an [`AudioClip`].
///
/// Any of these is fatal at startup: the program cannot run without both of
/// its clips.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("open {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("unsupported or corrupt audio in {name}: {source}")]
    Probe {
        name: String,
        source: symphonia::core::errors::Error,
    },

    #[error("no decodable audio track in {name}")]
    NoTrack { name: String },

    #[error("unknown channel layout in {name}")]
    UnknownChannels { name: String },

    #[error("{name} has {channels} channels, expected mono")]
    NotMono { name: String, channels: usize },

    #[error("unknown sample rate in {name}")]
    UnknownRate { name: String },

    #[error("decoder init failed for {name}: {source}")]
    Decoder {
        name: String,
        source: symphonia::core::errors::Error,
    },

    #[error("{name} decoded to zero samples")]
    Empty { name: String },
}

/// A fully decoded mono clip, immutable for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct AudioClip {
    name: String,
    sample_rate: u32,
    samples: Vec<f32>,
}

impl AudioClip {
    /// Build a clip from raw mono samples (already decoded elsewhere).
    pub fn from_samples(name: &str, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            name: name.to_string(),
            sample_rate,
            samples,
        }
    }

    /// Short display name, taken from the source file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native sample rate of the decoded audio.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The decoded mono samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64).saturating_mul(1000) / u64::from(self.sample_rate.max(1))
    }
}

/// Decode `path` into an [`AudioClip`], rejecting anything that is not mono.
pub fn load_clip(path: &Path) -> Result<AudioClip, FormatError> {
    let name = display_name(path);
    let file = File::open(path).map_err(|e| FormatError::Open {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    load_clip_from_source(Box::new(file), hint, &name)
}

/// Decode an arbitrary Symphonia [`MediaSource`] into an [`AudioClip`].
///
/// This is the shared entry point for file loading and for tests that feed
/// in-memory bytes through a cursor.
pub fn load_clip_from_source(
    source: Box<dyn MediaSource>,
    hint: Hint,
    name: &str,
) -> Result<AudioClip, FormatError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| FormatError::Probe {
            name: name.to_string(),
            source: e,
        })?;

    let mut format = probed.format;

    let track = format.default_track().ok_or_else(|| FormatError::NoTrack {
        name: name.to_string(),
    })?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| FormatError::UnknownChannels {
            name: name.to_string(),
        })?
        .count();
    if channels != 1 {
        return Err(FormatError::NotMono {
            name: name.to_string(),
            channels,
        });
    }

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| FormatError::UnknownRate {
            name: name.to_string(),
        })?;

    let codec_params: CodecParameters = track.codec_params.clone();
    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| FormatError::Decoder {
            name: name.to_string(),
            source: e,
        })?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break, // EOF
        };

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err(FormatError::Empty {
            name: name.to_string(),
        });
    }

    tracing::debug!(
        clip = name,
        rate_hz = sample_rate,
        samples = samples.len(),
        "clip loaded"
    );

    Ok(AudioClip {
        name: name.to_string(),
        sample_rate,
        samples,
    })
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string())
}
