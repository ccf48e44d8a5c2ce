//! `router-tui`: route two short mono clips ("ba" and "da") to the left and
//! right channels of a chosen output device.
//!
//! The two clips are loaded once at startup from `ba.wav` / `da.wav`; a load
//! failure is fatal before any terminal setup. Playback is sequential and
//! blocking: the left channel plays to completion, then the right.

mod cli;
mod resources;
mod ui;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use router_player::clip::{self, AudioClip};
use router_player::device;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let host = cpal::default_host();

    if args.list_devices {
        let devices = device::list_output_devices(&host).context("list output devices")?;
        if devices.is_empty() {
            println!("no output devices");
        }
        for d in &devices {
            println!("{}", d.label());
        }
        return Ok(());
    }

    let root = resources::resource_root(args.assets.as_deref()).context("resolve clip directory")?;
    tracing::debug!(root = %root.display(), "clip directory");

    let ba = load_clip_fatal(&root, resources::BA_FILE)?;
    let da = load_clip_fatal(&root, resources::DA_FILE)?;

    ui::run_tui(host, ba, da, args.device.as_deref())
}

fn load_clip_fatal(root: &Path, file: &str) -> Result<AudioClip> {
    let path = root.join(file);
    clip::load_clip(&path).with_context(|| format!("load clip {:?}", path))
}
