use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "router-tui", version)]
pub struct Args {
    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Preselect the output device by name substring (case-insensitive)
    #[arg(long)]
    pub device: Option<String>,

    /// Directory holding ba.wav and da.wav (defaults to the executable's
    /// directory, then the working directory)
    #[arg(long)]
    pub assets: Option<PathBuf>,
}
