use std::path::PathBuf;

use clap::Parser;

use crate::media::types::DecodeMode;
use crate::player::scrub::ScrubUnit;
use crate::settings::PlayerSettings;

#[derive(Parser, Debug)]
#[command(name = "scrub-player", about = "Play a video with a scrub bar and export it reversed")]
pub struct Args {
    /// Video file to open
    pub input: PathBuf,

    /// Decode every frame up front instead of streaming
    #[arg(long)]
    pub preload: bool,

    /// Start paused on the first frame
    #[arg(long)]
    pub paused: bool,

    /// Show the scrub bar in percent instead of frames
    #[arg(long)]
    pub percent: bool,

    /// Write the reversed copy without opening a window, then exit
    #[arg(long)]
    pub export: bool,

    /// Path for the reversed copy (default: derived from the input name)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Flags override what the settings file says; absent flags leave it alone.
    pub fn apply(&self, settings: &mut PlayerSettings) {
        if self.preload {
            settings.decode_mode = DecodeMode::Preload;
        }
        if self.paused {
            settings.start_paused = true;
        }
        if self.percent {
            settings.scrub_unit = ScrubUnit::Percent;
        }
    }
}
