use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize the dubbed video of every ready folder under a directory
    Synthesize {
        /// Root directory to walk for unit folders
        folder: PathBuf,

        /// Do not burn subtitles into the output video
        #[arg(long)]
        no_subtitles: bool,

        /// Playback speed factor applied to video and audio
        #[arg(long)]
        speed_up: Option<f64>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Output resolution label, e.g. 1080p
        #[arg(short, long)]
        resolution: Option<String>,

        /// Background music to mix under the dubbed audio
        #[arg(long)]
        bgm: Option<PathBuf>,

        /// Background music volume
        #[arg(long)]
        bgm_volume: Option<f64>,

        /// Dubbed video volume when mixing background music
        #[arg(long)]
        video_volume: Option<f64>,

        /// Watermark image overlaid in the bottom-right corner
        #[arg(long)]
        watermark: Option<PathBuf>,
    },

    /// Split the audio of every unit folder into vocals and accompaniment
    Separate {
        /// Root directory to walk for unit folders
        folder: PathBuf,

        /// Separation model name
        #[arg(short, long)]
        model: Option<String>,

        /// Compute device (auto, cpu, cuda)
        #[arg(short, long)]
        device: Option<String>,

        /// Number of random shifts for prediction averaging
        #[arg(long)]
        shifts: Option<u32>,
    },

    /// Show which pipeline artifacts exist in each unit folder
    Status {
        /// Root directory to walk for unit folders
        folder: PathBuf,
    },

    /// Print a video's dimensions and the size it would be encoded at
    Probe {
        /// Input video file
        video: PathBuf,

        /// Output resolution label, e.g. 1080p
        #[arg(short, long)]
        resolution: Option<String>,
    },

    /// Convert a translated transcript into an SRT file
    Subtitles {
        /// Input transcript JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,

        /// Speed factor the subtitles should follow
        #[arg(long)]
        speed_up: Option<f64>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration to a file
    Init {
        /// Destination file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_synthesize_overrides() {
        let args = Args::parse_from([
            "dubmux", "-v", "synthesize", "videos", "--no-subtitles", "--speed-up", "1.5",
            "--resolution", "720p",
        ]);
        assert!(args.verbose);
        match args.command {
            Commands::Synthesize { folder, no_subtitles, speed_up, resolution, fps, .. } => {
                assert_eq!(folder, PathBuf::from("videos"));
                assert!(no_subtitles);
                assert_eq!(speed_up, Some(1.5));
                assert_eq!(resolution.as_deref(), Some("720p"));
                assert_eq!(fps, None);
            }
            _ => panic!("expected synthesize"),
        }
    }

    #[test]
    fn test_parse_config_init_default_output() {
        let args = Args::parse_from(["dubmux", "config", "init"]);
        match args.command {
            Commands::Config { action: ConfigAction::Init { output, force } } => {
                assert_eq!(output, PathBuf::from("config.toml"));
                assert!(!force);
            }
            _ => panic!("expected config init"),
        }
    }
}
