use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::{models::Vibe, poster::AspectRatio, utils::DATA_DIR_ENV};

/// A journal of the shows you've been to, with a few AI conveniences.
#[derive(Parser, Debug)]
#[command(name = "show-vault", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the show snapshot and config.json
    #[arg(long, env = DATA_DIR_ENV, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a new show memory
    Add {
        /// Artist or band; may be left out with --identify
        #[arg(long)]
        artist: Option<String>,
        /// Date of the show (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Venue or location
        #[arg(long)]
        location: Option<String>,
        /// Energetic, Nostalgic, Intimate, Euphoric or Chill
        #[arg(long, default_value_t = Vibe::Energetic)]
        vibe: Vibe,
        /// Photos and videos (repeatable)
        #[arg(long = "media", value_name = "PATH", required = true)]
        media: Vec<PathBuf>,
        /// Recognize the artist from the first photo
        #[arg(long)]
        identify: bool,
        /// Look up a setlist/playlist for the artist
        #[arg(long)]
        playlist: bool,
    },
    /// Browse shows, newest first
    Timeline {
        /// Filter by artist, location or date
        #[arg(long, short)]
        search: Option<String>,
    },
    /// Surface a random past show
    Random,
    /// Put together a shared album (invites are simulated)
    Album {
        #[arg(long)]
        name: Option<String>,
        /// Friend to invite (repeatable)
        #[arg(long = "invite", value_name = "NAME")]
        invites: Vec<String>,
        /// Show id to build the album from
        #[arg(long)]
        show: Option<String>,
    },
    /// Music venues near a position
    Venues {
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// AI tools
    Ai {
        #[command(subcommand)]
        tool: AiCommands,
    },
    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum AiCommands {
    /// List the available tools
    Tools,
    /// Generate a concert poster
    Poster {
        /// Artist or band the poster is for
        subject: Option<String>,
        #[arg(long, default_value_t = AspectRatio::Square)]
        aspect: AspectRatio,
        /// Where to write the image
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Ask a question about a saved show
    Dive {
        /// Show id (defaults to the first saved show)
        show: Option<String>,
        #[arg(long)]
        question: Option<String>,
    },
    /// Edit a photo with a text instruction
    Edit {
        image: PathBuf,
        #[arg(long)]
        instruction: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Detailed, web-grounded analysis of a photo
    Analyze { image: PathBuf },
    /// Describe the mood of a frame grabbed from a show video
    Frame { image: PathBuf },
    /// Transcribe a recorded audio clip
    Transcribe { audio: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Change one setting
    Set { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_with_repeated_media() {
        let cli = Cli::try_parse_from([
            "show-vault",
            "add",
            "--artist",
            "Arctic Monkeys",
            "--date",
            "2023-05-01",
            "--location",
            "Royal Albert Hall",
            "--vibe",
            "euphoric",
            "--media",
            "a.jpg",
            "--media",
            "b.mp4",
        ])
        .unwrap();
        match cli.command {
            Commands::Add {
                vibe, media, date, ..
            } => {
                assert_eq!(vibe, Vibe::Euphoric);
                assert_eq!(media.len(), 2);
                assert_eq!(date, NaiveDate::from_ymd_opt(2023, 5, 1));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_aspect_ratio() {
        let bad = Cli::try_parse_from(["show-vault", "ai", "poster", "Muse", "--aspect", "2:1"]);
        assert!(bad.is_err());
        assert!(Cli::try_parse_from(["show-vault", "ai", "poster", "--aspect", "9:16"]).is_ok());
    }

    #[test]
    fn negative_coordinates_parse() {
        let args = ["show-vault", "venues", "--lat", "-23.5", "--lon", "-46.6"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(cli.command, Commands::Venues { lat: Some(_), lon: Some(_) }));
    }
}
