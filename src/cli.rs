use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "emotrust", author, version, about = "Webcam emotion sampling and trust scoring")]
pub struct Cli {
    /// Settings file; created with defaults on first write.
    #[arg(long, global = true, default_value = "emotrust.json")]
    pub config: PathBuf,

    /// Verbose logging (same as EMOTRUST_DEBUG=1).
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a session from the camera and score it.
    Analyze(AnalyzeArgs),
    /// Train the model on two folders of labeled face images.
    Train(TrainArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Display name used to label exported files.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    /// Export directory; defaults to `exportDir` from the settings file.
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long)]
    pub no_export: bool,

    /// Also save this frame on its own, next to the session folder. Repeatable.
    #[arg(long = "frame", value_name = "INDEX")]
    pub frames: Vec<u32>,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long)]
    pub trustworthy: PathBuf,

    #[arg(long)]
    pub untrustworthy: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_parses_identity_and_flags() {
        let cli = Cli::parse_from([
            "emotrust", "--debug", "analyze", "--name", "Ana", "--no-export",
        ]);

        assert!(cli.debug);
        assert_eq!(cli.config, PathBuf::from("emotrust.json"));
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.name.as_deref(), Some("Ana"));
        assert!(args.no_export);
        assert!(args.out.is_none());
        assert!(args.frames.is_empty());
    }

    #[test]
    fn analyze_collects_individual_frames() {
        let cli = Cli::parse_from(["emotrust", "analyze", "--frame", "3", "--frame", "15"]);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.frames, vec![3, 15]);
    }

    #[test]
    fn train_requires_both_folders() {
        assert!(Cli::try_parse_from(["emotrust", "train", "--trustworthy", "a"]).is_err());

        let cli = Cli::parse_from([
            "emotrust", "train", "--trustworthy", "a", "--untrustworthy", "b", "--config", "x.json",
        ]);
        assert_eq!(cli.config, PathBuf::from("x.json"));
        assert!(matches!(cli.command, Command::Train(_)));
    }
}
