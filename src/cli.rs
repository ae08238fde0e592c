//! Command-line interface for Voxmemo
//!
//! Handles argument parsing and logging configuration.

use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Voxmemo - Voice recorder with live level metering
#[derive(Parser, Debug)]
#[command(name = "voxmemo")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace, -vvvv = all deps
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory for new recordings (overrides the stored setting)
    #[arg(long, value_name = "DIR")]
    pub recordings_dir: Option<PathBuf>,

    /// Seed the recordings list with demo entries
    #[arg(long)]
    pub placeholders: bool,

    /// Forget the stored microphone permission so it is asked again
    #[arg(long)]
    pub reset_microphone_permission: bool,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    builder.filter_module("voxmemo", args.log_level());

    // GUI and audio stack modules only at -vvvv
    if args.verbose >= 4 {
        builder.filter_module("naga", args.log_level());
        builder.filter_module("blade_graphics", args.log_level());
        builder.filter_module("gpui", args.log_level());
        builder.filter_module("pipewire", args.log_level());
    }

    builder.format_timestamp_millis().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let parse = |argv: &[&str]| Args::parse_from(argv);
        assert_eq!(parse(&["voxmemo"]).log_level(), LevelFilter::Warn);
        assert_eq!(parse(&["voxmemo", "-v"]).log_level(), LevelFilter::Info);
        assert_eq!(parse(&["voxmemo", "-vv"]).log_level(), LevelFilter::Debug);
        assert_eq!(parse(&["voxmemo", "-vvvvv"]).log_level(), LevelFilter::Trace);
        assert_eq!(parse(&["voxmemo", "-q", "-vv"]).log_level(), LevelFilter::Error);
    }

    #[test]
    fn test_recordings_dir_override() {
        let args = Args::parse_from(["voxmemo", "--recordings-dir", "/tmp/memos", "--placeholders"]);
        assert_eq!(args.recordings_dir, Some(PathBuf::from("/tmp/memos")));
        assert!(args.placeholders);
        assert!(!args.reset_microphone_permission);
    }
}
