use clap::Parser;
use std::path::PathBuf;

// Build version with engine info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Engine: sim (thread clock)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Playback session coordinator demo
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// JSON script of coordinator steps - optional, runs the built-in demo otherwise
    #[arg(value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Print every published event, not only state summaries
    #[arg(short = 'e', long = "events")]
    pub events: bool,

    /// Enable debug logging to file (default: oneplay.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from(["oneplay", "demo.json", "-vv", "--log", "-c", "/tmp/cfg"]);
        assert_eq!(args.script, Some(PathBuf::from("demo.json")));
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.log_file, Some(None));
        assert_eq!(args.config_dir, Some(PathBuf::from("/tmp/cfg")));
    }

    #[test]
    fn test_no_args() {
        let args = Args::parse_from(["oneplay"]);
        assert!(args.script.is_none());
        assert!(args.log_file.is_none());
        assert_eq!(args.verbosity, 0);
    }
}
