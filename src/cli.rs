//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "arbitrader")]
#[command(about = "OANDA-style FX triangular arbitrage trader")]
pub struct Args {
    /// Run against the in-memory demo broker instead of a live OANDA account.
    #[arg(long)]
    pub demo: bool,

    /// Use the OANDA practice environment instead of the live one.
    #[arg(long)]
    pub practice: bool,

    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Override the base tick interval, in seconds.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Stop after this many seconds (unbounded if omitted).
    #[arg(long)]
    pub runtime: Option<u64>,

    /// Emit debug-level logs.
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_config_json_and_live_mode() {
        let args = Args::parse_from(["arbitrader"]);
        assert_eq!(args.config, PathBuf::from("config.json"));
        assert!(!args.demo);
        assert!(!args.practice);
        assert!(args.runtime.is_none());
    }

    #[test]
    fn parses_full_flag_set() {
        let args = Args::parse_from([
            "arbitrader",
            "--demo",
            "--practice",
            "--config",
            "alt.json",
            "--interval",
            "2",
            "--runtime",
            "60",
            "--verbose",
        ]);
        assert!(args.demo);
        assert!(args.practice);
        assert_eq!(args.config, PathBuf::from("alt.json"));
        assert_eq!(args.interval, Some(2));
        assert_eq!(args.runtime, Some(60));
        assert!(args.verbose);
    }
}
