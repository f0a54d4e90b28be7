//! Command-line interface definitions for the kids digest.
//!
//! Every option can also come from the environment. Run settings (addresses,
//! feeds, API keys) live in the settings file and environment variables, see
//! [`crate::config`].

use clap::{Parser, Subcommand};

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Fetch, compose, and send today's digest
/// kids_digest run --config ./digest.yaml
///
/// # Compose and archive without sending
/// kids_digest run --dry-run --output-dir ./archive
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and send today's digest
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Optional path to a YAML settings file
    #[arg(short, long, env = "DIGEST_CONFIG")]
    pub config: Option<String>,

    /// Directory to archive each run's JSON, HTML, text, and audio into
    #[arg(short, long, env = "DIGEST_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Compose and archive but do not send the email
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "kids_digest",
            "run",
            "--config",
            "./digest.yaml",
            "--output-dir",
            "./archive",
        ]);

        let Command::Run(args) = cli.command;
        assert_eq!(args.config.as_deref(), Some("./digest.yaml"));
        assert_eq!(args.output_dir.as_deref(), Some("./archive"));
        assert!(!args.dry_run);
    }

    #[test]
    fn test_cli_short_flags_and_dry_run() {
        let cli = Cli::parse_from(["kids_digest", "run", "-c", "/etc/digest.yaml", "-o", "/tmp/out", "--dry-run"]);

        let Command::Run(args) = cli.command;
        assert_eq!(args.config.as_deref(), Some("/etc/digest.yaml"));
        assert_eq!(args.output_dir.as_deref(), Some("/tmp/out"));
        assert!(args.dry_run);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["kids_digest"]).is_err());
    }
}
