//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Scan files with every installed antivirus engine at once
///
/// Engines run concurrently under a global deadline; one hung or broken
/// engine never hides the others' verdicts.
#[derive(Parser, Debug)]
#[command(name = "malscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (or set MALSCAN_CONFIG env var)
    #[arg(short, long, env = "MALSCAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a file with all configured engines
    Scan(ScanArgs),

    /// List configured engines and whether they are installed
    Engines(EnginesArgs),

    /// Check for or install new signature definitions
    Update(UpdateArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),
}

// ============================================================================
// Scan command
// ============================================================================

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// File to scan ("-" reads stdin)
    pub file: PathBuf,

    /// Global deadline in seconds (overrides the config file)
    #[arg(short, long)]
    pub deadline: Option<u64>,

    /// Only run these engines (repeatable)
    #[arg(short, long = "engine", value_name = "NAME")]
    pub engines: Vec<String>,

    /// Declared media type, skipping content sniffing
    #[arg(long, value_name = "TYPE")]
    pub mime: Option<String>,
}

// ============================================================================
// Engines command
// ============================================================================

#[derive(Args, Debug)]
pub struct EnginesArgs {
    /// Only show these engines (repeatable)
    #[arg(short, long = "engine", value_name = "NAME")]
    pub engines: Vec<String>,
}

// ============================================================================
// Update command
// ============================================================================

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Only report whether updates are available
    #[arg(long)]
    pub check: bool,

    /// Only update these engines (repeatable)
    #[arg(short, long = "engine", value_name = "NAME")]
    pub engines: Vec<String>,
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,

    /// Show config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_flags() {
        let cli = Cli::try_parse_from([
            "malscan", "scan", "-", "--deadline", "5", "-e", "AVG", "-e", "clam", "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.file, PathBuf::from("-"));
        assert_eq!(args.deadline, Some(5));
        assert_eq!(args.engines, vec!["AVG".to_string(), "clam".to_string()]);
    }

    #[test]
    fn output_flag_accepts_aliases() {
        let cli = Cli::try_parse_from(["malscan", "-o", "yml", "engines"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Yaml));

        let cli = Cli::try_parse_from(["malscan", "--output", "table", "engines"]).unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Pretty));

        assert!(Cli::try_parse_from(["malscan", "-o", "xml", "engines"]).is_err());
    }
}
