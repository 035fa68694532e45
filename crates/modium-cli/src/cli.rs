//! Flag surface of the `modium` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use modium_devtools::PortSpec;

#[derive(Debug, Parser)]
#[command(name = "modium")]
#[command(bin_name = "modium")]
#[command(about = "Drive a WebView mod manager's IPC bridge over its DevTools port", long_about = None)]
pub struct Cli {
    /// DevTools host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// DevTools port, or "auto" to probe the known candidates
    #[arg(long, default_value = "auto")]
    pub port: PortSpec,

    /// Game id the mods belong to
    #[arg(long, default_value_t = 1)]
    pub game: u64,

    /// Comma separated mod ids
    #[arg(long, value_delimiter = ',')]
    pub mods: Vec<u64>,

    /// Enable the given mods
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    /// Disable the given mods
    #[arg(long)]
    pub disable: bool,

    /// List installed mods as JSON
    #[arg(long)]
    pub list: bool,

    /// Output file for --list JSON (prints to stdout otherwise)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Skip the UI refresh after toggling
    #[arg(long)]
    pub no_refresh: bool,

    /// Passively record non-local traffic for this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub sniff: Option<u64>,

    /// Output file for --sniff capture (prints to stdout otherwise)
    #[arg(long)]
    pub sniff_out: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan an unpacked frontend bundle for URLs, auth hints and IPC channels
    Analyze {
        /// Unpacked bundle directory
        unpacked: PathBuf,
        /// Report file (prints to stdout otherwise)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Extract URLs, routes and keywords from native binaries
    AnalyzeNative {
        /// Unpacked tree containing exe/dll/bin files
        unpacked: PathBuf,
        /// Report file (prints to stdout otherwise)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Patch startup files to load the logging hook
    InjectHook {
        /// Unpacked tree containing the startup files
        unpacked: PathBuf,
    },
}

impl Cli {
    /// Cross-flag checks clap groups cannot express. Runs before anything
    /// touches the network.
    pub fn validate(&self) -> Result<(), String> {
        if self.command.is_some() || self.list || self.sniff.is_some() {
            return Ok(());
        }
        if self.mods.is_empty() {
            return Err("provide --mods for enable/disable, or use --list / --sniff".to_string());
        }
        if !(self.enable ^ self.disable) {
            return Err("specify exactly one of --enable or --disable".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_enable_and_disable_conflict_at_parse() {
        let err = Cli::try_parse_from(["modium", "--mods", "1,2", "--enable", "--disable"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_mods_comma_separated() {
        let cli = Cli::try_parse_from(["modium", "--mods", "1,2,3", "--disable"]).unwrap();
        assert_eq!(cli.mods, vec![1, 2, 3]);
        assert!(cli.disable);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_toggle_requires_mods() {
        let cli = Cli::try_parse_from(["modium", "--enable"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_mods_require_a_toggle() {
        let cli = Cli::try_parse_from(["modium", "--mods", "4"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_list_needs_nothing_else() {
        let cli = Cli::try_parse_from(["modium", "--list", "--out", "mods.json"]).unwrap();
        assert!(cli.validate().is_ok());
        assert!(cli.out.is_some());
    }

    #[test]
    fn test_sniff_mode_standalone() {
        let cli =
            Cli::try_parse_from(["modium", "--sniff", "30", "--sniff-out", "traffic.json"])
                .unwrap();
        assert_eq!(cli.sniff, Some(30));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_port_spec_values() {
        let cli = Cli::try_parse_from(["modium", "--list", "--port", "9222"]).unwrap();
        assert_eq!(cli.port, modium_devtools::PortSpec::Fixed(9222));
        let cli = Cli::try_parse_from(["modium", "--list"]).unwrap();
        assert_eq!(cli.port, modium_devtools::PortSpec::Auto);
    }

    #[test]
    fn test_analyze_subcommand() {
        let cli = Cli::try_parse_from(["modium", "analyze", "unpacked", "--out", "r.json"])
            .unwrap();
        match cli.command {
            Some(Command::Analyze { ref unpacked, ref out }) => {
                assert_eq!(unpacked.to_str().unwrap(), "unpacked");
                assert!(out.is_some());
            }
            ref other => panic!("unexpected command: {other:?}"),
        }
        assert!(cli.validate().is_ok());
    }
}
