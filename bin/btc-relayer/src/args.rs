//! Parses command-line arguments for the relayer.

use std::path::PathBuf;

use btc_relayer_common::logging::DEFAULT_DIRECTIVE;
use clap::{crate_version, Parser};

#[derive(Debug, Parser)]
#[clap(
    name = "btc-relayer",
    about = "Relays cross-chain transactions between Bitcoin and the alliance chain",
    version = crate_version!()
)]
pub(crate) struct Cli {
    #[clap(
        long,
        short = 'c',
        help = "The file containing the configuration for the relayer",
        default_value = "config.toml"
    )]
    pub config: PathBuf,

    #[clap(
        long,
        env = "BTC_RELAYER_LOG_LEVEL",
        help = "Log filter used when RUST_LOG is not set, e.g. `debug` or `btc_relayer_relay=trace`",
        default_value = DEFAULT_DIRECTIVE
    )]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["btc-relayer"]);
        assert_eq!(cli.config, PathBuf::from("config.toml"));

        let cli = Cli::parse_from(["btc-relayer", "-c", "relayer.toml", "--log-level", "debug"]);
        assert_eq!(cli.config, PathBuf::from("relayer.toml"));
        assert_eq!(cli.log_level, "debug");
    }
}
