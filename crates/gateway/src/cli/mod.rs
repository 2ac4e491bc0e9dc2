pub mod config;
pub mod download;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tubechat: chat with your YouTube channel data.
#[derive(Debug, Parser)]
#[command(name = "tubechat", version, about)]
pub struct Cli {
    /// Config file (falls back to `TUBECHAT_CONFIG`, then `config.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Download a channel's newest videos into a JSON export.
    Download {
        /// Channel URL, `@handle`, bare handle or `UC…` id.
        channel: String,
        /// Number of videos (clamped to the configured cap).
        #[arg(long = "max")]
        max_videos: Option<u32>,
        /// Write the export here instead of the downloads directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Resolve the config path: `--config`, then `TUBECHAT_CONFIG`, then
/// `config.toml`.
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os("TUBECHAT_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Load the configuration. A missing file yields the defaults; a file
/// that exists but does not parse is an error.
///
/// Shared by `serve`, `download` and the `config` subcommands.
pub fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<(tc_domain::config::Config, PathBuf)> {
    let path = config_path(explicit);

    let config = if path.exists() {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?
    } else {
        tc_domain::config::Config::default()
    };

    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, path) = load_config(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.server.port, 3001);
        assert!(path.ends_with("absent.toml"));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tubechat.toml");
        std::fs::write(&path, "[server]\nport = 8080\n\n[llm]\nmax_tool_loops = 3\n").unwrap();
        let (config, _) = load_config(Some(path)).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.max_tool_loops, 3);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(load_config(Some(path)).is_err());
    }

    #[test]
    fn cli_parses_download() {
        let cli = Cli::parse_from(["tubechat", "download", "@veritasium", "--max", "5"]);
        match cli.command {
            Some(Command::Download { channel, max_videos, out }) => {
                assert_eq!(channel, "@veritasium");
                assert_eq!(max_videos, Some(5));
                assert!(out.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
