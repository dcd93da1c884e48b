//! CLI for the nsdl archive fetcher.

mod commands;
mod terminal;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use nsdl_core::config::{self, Overrides, StoredConfig};
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_completions, run_fetch, run_list, run_verify};
pub use terminal::OnCorrupt;

/// Top-level CLI for the nuScenes archive fetcher.
#[derive(Debug, Parser)]
#[command(name = "nsdl")]
#[command(about = "nsdl: fetch and verify nuScenes dataset archives", long_about = None)]
pub struct Cli {
    /// Config file (JSON, or TOML by extension). Default: ./config.json, then ~/.config/nsdl/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Region passed to the archive API; overrides NUSCENES_REGION and the config file.
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Directory archives are stored in; overrides NUSCENES_OUTPUT_DIR and the config file.
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Defaults to `fetch` when omitted.
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Resolve download links, choose archives, download and verify them.
    Fetch {
        /// Answer the selection prompt up front: `all`, `q`, or indices like "0 2 5".
        #[arg(long, value_name = "CHOICE")]
        select: Option<String>,

        /// What to do when an archive already on disk fails its checksum.
        #[arg(long, value_enum, default_value = "ask")]
        on_corrupt: OnCorrupt,
    },

    /// Show the known archives and which are present locally.
    List,

    /// Check local archives against their expected MD5 (no network).
    Verify {
        /// Archive filenames to check (default: all known archives).
        files: Vec<String>,
    },

    /// Print the MD5 (or SHA-256) of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,

        /// Print SHA-256 instead of MD5.
        #[arg(long)]
        sha256: bool,
    },

    /// Generate a shell completion script.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

impl Default for CliCommand {
    fn default() -> Self {
        CliCommand::Fetch {
            select: None,
            on_corrupt: OnCorrupt::Ask,
        }
    }
}

/// Config store and command-line overrides shared by every command.
pub struct Context {
    pub stored: StoredConfig,
    pub overrides: Overrides,
}

impl Context {
    pub fn output_dir(&self) -> PathBuf {
        config::resolve_output_dir(|key| std::env::var(key).ok(), &self.stored, &self.overrides)
    }
}

/// Load the config store; failures are reported and treated as an empty config.
fn load_stored(explicit: Option<&Path>) -> StoredConfig {
    let Some(path) = config::locate_store(explicit) else {
        return StoredConfig::default();
    };
    match config::load_store(&path) {
        Ok(cfg) => {
            tracing::debug!(path = %path.display(), "loaded config: {:?}", cfg);
            cfg
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %format!("{:#}", e), "ignoring unreadable config");
            println!("[WARN] failed to read config file {} ({:#}); ignoring it", path.display(), e);
            StoredConfig::default()
        }
    }
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let command = cli.command.unwrap_or_default();

        if let CliCommand::Completions { shell } = command {
            return run_completions(shell);
        }
        if let CliCommand::Checksum { path, sha256 } = &command {
            return run_checksum(path, *sha256);
        }

        let ctx = Context {
            stored: load_stored(cli.config.as_deref()),
            overrides: Overrides {
                region: cli.region,
                output_dir: cli.output_dir,
            },
        };

        match command {
            CliCommand::Fetch { select, on_corrupt } => run_fetch(&ctx, select.as_deref(), on_corrupt)?,
            CliCommand::List => run_list(&ctx)?,
            CliCommand::Verify { files } => run_verify(&ctx, &files)?,
            CliCommand::Checksum { .. } | CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
