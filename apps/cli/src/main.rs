//! CloudStor agent - provisions a CloudStor WebDAV mount on a cloud instance.
//!
//! The agent reads the account from the instance vendor data, checks it,
//! then adds the fstab entry and davfs2 credentials and mounts the share.
//! The `fstab` subcommands expose the table editing on its own.

mod cloudstor;
mod config;
mod fstab_cmd;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cloudstor_mount_core::Result;

use crate::cloudstor::Credentials;
use crate::config::AgentConfig;
use crate::fstab_cmd::FstabCommand;

/// CloudStor agent.
#[derive(Parser)]
#[command(name = "cloudstor-agent")]
#[command(about = "Provision CloudStor WebDAV mounts", long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fstab file to operate on.
    #[arg(long, global = true)]
    fstab: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read credentials from vendor data and set up the mount.
    Setup {
        #[arg(long)]
        vendor_data_url: Option<String>,
        /// Where the share is mounted.
        #[arg(long)]
        mount_point: Option<PathBuf>,
    },
    /// Set up the mount for the given account.
    Configure {
        #[arg(long)]
        username: String,
        #[arg(long, env = "CLOUDSTOR_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        webdav_url: Option<String>,
        /// Where the share is mounted.
        #[arg(long)]
        mount_point: Option<PathBuf>,
    },
    /// Inspect or edit the fstab table.
    Fstab {
        #[command(subcommand)]
        command: FstabCommand,
    },
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = AgentConfig::load(cli.config.as_deref())?;
    if let Some(fstab) = cli.fstab {
        config.fstab_path = fstab;
    }

    match cli.command {
        Commands::Setup {
            vendor_data_url,
            mount_point,
        } => {
            if let Some(url) = vendor_data_url {
                config.vendor_data_url = url;
            }
            if let Some(mount_point) = mount_point {
                config.mount_point = mount_point;
            }
            cloudstor::setup(&config)
        }
        Commands::Configure {
            username,
            password,
            webdav_url,
            mount_point,
        } => {
            if let Some(url) = webdav_url {
                config.webdav_url = url;
            }
            if let Some(mount_point) = mount_point {
                config.mount_point = mount_point;
            }
            cloudstor::configure(&config, &Credentials { username, password })
        }
        Commands::Fstab { command } => fstab_cmd::run(&config.fstab_path, command),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", snafu::Report::from_error(e));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fstab_add() {
        let cli = Cli::try_parse_from([
            "cloudstor-agent",
            "--fstab",
            "/tmp/fstab",
            "fstab",
            "add",
            "cloudstor",
            "/mnt",
            "davfs",
            "_netdev",
            "--fsck",
            "2",
        ])
        .unwrap();

        assert_eq!(cli.fstab, Some(PathBuf::from("/tmp/fstab")));
        match cli.command {
            Commands::Fstab {
                command: FstabCommand::Add { fsck, dump, .. },
            } => {
                assert_eq!(fsck, 2);
                assert_eq!(dump, 0);
            }
            _ => panic!("expected fstab add"),
        }
    }
}
