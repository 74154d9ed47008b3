mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use cmd::MissingInput;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cdh-install",
    about = "Unattended multi-host Cloudera Manager installer",
    version,
    propagate_version = true
)]
struct Cli {
    /// Install root holding conf/, packages/, scripts/ and templates/
    /// (default: auto-detect from conf/config.yml)
    #[arg(long, global = true, env = "CDH_INSTALL_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Append logs to this file instead of <root>/logs/install.log
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install MySQL, Cloudera Manager server and agents on the configured groups
    Install {
        /// SSH password of the connecting user
        #[arg(short, long, env = "CDH_SSH_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Also set up database replication and haproxy
        #[arg(long)]
        ha: bool,
    },

    /// Prepare new hosts and install the Cloudera Manager agent on them
    Add {
        /// Comma separated host addresses
        #[arg(long)]
        hosts: Option<String>,

        /// SSH password of the connecting user
        #[arg(short, long, env = "CDH_SSH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Push ssh keys and run the capability check only
    Check {
        /// SSH password of the connecting user
        #[arg(short, long, env = "CDH_SSH_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Comma separated host addresses (default: the cluster group)
        #[arg(long)]
        hosts: Option<String>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Log to stderr and, when the file can be opened, to the install log.
fn init_logging(log_file: &Path) {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file = log_file
        .parent()
        .map_or(Ok(()), |dir| std::fs::create_dir_all(dir))
        .and_then(|_| OpenOptions::new().create(true).append(true).open(log_file));
    let file_layer = match file {
        Ok(f) => Some(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(f)),
        ),
        Err(e) => {
            eprintln!("warning: cannot open log file {}: {e}", log_file.display());
            None
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file_layer)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let root = root::resolve_root(cli.root.as_deref());
    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| cdh_core::paths::log_path(&root));
    init_logging(&log_file);

    let result = match cli.command {
        Commands::Install { password, ha } => cmd::install::run(&root, password, ha, cli.json),
        Commands::Add { hosts, password } => cmd::add::run(&root, hosts, password, cli.json),
        Commands::Check { password, hosts } => cmd::check::run(&root, password, hosts, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        let code = if e.is::<MissingInput>() { 2 } else { 1 };
        std::process::exit(code);
    }
}
