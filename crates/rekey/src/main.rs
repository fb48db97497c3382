//! rekey CLI
//!
//! Rotates a secret inside a configuration file across a fleet of hosts
//! over SSH: backup, edit, verify, and restore on failed verification.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use rekey_core::{
    AssumeYes, AuditLog, Confirm, ExecutorFactory, Prompt, RotationConfig, RotationRecipe,
    RunOutcome, Rotator, SshExecutorFactory, load_hosts, preflight,
};
use rekey_exec::HostKeyPolicy;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "rekey")]
#[command(author, version, about = "Rotate a secret in a config file across a fleet of hosts", long_about = None)]
struct Cli {
    /// Configuration file (default: $REKEY_CONFIG, ./rekey.toml, /etc/rekey/rekey.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level for diagnostics on stderr (overrides config and is overridden by RUST_LOG)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotate the secret on every host in the host list
    Run(RunArgs),

    /// Print the hosts that a run would process
    Hosts {
        /// Host list file
        #[arg(long = "hosts", value_name = "FILE")]
        hosts_file: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    overrides: Overrides,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Print the commands for each host without connecting
    #[arg(long)]
    dry_run: bool,

    /// Print only the run summary, as JSON, on stdout (the transcript still goes to the log file)
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let (mut config, source) = Config::load_default(cli.config.as_deref())?;
    init_tracing(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match &source {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => info!("no config file found, using defaults"),
    }

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Run(args) => {
            config.apply(args.overrides.clone());
            run(&config, &args).await
        }
        Commands::Hosts { hosts_file } => {
            let path = hosts_file.unwrap_or(config.hosts_file);
            let hosts = load_hosts(&path)?;
            for host in &hosts {
                println!("{host}");
            }
            println!("Total: {}", hosts.len());
            Ok(())
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: &Config, args: &RunArgs) -> Result<()> {
    let rotation = config.to_rotation()?;

    if args.dry_run {
        let hosts = load_hosts(&rotation.hosts_file)?;
        print_plan(&rotation, &hosts);
        return Ok(());
    }

    let hosts = preflight(&rotation)?;

    if rotation.host_key_policy == HostKeyPolicy::AcceptAny {
        warn!("host keys are not verified; use --host-key-policy known-hosts to check them");
    }

    let factory = Arc::new(SshExecutorFactory::from_config(&rotation)?);
    let mut confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(Prompt::stdio())
    };

    let outcome = rotate(
        &config.log_dir,
        &rotation,
        &hosts,
        factory,
        confirm.as_mut(),
        args.json,
    )
    .await?;

    if let RunOutcome::Completed(summary) = outcome
        && args.json
    {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// Open this run's audit log and rotate every host through `factory`
async fn rotate(
    log_dir: &Path,
    rotation: &RotationConfig,
    hosts: &[String],
    factory: Arc<dyn ExecutorFactory>,
    confirm: &mut dyn Confirm,
    quiet: bool,
) -> Result<RunOutcome> {
    let audit = AuditLog::create(log_dir, Local::now())?.with_console(!quiet);
    if let Some(path) = audit.path() {
        info!(path = %path.display(), "writing audit log");
    }

    let rotator = Rotator::new(rotation, factory, audit);
    Ok(rotator.run(hosts, confirm).await?)
}

fn print_plan(rotation: &RotationConfig, hosts: &[String]) {
    let console = AuditLog::console_only();
    let recipe = RotationRecipe::new(rotation.target.clone());
    let started = Local::now();

    for host in hosts {
        let plan = recipe.plan(host, started);
        console.progress(format!("{}:", plan.host));
        for (step, command) in plan.steps {
            console.info(format!("  [{step}] {command}"));
        }
    }
    console.info(format!("Total servers: {}", hosts.len()));
}
