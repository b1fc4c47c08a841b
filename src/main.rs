use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use diskerase::config::{AppConfig, DEFAULT_LOG_FILE};
use diskerase::context::AppContext;
use diskerase::core::{ControllerHandle, DeviceDescriptor, Intent, Snapshot};
use diskerase::logging::{self, LogConfig};
use diskerase::cli::tui;
use serde::Serialize;
use tracing::info;

/// Upper bound for the controller to accept a non-destructive step.
const STEP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "diskerase")]
#[command(about = "Select, confirm and securely erase disks", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Serialize)]
struct GlobalArgs {
    /// Config file (default: ./diskerase.toml if present)
    #[serde(skip)]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    simulation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, short, global = true, num_args = 0..=1, default_missing_value = "true")]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    json_logs: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive device browser and erase workflow
    Tui,
    /// List erasable devices
    List {
        #[arg(long)]
        json: bool,
    },
    /// Erase a single device
    Erase {
        /// Device path, e.g. /dev/sdb
        device: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::new(cli.global.config.as_deref(), Some(&cli.global))?;

    // The TUI owns the terminal, so its logs always go to a file.
    let log_file = match (&cli.command, &config.log_file) {
        (_, Some(path)) => Some(path.clone()),
        (Commands::Tui, None) => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        _ => None,
    };
    let _guard = logging::init(LogConfig {
        json: config.json_logs,
        verbose: config.verbose,
        file: log_file,
    })?;

    match cli.command {
        Commands::Tui => tui::run(AppContext::new(config))
            .await
            .context("TUI exited with an error")?,
        Commands::List { json } => run_list(AppContext::new(config), json)
            .await
            .context("Failed to list devices")?,
        Commands::Erase { device, yes } => run_erase(AppContext::new(config), device, yes).await?,
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}

async fn run_list(ctx: AppContext, json: bool) -> Result<()> {
    let devices = ctx.enumerator.refresh().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!("{:<14}  {:<7}  {:<9}  MODEL", "DEVICE", "TYPE", "TRANSPORT");
    for d in &devices {
        println!(
            "{:<14}  {:<7}  {:<9}  {}",
            d.device_name, d.device_type, d.transport, d.model
        );
    }

    Ok(())
}

async fn run_erase(ctx: AppContext, device: String, yes: bool) -> Result<()> {
    let devices = ctx
        .enumerator
        .refresh()
        .await
        .context("Failed to list devices")?;
    let Some(target) = devices.into_iter().find(|d| d.device_name == device) else {
        bail!("{device} is not an available device (see `diskerase list`)");
    };

    let (handle, controller) = ctx.start_controller();

    handle.send(Intent::Select(device.clone())).await?;
    step(&handle, "select", |s| s.selection.as_deref() == Some(device.as_str())).await?;

    handle.send(Intent::RequestConfirm).await?;
    step(&handle, "confirmation", |s| s.state.is_confirming()).await?;

    let confirmed = yes || {
        let target = target.clone();
        tokio::task::spawn_blocking(move || prompt_erase(&target))
            .await
            .context("Confirmation prompt failed")??
    };

    if !confirmed {
        handle.send(Intent::Cancel).await?;
        step(&handle, "cancel", |s| s.state.is_browsing()).await?;
        println!("Aborted, nothing was erased.");
        return Ok(());
    }

    info!(device = %device, "Erase confirmed");
    handle.send(Intent::Confirm).await?;
    println!("Erasing {} ({})...", target.device_name, target.model);

    let snapshot = handle.wait_for(|s| s.last_episode.is_some()).await?;
    drop(handle);
    controller.await.context("Controller task failed")?;

    match snapshot.last_episode {
        Some(report) if report.succeeded => {
            println!("{}", report.message);
            Ok(())
        }
        Some(report) => bail!("Erase failed: {}", report.message),
        None => bail!("Erase finished without a result"),
    }
}

async fn step(
    handle: &ControllerHandle,
    what: &str,
    predicate: impl FnMut(&Snapshot) -> bool,
) -> Result<Snapshot> {
    match tokio::time::timeout(STEP_TIMEOUT, handle.wait_for(predicate)).await {
        Ok(snapshot) => snapshot,
        Err(_) => {
            let status = handle
                .snapshot()
                .status
                .map(|s| s.text().to_string())
                .unwrap_or_else(|| "no response".to_string());
            bail!("Controller did not accept {what}: {status}")
        }
    }
}

fn prompt_erase(target: &DeviceDescriptor) -> Result<bool> {
    use std::io::{Write, stdin, stdout};

    println!("About to erase:\n");
    println!("  Device:    {}", target.device_name);
    println!("  Model:     {}", target.model);
    println!("  Type:      {} ({})", target.device_type, target.transport);
    println!();
    println!("ALL DATA ON THIS DEVICE WILL BE PERMANENTLY DESTROYED.");
    print!("Erase {}? [y/N] ", target.device_name);
    stdout().flush()?;

    let mut input = String::new();
    stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}
