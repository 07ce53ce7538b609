//! Command-line front end for Lighthouse Power Control.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use lighthouse_power_control::domain::controller::PowerController;
use lighthouse_power_control::domain::models::{OperationOutcome, PowerCommand};
use lighthouse_power_control::domain::ports::BleAdapter;
use lighthouse_power_control::domain::settings::SettingsService;
use lighthouse_power_control::infrastructure::host::{ConsoleHost, DetachedHost};
use lighthouse_power_control::infrastructure::logging::{init_logger, log_outcome};
use lighthouse_power_control::presentation::console::Console;

/// Power SteamVR base stations on and off over Bluetooth LE.
#[derive(Parser)]
#[command(name = "lighthouse-power", version, about)]
struct Cli {
    /// Path to a settings.json file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Power every bound base station on and exit.
    On,

    /// Put every bound base station to sleep and exit.
    Off,

    /// Power on, then power off again when the session is asked to quit.
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let settings_service = match cli.config {
        Some(path) => SettingsService::load(path),
        None => SettingsService::new()?,
    };
    let settings = settings_service.get().clone();
    let _logging = init_logger(&settings.log_settings)?;
    info!("Settings loaded from {}", settings_service.path().display());

    let controller_config = settings.controller_config()?;
    let mut controller = PowerController::new(ble_adapter()?, controller_config);
    let mut console = Console::stdout(settings.log_settings.ansi_colors);

    let all_ok = match cli.command.unwrap_or(Command::Watch) {
        Command::On => run_once(&mut controller, &mut console, PowerCommand::Activate).await?,
        Command::Off => run_once(&mut controller, &mut console, PowerCommand::Deactivate).await?,
        Command::Watch => run_watch(&mut controller, &mut console).await?,
    };

    Ok(if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Manual mode: no host runtime, one command, then exit
async fn run_once(
    controller: &mut PowerController,
    console: &mut Console<std::io::Stdout>,
    command: PowerCommand,
) -> anyhow::Result<bool> {
    let outcomes = controller.start(Box::new(DetachedHost)).await;
    let started_ok = present(console, "start", &outcomes)?;

    let outcomes = controller.send(command).await;
    let sent_ok = present(console, &command.to_string(), &outcomes)?;
    Ok(started_ok && sent_ok)
}

async fn run_watch(
    controller: &mut PowerController,
    console: &mut Console<std::io::Stdout>,
) -> anyhow::Result<bool> {
    let outcomes = controller.start(Box::new(ConsoleHost::new())).await;
    let started_ok = present(console, "start", &outcomes)?;

    let Some(exit_notice) = controller.take_exit_notice() else {
        // No host runtime to follow
        return Ok(started_ok);
    };

    println!("Watching session, press Ctrl-C to power the stations down and exit");
    let report = exit_notice.wait().await;
    controller.join_watcher();

    if report.quit_observed {
        info!("Session quit observed");
    }
    let shutdown_ok = present(console, "shutdown", &report.outcomes)?;
    Ok(started_ok && shutdown_ok)
}

fn present(
    console: &mut Console<std::io::Stdout>,
    phase: &str,
    outcomes: &[OperationOutcome],
) -> anyhow::Result<bool> {
    for outcome in outcomes {
        log_outcome(phase, outcome);
    }
    Ok(console.report(outcomes)?)
}

#[cfg(windows)]
fn ble_adapter() -> anyhow::Result<Arc<dyn BleAdapter>> {
    use lighthouse_power_control::infrastructure::bluetooth::WinRtBleAdapter;
    Ok(Arc::new(WinRtBleAdapter::new()))
}

#[cfg(not(windows))]
fn ble_adapter() -> anyhow::Result<Arc<dyn BleAdapter>> {
    Err(lighthouse_power_control::error::BleError::Unsupported.into())
}
