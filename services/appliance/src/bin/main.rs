use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use appliance::{boot, load_manager_config, parse_selection, ApplianceServices, Heartbeat};
use clap::{ArgAction, Parser};
use servicecore::HostPlatform;
use servicemanagement::ServiceRegistration;

const TAG: &str = "Main";

static REGISTRATION: ServiceRegistration = ServiceRegistration::new();

#[derive(Parser, Debug, Clone)]
#[command(about = "Appliance service host")]
struct Args {
    /// Services shipped in this build, comma separated
    #[arg(long, env = "APPLIANCE_SERVICES", default_value = "ui,matter,mqtt")]
    services: String,

    /// Root of the host storage (nvs.json and fs/)
    #[arg(long, env = "APPLIANCE_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Optional JSON manager configuration
    #[arg(long, env = "APPLIANCE_MANAGER_CONFIG")]
    config: Option<PathBuf>,

    /// Settle time between UI and MATTER startup
    #[arg(long, env = "APPLIANCE_DISPLAY_SETTLE_MS")]
    display_settle_ms: Option<u64>,

    #[arg(long, env = "MQTT_BROKER", default_value = "127.0.0.1:1883")]
    mqtt_broker: String,

    /// Seconds to run before exiting, 0 runs until Ctrl+C
    #[arg(long, env = "APPLIANCE_RUN_FOR_SECS", default_value_t = 0)]
    run_for_secs: u64,

    #[arg(long, env = "APPLIANCE_HEARTBEAT", default_value_t = true, action = ArgAction::Set)]
    heartbeat: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let selection = parse_selection(&args.services)?;
    let config = load_manager_config(args.config.as_deref(), args.display_settle_ms)?;
    let services = ApplianceServices::new(selection).with_mqtt_broker(&args.mqtt_broker);
    let platform = Arc::new(HostPlatform::new(&args.data_dir));

    log::info!(target: TAG, "Appliance starting, data in {}", args.data_dir.display());

    let appliance = tokio::task::spawn_blocking(move || boot(platform, &REGISTRATION, services, config)).await?;

    if let Some(report) = appliance.manager.last_report() {
        log::info!(target: TAG, "Startup report: {}", serde_json::to_string(&report)?);
    }
    log::debug!(
        target: TAG,
        "Manager status: {}",
        serde_json::to_string_pretty(&appliance.manager.status())?
    );

    let heartbeat = Heartbeat::new();
    let run_for = (args.run_for_secs > 0).then(|| Duration::from_secs(args.run_for_secs));

    tokio::select! {
        _ = async {
            if args.heartbeat {
                heartbeat.run().await
            } else {
                std::future::pending::<()>().await
            }
        } => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            log::info!(target: TAG, "Ctrl+C received, shutting down");
        }
        _ = async {
            match run_for {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        } => {
            log::info!(target: TAG, "Run time elapsed, shutting down");
        }
    }

    appliance.stop_services();
    log::info!(target: TAG, "{} heartbeat(s)", heartbeat.beats());
    Ok(())
}
