//! # Tank Monitor Application Entry Point
//!
//! This binary crate wires the reporting cycle to real or simulated collaborators
//! and runs it until Ctrl+C / SIGTERM. It supports both production mode (Pi
//! sensors and I2C LCD, built with `--features hardware`) and development mode
//! (`--simulate`, time-driven fake site and console LCD).
//!
//! ## Usage
//! ```text
//! tank-monitor [--simulate] [--config <path>] [--init-config]
//! ```

// Test modules
#[cfg(test)]
mod tests;

use anyhow::anyhow;
use std::env;
use tank_monitor_lib::climate::ClimateProbe;
use tank_monitor_lib::config::{Config, CONFIG_FILE};
use tank_monitor_lib::connectivity::LinkStatus;
use tank_monitor_lib::cycle::{CycleSettings, Peripherals, ReportingCycle};
use tank_monitor_lib::display::{ConsoleDisplay, StatusDisplay};
use tank_monitor_lib::indicator::{Indicator, LogIndicator};
use tank_monitor_lib::rain::RainAdc;
use tank_monitor_lib::range::DistanceProbe;
use tank_monitor_lib::simulate::{
    SimulatedClimate, SimulatedLink, SimulatedRain, SimulatedRange, SiteModel,
};
use tank_monitor_lib::telemetry::{TelemetrySink, Uplink};
use tracing::{error, info};

/// Value following `flag` on the command line, if any.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Structured logging, filtered by RUST_LOG (default `info`).
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    // Development mode: simulated site, no hardware needed
    let simulate = args.iter().any(|arg| arg == "--simulate");
    let config_path = flag_value(&args, "--config");

    let config = match config_path {
        Some(path) => {
            let mut config = Config::load_from_path(path);
            config.apply_env(|key| env::var(key).ok());
            config
        }
        None => Config::load(),
    };

    if args.iter().any(|arg| arg == "--init-config") {
        config
            .save_to_path(config_path.unwrap_or(CONFIG_FILE))
            .map_err(|e| anyhow!("Could not write config: {}", e))?;
        return Ok(());
    }

    // Single cooperative thread: sensors and radio are single-owner resources
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(config, simulate))
}

async fn run(config: Config, simulate: bool) -> anyhow::Result<()> {
    let settings = CycleSettings::from(&config);
    let telemetry = Uplink::from_config(&config.telemetry)?;

    if simulate {
        info!("Development mode: using simulated sensors");
        let model = SiteModel::new(config.tank.depth_cm);
        let parts = Peripherals {
            range: SimulatedRange::new(model, config.tank.sensor_offset_cm),
            rain: SimulatedRain::new(model),
            climate: SimulatedClimate::new(model),
            link: SimulatedLink,
            telemetry,
            display: ConsoleDisplay::stdout(config.display.width, config.scroll_delay()),
            indicator: LogIndicator::default(),
        };
        return drive(ReportingCycle::new(settings, parts)).await;
    }

    // Production mode: Pi sensors
    // This section requires GPIO/SPI access and the dht11 overlay
    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        use anyhow::Context;
        use tank_monitor_lib::display::Hd44780;
        use tank_monitor_lib::hardware::{GpioLed, HcSr04, I2cBackpack, Mcp3008};
        use tank_monitor_lib::sysfs::{IioClimateProbe, NetLink};

        let hw = &config.hardware;
        let gpio = rppal::gpio::Gpio::new().context("open GPIO")?;
        info!(
            trig = hw.trig_pin,
            echo = hw.echo_pin,
            led = hw.led_pin,
            adc_channel = hw.adc_channel,
            "GPIO pin configuration"
        );

        let backpack = I2cBackpack::new(hw.lcd_i2c_bus, hw.lcd_i2c_address)
            .context("LCD backpack on I2C")?;
        let mut display = Hd44780::new(backpack, config.display.width, config.scroll_delay());
        display.init().await.context("LCD init")?;

        let parts = Peripherals {
            range: HcSr04::new(&gpio, hw.trig_pin, hw.echo_pin).context("HC-SR04 pins")?,
            rain: Mcp3008::new(hw.adc_channel).context("MCP3008 on SPI0")?,
            climate: IioClimateProbe::new(&hw.iio_device),
            link: NetLink::new(
                &config.network.interface,
                config.network.reconnect_command.clone(),
            ),
            telemetry,
            display,
            indicator: GpioLed::new(&gpio, hw.led_pin).context("LED pin")?,
        };
        return drive(ReportingCycle::new(settings, parts)).await;
    }

    #[cfg(not(all(target_os = "linux", feature = "hardware")))]
    {
        let _ = (settings, telemetry);
        error!("Sensor drivers not enabled. Rebuild with --features hardware, or use --simulate.");
        return Err(anyhow!("hardware mode not available in this build"));
    }
}

/// Run the cycle until a shutdown signal arrives.
async fn drive<D, A, C, L, T, S, I>(mut cycle: ReportingCycle<D, A, C, L, T, S, I>) -> anyhow::Result<()>
where
    D: DistanceProbe,
    A: RainAdc,
    C: ClimateProbe,
    L: LinkStatus,
    T: TelemetrySink,
    S: StatusDisplay,
    I: Indicator,
{
    cycle.run(shutdown_signal()).await;
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM from systemd.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
