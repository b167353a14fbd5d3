//! Sensornode main entry point.
//!
//! Three modes, picked on the command line:
//!
//! - default: load the config, acquire the I2C bus if any enabled sensor
//!   needs it, connect to the broker, and enter the poll loop until
//!   interrupted;
//! - `--dry`: same loop, but no network connection is opened at all and
//!   payload lines only go to stdout/stderr;
//! - `--generate`: scan the hardware once, write `sensors.json` for
//!   operator review, and exit without polling.
//!
//! Fatal configuration errors diagnose to stderr and exit non-zero
//! before any hardware or network resource is acquired.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};

use sensornode::adapters::i2c::I2cRegisterBus;
use sensornode::adapters::mqtt::MqttPublisher;
use sensornode::app::ports::{NullPublisher, RegisterBus};
use sensornode::app::service::PollService;
use sensornode::config::{DEFAULT_CONFIG_PATH, NodeConfig};
use sensornode::discovery::{self, W1_DEVICES_DIR};

use linux_embedded_hal::I2cdev;

/// Settle time after opening the I2C device before the first transfer.
const BUS_WARMUP: Duration = Duration::from_secs(2);

/// Where `--generate` writes its output: the current directory for
/// review, not the live config path.
const GENERATED_CONFIG: &str = "sensors.json";

struct CliArgs {
    config_path: PathBuf,
    dry_run: bool,
    generate: bool,
}

const USAGE: &str = "\
Usage: sensornode [-c config_file] [--dry] [--generate]

Fetch and publish sensor values.

  -c <file>    config file, default is /etc/sensors.json
  --dry        dry run - print values, do not publish
  --generate   scan hardware, write sensors.json, and exit
  -h, --help   show this help
";

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut args = CliArgs {
        config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        dry_run: false,
        generate: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("-c requires a file argument\n{USAGE}"))?;
                args.config_path = PathBuf::from(value);
            }
            "--dry" => args.dry_run = true,
            "--generate" => args.generate = true,
            "-h" | "--help" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument \"{other}\"\n{USAGE}"),
        }
    }
    Ok(args)
}

fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "sensornode".into())
}

/// `--generate`: one-shot scan producing a config artifact for review.
fn run_generate() -> anyhow::Result<()> {
    let config = discovery::generate_config(
        |bus_num| match I2cRegisterBus::open(bus_num) {
            Ok(bus) => Some(bus),
            Err(e) => {
                warn!("I2C bus {bus_num}: {e:#}");
                None
            }
        },
        Path::new(W1_DEVICES_DIR),
        hostname(),
    );

    let out = Path::new(GENERATED_CONFIG);
    if out.exists() && !confirm_overwrite(out)? {
        println!("Aborted.");
        return Ok(());
    }

    let document = serde_json::to_string_pretty(&config).context("serialising config")?;
    std::fs::write(out, document + "\n")
        .with_context(|| format!("failed to write {GENERATED_CONFIG}"))?;

    println!(
        "Generated {GENERATED_CONFIG} with {} detected sensors",
        config.sensors.len()
    );
    println!("Review and edit the file to adjust locations and corrections as needed");
    Ok(())
}

fn confirm_overwrite(path: &Path) -> anyhow::Result<bool> {
    print!("{} already exists. Overwrite? [y/N] ", path.display());
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn run_poll_loop(args: &CliArgs) -> anyhow::Result<()> {
    let config = NodeConfig::load(&args.config_path)?;
    info!(
        "node \"{}\": {} sensors configured, interval {} s{}",
        config.node,
        config.sensors.len(),
        config.interval,
        if args.dry_run { " (dry run)" } else { "" }
    );

    // Acquire the register bus only when an enabled sensor needs it.
    let mut bus: Option<I2cRegisterBus<I2cdev>> = if config.needs_i2c() {
        let mut bus = I2cRegisterBus::open(config.i2c_bus)
            .with_context(|| format!("acquiring I2C bus {}", config.i2c_bus))?;
        bus.settle(BUS_WARMUP);
        Some(bus)
    } else {
        None
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("installing interrupt handler")?;
    }

    let service = PollService::new(&config, PathBuf::from(W1_DEVICES_DIR));
    let interval = Duration::from_secs(config.interval);

    if args.dry_run {
        service.run(bus.take(), NullPublisher, interval, &shutdown);
    } else {
        let client_id = format!("sensornode-{}", config.node);
        let publisher = MqttPublisher::connect(&config.mqtt.server, &config.mqtt.topic, &client_id)
            .with_context(|| format!("connecting to MQTT broker {}", config.mqtt.server))?;
        service.run(bus.take(), publisher, interval, &shutdown);
    }

    info!("interrupted, shut down cleanly");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    if args.generate {
        run_generate()
    } else {
        run_poll_loop(&args)
    }
}
