//! 遥控车板载服务主入口
//!
//! 打开接收机串口、ESC 命名管道和舵机 PWM，启动解码 / 舵机 / ESC 线程，
//! 并在主线程上监督它们，直到 Ctrl+C。

mod config;
mod diagnostics;
mod signal;

use anyhow::{Context, Result};
use clap::Parser;
use config::RoverConfig;
use rover_driver::{PipeEscLink, Servo, Vehicle, VehicleBuilder};
use rover_hal::{SerialReader, SysfsPwm, open_serial};
use signal::{InterruptAction, Shutdown};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "roverd=info,rover_driver=info";
const SUPERVISOR_TICK: Duration = Duration::from_millis(200);
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// 遥控车板载数据链路服务
#[derive(Parser, Debug)]
#[command(name = "roverd")]
#[command(about = "RC rover onboard data path: receiver → servo / ESC", long_about = None)]
struct Args {
    /// TOML 配置文件路径
    ///
    /// 默认: 使用内置默认值
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 接收机串口设备（覆盖配置文件）
    #[arg(long)]
    serial: Option<String>,

    /// 启用诊断端口
    #[arg(long)]
    diagnostics: bool,

    /// 诊断端口号（覆盖配置文件）
    #[arg(long)]
    port: Option<u16>,

    /// 日志级别或过滤指令（例如 `debug` 或 `rover_driver=trace`）
    ///
    /// 默认: RUST_LOG，未设置时为 `roverd=info,rover_driver=info`
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> Result<RoverConfig> {
    let mut config = match &args.config {
        Some(path) => RoverConfig::load(path)?,
        None => RoverConfig::default(),
    };

    if let Some(serial) = &args.serial {
        config.serial.path = serial.clone();
    }
    if args.diagnostics {
        config.diagnostics.enabled = true;
    }
    if let Some(port) = args.port {
        config.diagnostics.port = port;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// 打开所有设备并启动线程
fn start(config: &RoverConfig, is_running: &Arc<AtomicBool>) -> Result<Vehicle> {
    let port =
        open_serial(&config.serial_config()).context("Failed to open receiver serial port")?;

    let mut builder = VehicleBuilder::new()
        .receiver(SerialReader::new(port, is_running.clone()))
        .run_flag(is_running.clone())
        .pipeline_config(config.pipeline_config())
        .link_timeout(config.link_timeout());

    if config.esc.enabled {
        info!(
            "Connecting to ESC service via {} / {}",
            config.esc.command_pipe.display(),
            config.esc.response_pipe.display()
        );
        let link = PipeEscLink::open(
            &config.pipe_paths(),
            config.esc.pin,
            config.esc.speed_kbps,
            config.esc.mode.into(),
        )
        .context("Failed to initialize ESC")?;
        builder = builder.esc(link);
    } else {
        warn!("ESC loop disabled by configuration");
    }

    if config.servo.enabled {
        let pwm = SysfsPwm::open(config.servo.pwm_chip, config.servo.pwm_channel)
            .context("Failed to open servo PWM channel")?;
        let servo =
            Servo::new(pwm, config.servo_config()).context("Failed to initialize servo")?;
        builder = builder.servo(servo);
    } else {
        warn!("Servo loop disabled by configuration");
    }

    builder.build().context("Failed to start vehicle threads")
}

/// 主线程监督循环：报告退出的循环、链路丢失和周期性统计
fn supervise(vehicle: &Vehicle, is_running: &AtomicBool) {
    let mut remaining = vehicle.check_health().len();
    let mut link_alive = false;
    let mut last_report = Instant::now();

    while is_running.load(Ordering::Acquire) && remaining > 0 {
        if let Some(exit) = vehicle.wait_exit(SUPERVISOR_TICK) {
            remaining -= 1;
            match &exit.error {
                Some(reason) => error!("{} loop stopped: {}", exit.kind, reason),
                None => info!("{} loop stopped", exit.kind),
            }
        }

        let alive = vehicle.is_link_alive();
        if alive != link_alive {
            if alive {
                info!("Receiver link established");
            } else {
                warn!(
                    "Receiver link lost (no frame for {:?})",
                    vehicle.context().link().time_since_last_frame()
                );
            }
            link_alive = alive;
        }

        if last_report.elapsed() >= METRICS_INTERVAL {
            let m = vehicle.metrics();
            debug!(
                "frames: {} decoded / {} skipped / {} malformed, overwrites: {} ({:.1}%), \
                 ESC: {} sent / {} ok / {} err / {} protocol errors, servo updates: {}, io errors: {}",
                m.frames_decoded,
                m.frames_skipped,
                m.frames_malformed,
                m.slot_overwrites,
                m.overwrite_rate(),
                m.esc_commands_sent,
                m.esc_responses_ok,
                m.esc_responses_err,
                m.esc_protocol_errors,
                m.servo_updates,
                m.io_errors,
            );
            last_report = Instant::now();
        }
    }

    if remaining == 0 {
        error!("All loops have stopped");
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    let is_running = Arc::new(AtomicBool::new(true));
    let shutdown = Shutdown::new(is_running.clone());
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || match shutdown.on_interrupt() {
            InterruptAction::Exit(code) => {
                eprintln!("\nInterrupted during startup. Exiting.");
                process::exit(code);
            },
            InterruptAction::Stop => eprintln!("\nReceived interrupt signal. Shutting down..."),
        })
        .context("Failed to set signal handler")?;
    }

    let vehicle = start(&config, &is_running)?;
    shutdown.mark_started();

    let diagnostics = if config.diagnostics.enabled {
        let handle = diagnostics::spawn(
            config.diagnostics_addr(),
            vehicle.context(),
            is_running.clone(),
        )
        .context("Failed to start diagnostics listener")?;
        Some(handle)
    } else {
        None
    };

    info!("roverd started. Press Ctrl+C to stop.");
    supervise(&vehicle, &is_running);

    info!("Shutting down...");
    vehicle.stop();
    let summary = vehicle.metrics();
    drop(vehicle);
    if let Some(handle) = diagnostics
        && handle.join().is_err()
    {
        warn!("Diagnostics thread panicked");
    }

    info!(
        "Stopped after {} frames ({} ESC commands, {} servo updates)",
        summary.frames_decoded, summary.esc_commands_sent, summary.servo_updates
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    if let Err(e) = run(args) {
        error!("{:#}", e);
        eprintln!("roverd: {:#}", e);
        process::exit(1);
    }
}
