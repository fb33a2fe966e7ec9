//! Pipeline 循环模块
//!
//! 每个活动占用一个专用线程：
//!
//! - 解码循环：串口字节 → 通道帧 → 分发到各消费者邮箱
//! - 舵机循环：固定周期取新帧，映射角度并写 PWM
//! - ESC 循环：固定周期轮询邮箱，重复应用最近一帧的油门策略
//!
//! 每轮迭代检查一次运行标志。循环因致命错误退出时返回 `Err`，
//! 由调用方（`Vehicle`）上报给监督者；其他循环不受影响。

use crate::control::{SERVO_CHANNEL, esc_action, servo_angle};
use crate::context::RoverContext;
use crate::decoder::FrameDecoder;
use crate::error::DriverError;
use crate::esc::EscLink;
use crate::metrics::RoverMetrics;
use crate::servo::Servo;
use crate::slot::{LatestValueSlot, SlotFanout};
use rover_hal::PwmOutput;
use rover_protocol::ChannelFrame;
use std::fmt;
use std::io::{BufRead, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Pipeline 配置
///
/// ```
/// use rover_driver::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig {
///     esc_period: Duration::from_millis(20),
///     ..Default::default()
/// };
/// assert_eq!(config.servo_period, Duration::from_millis(21));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 舵机循环周期
    pub servo_period: Duration,
    /// ESC 循环周期
    pub esc_period: Duration,
    /// 舵机读取的通道
    pub servo_channel: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            servo_period: Duration::from_millis(21),
            esc_period: Duration::from_millis(10),
            servo_channel: SERVO_CHANNEL,
        }
    }
}

/// 循环类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Decoder,
    Servo,
    Esc,
}

impl LoopKind {
    pub fn thread_name(self) -> &'static str {
        match self {
            LoopKind::Decoder => "rover-decoder",
            LoopKind::Servo => "rover-servo",
            LoopKind::Esc => "rover-esc",
        }
    }
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopKind::Decoder => "decoder",
            LoopKind::Servo => "servo",
            LoopKind::Esc => "ESC",
        };
        f.write_str(name)
    }
}

/// 循环退出通知（发送给监督者）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopExit {
    pub kind: LoopKind,
    /// `None` 表示正常停止，否则为致命错误描述
    pub error: Option<String>,
}

impl LoopExit {
    pub fn from_result(kind: LoopKind, result: &Result<(), DriverError>) -> Self {
        Self {
            kind,
            error: result.as_ref().err().map(ToString::to_string),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// 解码循环
///
/// 读取字节流直到 IO 错误或运行标志清除，每个通道帧写入所有订阅者邮箱
/// 并更新共享上下文。运行标志清除后出现的读错误视为正常停止。
pub fn decoder_loop(
    reader: impl Read,
    fanout: Arc<SlotFanout<ChannelFrame>>,
    ctx: Arc<RoverContext>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<RoverMetrics>,
) -> Result<(), DriverError> {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => info!("Decoder thread priority set to MAX (realtime)"),
            Err(e) => warn!(
                "Failed to set decoder thread priority: {:?}. \
                On Linux, you may need to run with CAP_SYS_NICE.",
                e
            ),
        }
    }

    let mut decoder = FrameDecoder::new(reader).with_metrics(metrics.clone());

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Decoder thread: is_running flag is false, exiting");
            return Ok(());
        }

        match decoder.next_frame() {
            Ok(frame) => {
                let overwritten = fanout.publish(frame);
                if overwritten > 0 {
                    metrics
                        .slot_overwrites
                        .fetch_add(overwritten as u64, Ordering::Relaxed);
                }
                ctx.record_frame(frame);
            },
            Err(e) => {
                if !is_running.load(Ordering::Acquire) {
                    debug!("Decoder thread: read interrupted by shutdown: {}", e);
                    return Ok(());
                }
                error!("Decoder thread: fatal stream error: {}", e);
                return Err(e);
            },
        }
    }
}

/// 舵机循环
///
/// 每个周期最多等待一个周期的新帧；角度不大于 0 时不更新舵机。
pub fn servo_loop<P: PwmOutput>(
    slot: Arc<LatestValueSlot<ChannelFrame>>,
    mut servo: Servo<P>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<RoverMetrics>,
) -> Result<(), DriverError> {
    let min = servo.config().min_angle;
    let max = servo.config().max_angle;
    info!(
        "Servo loop started: channel {}, period {:?}",
        config.servo_channel, config.servo_period
    );

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Servo thread: is_running flag is false, exiting");
            return Ok(());
        }

        let started = Instant::now();
        let Some(frame) = slot.take_timeout(config.servo_period) else {
            continue;
        };

        if let Some(angle) = servo_angle(&frame, config.servo_channel, min, max) {
            match servo.set_angle(angle) {
                Ok(_) => {
                    metrics.servo_updates.fetch_add(1, Ordering::Relaxed);
                },
                Err(e) if e.is_fatal() => {
                    metrics.io_errors.fetch_add(1, Ordering::Relaxed);
                    error!("Servo thread: fatal PWM error: {}", e);
                    return Err(e);
                },
                Err(e) => warn!("Servo thread: skipping update: {}", e),
            }
        }

        spin_sleep::sleep(config.servo_period.saturating_sub(started.elapsed()));
    }
}

/// ESC 循环
///
/// 每个周期非阻塞地取新帧，没有新帧时沿用上一帧，ESC 需要连续的命令流。
/// 响应无法解析时跳过本周期；流错误终止本循环。
pub fn esc_loop<W: Write, R: BufRead>(
    slot: Arc<LatestValueSlot<ChannelFrame>>,
    mut link: EscLink<W, R>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<RoverMetrics>,
) -> Result<(), DriverError> {
    info!(
        "ESC loop started: endpoint {}, period {:?}",
        link.id(),
        config.esc_period
    );
    let mut last_frame: Option<ChannelFrame> = None;

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("ESC thread: is_running flag is false, exiting");
            return Ok(());
        }

        let started = Instant::now();
        if let Some(frame) = slot.try_take() {
            last_frame = Some(frame);
        }

        if let Some(frame) = last_frame
            && let Some(action) = esc_action(&frame)
        {
            metrics.esc_commands_sent.fetch_add(1, Ordering::Relaxed);
            match link.send_frame(action.throttle, action.telemetry) {
                Ok(Some(response)) if response.is_err() => {
                    metrics.esc_responses_err.fetch_add(1, Ordering::Relaxed);
                    warn!("ESC rejected command: {}", response.payload);
                },
                Ok(Some(_)) => {
                    metrics.esc_responses_ok.fetch_add(1, Ordering::Relaxed);
                },
                Ok(None) => {},
                Err(e) if e.is_fatal() => {
                    metrics.io_errors.fetch_add(1, Ordering::Relaxed);
                    if !is_running.load(Ordering::Acquire) {
                        debug!("ESC thread: stream closed during shutdown: {}", e);
                        return Ok(());
                    }
                    error!("ESC thread: fatal stream error: {}", e);
                    return Err(e);
                },
                Err(e) => {
                    metrics.esc_protocol_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("ESC thread: skipping cycle: {}", e);
                },
            }
        }

        spin_sleep::sleep(config.esc_period.saturating_sub(started.elapsed()));
    }
}
