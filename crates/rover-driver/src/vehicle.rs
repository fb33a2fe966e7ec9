//! Vehicle 监督者
//!
//! 启动解码、舵机、ESC 线程并持有它们的句柄。线程因致命错误退出时通过
//! 退出通道通知监督者；`Drop` 时清除运行标志并带超时地 join 所有线程。

use crate::context::RoverContext;
use crate::error::DriverError;
use crate::esc::BoxedEscLink;
use crate::metrics::{MetricsSnapshot, RoverMetrics};
use crate::pipeline::{LoopExit, LoopKind, PipelineConfig, decoder_loop, esc_loop, servo_loop};
use crate::servo::Servo;
use crate::slot::{LatestValueSlot, SlotFanout};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rover_hal::PwmOutput;
use rover_protocol::ChannelFrame;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

/// 类型擦除后的接收机字节流
pub type BoxedReader = Box<dyn Read + Send>;
/// 类型擦除后的舵机
pub type BoxedServo = Servo<Box<dyn PwmOutput>>;

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // 看门狗线程负责 join，本线程只等待有限时间
        thread::spawn(move || {
            let _ = tx.send(self.join().map(|_| ()));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 车辆数据链路（对外 API）
pub struct Vehicle {
    ctx: Arc<RoverContext>,
    metrics: Arc<RoverMetrics>,
    fanout: Arc<SlotFanout<ChannelFrame>>,
    is_running: Arc<AtomicBool>,
    exit_rx: Receiver<LoopExit>,
    threads: Vec<(LoopKind, JoinHandle<()>)>,
    join_timeout: Duration,
}

impl Vehicle {
    /// 启动所有线程
    ///
    /// 每个消费者循环拥有自己的邮箱，先订阅再启动解码线程，
    /// 保证第一帧就能送达所有消费者。
    pub(crate) fn spawn(
        reader: BoxedReader,
        servo: Option<BoxedServo>,
        esc: Option<BoxedEscLink>,
        config: PipelineConfig,
        is_running: Arc<AtomicBool>,
        ctx: Arc<RoverContext>,
    ) -> Result<Self, DriverError> {
        let metrics = Arc::new(RoverMetrics::new());
        let fanout = Arc::new(SlotFanout::new());
        let (exit_tx, exit_rx) = crossbeam_channel::unbounded();

        let mut vehicle = Self {
            ctx: ctx.clone(),
            metrics: metrics.clone(),
            fanout: fanout.clone(),
            is_running: is_running.clone(),
            exit_rx,
            threads: Vec::with_capacity(3),
            join_timeout: Duration::from_secs(2),
        };

        if let Some(servo) = servo {
            let slot = fanout.subscribe();
            let (config, is_running, metrics) =
                (config.clone(), is_running.clone(), metrics.clone());
            vehicle.spawn_loop(LoopKind::Servo, &exit_tx, move || {
                servo_loop(slot, servo, config, is_running, metrics)
            })?;
        }

        if let Some(esc) = esc {
            let slot = fanout.subscribe();
            let (config, is_running, metrics) =
                (config.clone(), is_running.clone(), metrics.clone());
            vehicle.spawn_loop(LoopKind::Esc, &exit_tx, move || {
                esc_loop(slot, esc, config, is_running, metrics)
            })?;
        }

        vehicle.spawn_loop(LoopKind::Decoder, &exit_tx, move || {
            decoder_loop(reader, fanout, ctx, is_running, metrics)
        })?;

        info!("Vehicle started with {} threads", vehicle.threads.len());
        Ok(vehicle)
    }

    fn spawn_loop<F>(
        &mut self,
        kind: LoopKind,
        exit_tx: &Sender<LoopExit>,
        body: F,
    ) -> Result<(), DriverError>
    where
        F: FnOnce() -> Result<(), DriverError> + Send + 'static,
    {
        let exit_tx = exit_tx.clone();
        let handle = thread::Builder::new()
            .name(kind.thread_name().to_string())
            .spawn(move || {
                let result = body();
                let _ = exit_tx.send(LoopExit::from_result(kind, &result));
            })
            .map_err(|source| DriverError::Spawn {
                name: kind.thread_name(),
                source,
            })?;
        self.threads.push((kind, handle));
        Ok(())
    }

    /// 等待下一个循环退出通知
    pub fn wait_exit(&self, timeout: Duration) -> Option<LoopExit> {
        self.exit_rx.recv_timeout(timeout).ok()
    }

    /// 为额外的消费者订阅一个邮箱
    pub fn subscribe(&self) -> Arc<LatestValueSlot<ChannelFrame>> {
        self.fanout.subscribe()
    }

    /// 各线程是否仍在运行
    pub fn check_health(&self) -> Vec<(LoopKind, bool)> {
        self.threads
            .iter()
            .map(|(kind, handle)| (*kind, !handle.is_finished()))
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.threads.iter().all(|(_, handle)| !handle.is_finished())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 通知所有线程退出（不等待）
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::Release);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn latest_frame(&self) -> Option<ChannelFrame> {
        self.ctx.latest_frame()
    }

    pub fn context(&self) -> Arc<RoverContext> {
        self.ctx.clone()
    }

    pub fn is_link_alive(&self) -> bool {
        self.ctx.link().is_alive()
    }
}

impl Drop for Vehicle {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        for (kind, handle) in self.threads.drain(..) {
            if let Err(_e) = handle.join_timeout(self.join_timeout) {
                error!(
                    "{} thread panicked or failed to shut down within {:?}",
                    kind, self.join_timeout
                );
            }
        }
    }
}
