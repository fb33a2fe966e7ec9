//! Builder 模式实现
//!
//! 提供链式构造 `Vehicle` 实例的便捷方式。

use crate::context::{DEFAULT_LINK_TIMEOUT, RoverContext};
use crate::error::DriverError;
use crate::esc::{BoxedEscLink, EscLink};
use crate::pipeline::PipelineConfig;
use crate::servo::Servo;
use crate::vehicle::{BoxedReader, BoxedServo, Vehicle};
use rover_hal::PwmOutput;
use std::io::{BufRead, Read, Write};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Vehicle Builder（链式构造）
///
/// 接收机字节流必须提供；舵机和 ESC 可选，未提供的循环不启动。
///
/// # Example
///
/// ```
/// use rover_driver::{PipelineConfig, VehicleBuilder};
/// use std::io::Cursor;
/// use std::time::Duration;
///
/// let vehicle = VehicleBuilder::new()
///     .receiver(Cursor::new(Vec::new()))
///     .pipeline_config(PipelineConfig::default())
///     .link_timeout(Duration::from_millis(200))
///     .build()
///     .unwrap();
/// vehicle.stop();
/// ```
pub struct VehicleBuilder {
    reader: Option<BoxedReader>,
    servo: Option<BoxedServo>,
    esc: Option<BoxedEscLink>,
    pipeline_config: PipelineConfig,
    is_running: Option<Arc<AtomicBool>>,
    link_timeout: Duration,
}

impl VehicleBuilder {
    pub fn new() -> Self {
        Self {
            reader: None,
            servo: None,
            esc: None,
            pipeline_config: PipelineConfig::default(),
            is_running: None,
            link_timeout: DEFAULT_LINK_TIMEOUT,
        }
    }

    /// 接收机字节流（串口或测试用的内存流）
    pub fn receiver(mut self, reader: impl Read + Send + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// 舵机（启动舵机循环）
    pub fn servo<P: PwmOutput + 'static>(mut self, servo: Servo<P>) -> Self {
        self.servo = Some(servo.boxed());
        self
    }

    /// 已握手的 ESC 链路（启动 ESC 循环）
    pub fn esc<W, R>(mut self, link: EscLink<W, R>) -> Self
    where
        W: Write + Send + 'static,
        R: BufRead + Send + 'static,
    {
        self.esc = Some(link.boxed());
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = config;
        self
    }

    /// 共享运行标志（例如与 `SerialReader` 或信号处理共用）
    pub fn run_flag(mut self, is_running: Arc<AtomicBool>) -> Self {
        self.is_running = Some(is_running);
        self
    }

    /// 接收机链路超时
    pub fn link_timeout(mut self, timeout: Duration) -> Self {
        self.link_timeout = timeout;
        self
    }

    /// 启动所有线程
    ///
    /// # 错误
    /// - `DriverError::Config`: 未提供接收机字节流，或周期为 0
    /// - `DriverError::Spawn`: 线程启动失败
    pub fn build(self) -> Result<Vehicle, DriverError> {
        let reader = self
            .reader
            .ok_or_else(|| DriverError::Config("receiver stream is required".to_string()))?;

        let config = self.pipeline_config;
        if config.servo_period.is_zero() || config.esc_period.is_zero() {
            return Err(DriverError::Config(format!(
                "loop periods must be non-zero: {:?}",
                config
            )));
        }

        let is_running = self
            .is_running
            .unwrap_or_else(|| Arc::new(AtomicBool::new(true)));
        let ctx = Arc::new(RoverContext::with_link_timeout(self.link_timeout));

        Vehicle::spawn(reader, self.servo, self.esc, config, is_running, ctx)
    }
}

impl Default for VehicleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_builder_requires_receiver() {
        assert!(matches!(
            VehicleBuilder::new().build(),
            Err(DriverError::Config(_))
        ));
    }

    #[test]
    fn test_builder_rejects_zero_period() {
        let result = VehicleBuilder::new()
            .receiver(Cursor::new(Vec::new()))
            .pipeline_config(PipelineConfig {
                esc_period: Duration::ZERO,
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(DriverError::Config(_))));
    }

    #[test]
    fn test_builder_shares_run_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let vehicle = VehicleBuilder::new()
            .receiver(Cursor::new(Vec::new()))
            .run_flag(flag.clone())
            .build()
            .unwrap();

        vehicle.stop();
        assert!(!flag.load(std::sync::atomic::Ordering::Acquire));
    }
}
