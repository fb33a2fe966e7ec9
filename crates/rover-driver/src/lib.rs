//! # Rover Driver
//!
//! 遥控车数据链路的驱动层：
//!
//! - `decoder`: 接收机字节流 → 通道帧
//! - `slot`: 跨线程最新值邮箱（覆盖写 + 阻塞等待）与一对多分发
//! - `esc`: ESC 链路（握手、文本命令、旧版校验帧）
//! - `control` / `servo`: 通道到 ESC 油门和舵机占空比的映射
//! - `pipeline`: 解码、舵机、ESC 三个循环
//! - `vehicle` / `builder`: 线程监督和链式构造
//!
//! 数据流：串口字节 → `FrameDecoder` → `SlotFanout` → 各控制循环 → `EscLink` / PWM

mod builder;
pub mod context;
pub mod control;
pub mod decoder;
mod error;
pub mod esc;
pub mod heartbeat;
pub mod metrics;
pub mod pipeline;
pub mod servo;
pub mod slot;
mod vehicle;

pub use builder::VehicleBuilder;
pub use context::RoverContext;
pub use control::{EscAction, esc_action, servo_angle};
pub use decoder::FrameDecoder;
pub use error::DriverError;
pub use esc::{BoxedEscLink, EscLink, EscWireMode, PipeEscLink, validate_speed};
pub use heartbeat::LinkMonitor;
pub use metrics::{MetricsSnapshot, RoverMetrics};
pub use pipeline::{LoopExit, LoopKind, PipelineConfig, decoder_loop, esc_loop, servo_loop};
pub use servo::{Servo, ServoConfig};
pub use slot::{LatestValueSlot, SlotFanout};
pub use vehicle::{BoxedReader, BoxedServo, Vehicle};

pub use rover_protocol::ChannelFrame;
