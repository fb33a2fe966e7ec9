//! # Rover Protocol
//!
//! 遥控车数据链路的协议定义（无硬件依赖，无 IO）
//!
//! ## 模块
//!
//! - `channel`: `ChannelFrame` 通道帧（14 路 u16）
//! - `receiver`: 接收机串口帧格式（长度前缀 + 帧类型 + 小端通道数据）
//! - `esc`: ESC 文本命令协议（`THROTTLE` / `OK` / `ERR`）和握手
//! - `legacy`: 旧版二进制油门帧（12 位油门 + 4 位校验）
//! - `constants`: 协议常量
//!
//! ## 字节序
//!
//! 接收机通道数据使用小端字节序（Little Endian）；
//! 旧版油门帧按高位在前（大端）写出。

pub mod channel;
pub mod constants;
pub mod esc;
pub mod legacy;
pub mod receiver;

// 重新导出常用类型
pub use channel::ChannelFrame;
pub use constants::*;
pub use esc::{EscCommand, EscCommandKind, EscSpeed, HandshakeRequest, parse_handshake_reply};
pub use legacy::{LegacyThrottleFrame, legacy_checksum};
pub use receiver::{FrameType, ReceiverPacket, encode_channel_frame, parse_payload};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Malformed ESC command: {line:?}")]
    MalformedCommand { line: String },

    #[error("Unknown ESC command kind: {kind}")]
    UnknownCommandKind { kind: String },

    #[error("Invalid ESC target id: {value:?}")]
    InvalidTargetId { value: String },

    #[error("ESC payload must not contain a line break")]
    PayloadContainsNewline,

    #[error("Unsupported ESC speed: {kbps} kbit/s (supported: 150, 300, 600, 1200)")]
    UnsupportedSpeed { kbps: u32 },

    #[error("Throttle out of range: {value} (max: {max})")]
    ThrottleOutOfRange { value: u16, max: u16 },
}
