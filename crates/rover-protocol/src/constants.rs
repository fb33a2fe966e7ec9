//! 协议常量定义

/// 接收机每帧携带的通道数
pub const CHANNEL_COUNT: usize = 14;

/// 通道最小值（对应 1000µs 脉宽）
pub const CHANNEL_MIN: u16 = 1000;

/// 通道中位值（中立位）
pub const CHANNEL_CENTER: u16 = 1500;

/// 通道最大值（对应 2000µs 脉宽）
pub const CHANNEL_MAX: u16 = 2000;

/// 通道数据帧的帧类型字节
pub const FRAME_TYPE_CHANNEL_DATA: u8 = 0x40;

/// 通道数据帧 payload 长度（1 字节帧类型 + 14 × 2 字节通道值）
pub const CHANNEL_DATA_PAYLOAD_LEN: usize = 1 + CHANNEL_COUNT * 2;

/// 通道数据帧的长度字节（包含长度字节自身，= 0x1E）
pub const CHANNEL_DATA_FRAME_LEN: u8 = (CHANNEL_DATA_PAYLOAD_LEN + 1) as u8;

/// 接收机串口波特率
pub const RECEIVER_BAUD_RATE: u32 = 115_200;

/// 反向油门偏移（旧版油门帧中 1024-2047 表示反转）
pub const REVERSE_THROTTLE_OFFSET: u16 = 1024;
