//! 接收机串口帧格式
//!
//! ```text
//! ┌────────────┬────────────┬──────────────────────────────────────┐
//! │ Length (1B)│ Type (1B)  │ Channels (14 × u16 LE = 28B)         │
//! │ = L        │ 0x40       │ ch0 ch1 ... ch13                     │
//! └────────────┴────────────┴──────────────────────────────────────┘
//!              └──────────── payload: L - 1 bytes ──────────────────┘
//! ```
//!
//! 长度字节包含自身。帧类型不是 `0x40` 的帧（例如心跳帧）被整体跳过。

use crate::ProtocolError;
use crate::channel::ChannelFrame;
use crate::constants::{CHANNEL_COUNT, CHANNEL_DATA_FRAME_LEN, CHANNEL_DATA_PAYLOAD_LEN};
use bytes::{BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 帧类型（payload 第 0 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum FrameType {
    /// 通道数据
    ChannelData = 0x40,
}

/// 一个 payload 的解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverPacket {
    /// 通道数据帧
    Channels(ChannelFrame),
    /// 未识别的帧类型（心跳或其他遥测），调用方应丢弃
    Unrecognized { header: u8 },
    /// 空 payload（长度字节为 0 或 1）
    Empty,
}

/// 解析一个完整 payload（不含长度字节）
///
/// # 错误
/// - `ProtocolError::InvalidLength`: 帧类型为通道数据但 payload 不足 29 字节
///
/// 超出 29 字节的部分被忽略。
pub fn parse_payload(payload: &[u8]) -> Result<ReceiverPacket, ProtocolError> {
    let Some((&header, body)) = payload.split_first() else {
        return Ok(ReceiverPacket::Empty);
    };

    match FrameType::try_from(header) {
        Ok(FrameType::ChannelData) => {
            if payload.len() < CHANNEL_DATA_PAYLOAD_LEN {
                return Err(ProtocolError::InvalidLength {
                    expected: CHANNEL_DATA_PAYLOAD_LEN,
                    actual: payload.len(),
                });
            }

            let mut channels = [0u16; CHANNEL_COUNT];
            for (value, bytes) in channels.iter_mut().zip(body.chunks_exact(2)) {
                *value = u16::from_le_bytes([bytes[0], bytes[1]]);
            }
            Ok(ReceiverPacket::Channels(ChannelFrame::new(channels)))
        },
        Err(_) => Ok(ReceiverPacket::Unrecognized { header }),
    }
}

/// 将通道帧编码为线上格式（长度字节 + 0x40 + 28 字节小端通道值）
pub fn encode_channel_frame(frame: &ChannelFrame, dst: &mut BytesMut) {
    dst.reserve(CHANNEL_DATA_FRAME_LEN as usize);
    dst.put_u8(CHANNEL_DATA_FRAME_LEN);
    dst.put_u8(FrameType::ChannelData.into());
    for &value in frame.channels() {
        dst.put_u16_le(value);
    }
}
