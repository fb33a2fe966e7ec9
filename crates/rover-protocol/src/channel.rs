//! 通道帧定义

use crate::constants::{CHANNEL_CENTER, CHANNEL_COUNT};
use std::ops::Index;

/// 接收机通道帧（14 路通道的一次完整快照）
///
/// # 设计特性
///
/// - **Copy trait**：28 字节，零成本复制，适合在线程间按值传递
/// - **不可变**：只能整体构造，没有逐字段修改的接口；
///   需要修改时使用 [`ChannelFrame::with_channel`] 生成新帧
/// - **固定长度**：通道数恒为 [`CHANNEL_COUNT`]（14）
///
/// 通道值约定范围为 `[1000, 2000]`，1500 为中位。
///
/// ```rust
/// use rover_protocol::ChannelFrame;
///
/// let frame = ChannelFrame::neutral().with_channel(2, 1800);
/// assert_eq!(frame[2], 1800);
/// assert_eq!(frame.channel(13), Some(1500));
/// assert_eq!(frame.channel(14), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelFrame {
    channels: [u16; CHANNEL_COUNT],
}

impl ChannelFrame {
    /// 从 14 个通道值创建帧
    pub const fn new(channels: [u16; CHANNEL_COUNT]) -> Self {
        Self { channels }
    }

    /// 所有通道位于中位（1500）的帧
    pub const fn neutral() -> Self {
        Self::new([CHANNEL_CENTER; CHANNEL_COUNT])
    }

    /// 获取指定通道值，越界返回 `None`
    pub fn channel(&self, index: usize) -> Option<u16> {
        self.channels.get(index).copied()
    }

    /// 获取全部通道
    pub fn channels(&self) -> &[u16; CHANNEL_COUNT] {
        &self.channels
    }

    /// 消费并返回通道数组
    pub fn into_inner(self) -> [u16; CHANNEL_COUNT] {
        self.channels
    }

    /// 返回替换了单个通道的新帧（越界时原样返回）
    pub fn with_channel(self, index: usize, value: u16) -> Self {
        let mut channels = self.channels;
        if let Some(slot) = channels.get_mut(index) {
            *slot = value;
        }
        Self::new(channels)
    }
}

impl Default for ChannelFrame {
    fn default() -> Self {
        Self::neutral()
    }
}

impl From<[u16; CHANNEL_COUNT]> for ChannelFrame {
    fn from(channels: [u16; CHANNEL_COUNT]) -> Self {
        Self::new(channels)
    }
}

impl From<ChannelFrame> for [u16; CHANNEL_COUNT] {
    fn from(frame: ChannelFrame) -> Self {
        frame.channels
    }
}

impl Index<usize> for ChannelFrame {
    type Output = u16;

    fn index(&self, index: usize) -> &Self::Output {
        &self.channels[index]
    }
}
