//! 共享状态上下文
//!
//! 保存最近一帧通道数据的只读快照，供诊断、监控等非控制路径读取。
//! 控制循环不从这里取数据，它们使用各自的邮箱。

use crate::heartbeat::LinkMonitor;
use arc_swap::ArcSwapOption;
use rover_protocol::ChannelFrame;
use std::sync::Arc;
use std::time::Duration;

/// 默认链路超时：超过该时间没有新帧视为接收机断开
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_millis(500);

/// 共享状态上下文
pub struct RoverContext {
    /// 最近一帧（无锁读取）
    latest_frame: ArcSwapOption<ChannelFrame>,
    /// 接收机链路监控
    link: LinkMonitor,
}

impl RoverContext {
    pub fn new() -> Self {
        Self::with_link_timeout(DEFAULT_LINK_TIMEOUT)
    }

    pub fn with_link_timeout(timeout: Duration) -> Self {
        Self {
            latest_frame: ArcSwapOption::empty(),
            link: LinkMonitor::new(timeout),
        }
    }

    /// 记录新解码的帧
    pub fn record_frame(&self, frame: ChannelFrame) {
        self.latest_frame.store(Some(Arc::new(frame)));
        self.link.register_frame();
    }

    /// 最近一帧的副本（尚未收到任何帧时为 `None`）
    pub fn latest_frame(&self) -> Option<ChannelFrame> {
        self.latest_frame.load().as_deref().copied()
    }

    pub fn link(&self) -> &LinkMonitor {
        &self.link
    }
}

impl Default for RoverContext {
    fn default() -> Self {
        Self::new()
    }
}
