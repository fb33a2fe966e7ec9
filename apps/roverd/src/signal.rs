//! Ctrl+C 处理
//!
//! 启动阶段（打开命名管道、ESC 握手）的阻塞调用不检查运行标志，
//! 此时收到中断直接退出进程；线程启动之后只清除运行标志，由监督循环完成关闭。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 启动阶段被中断时的退出码（128 + SIGINT）
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// 收到中断后应执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// 立即以给定退出码结束进程
    Exit(i32),
    /// 运行标志已清除，等待各线程退出
    Stop,
}

/// 运行标志 + 启动完成标志
#[derive(Debug, Clone)]
pub struct Shutdown {
    is_running: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new(is_running: Arc<AtomicBool>) -> Self {
        Self {
            is_running,
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 线程已全部启动，之后的中断走协作式关闭
    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn on_interrupt(&self) -> InterruptAction {
        self.is_running.store(false, Ordering::Release);
        if self.started.load(Ordering::Acquire) {
            InterruptAction::Stop
        } else {
            InterruptAction::Exit(INTERRUPTED_EXIT_CODE)
        }
    }
}
