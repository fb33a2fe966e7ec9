//! 数据链路指标
//!
//! 原子计数器，任何线程都可以无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 数据链路实时指标
///
/// ```rust
/// use rover_driver::RoverMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = RoverMetrics::new();
/// metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_decoded, 1);
/// ```
#[derive(Debug, Default)]
pub struct RoverMetrics {
    /// 解码出的通道帧数
    pub frames_decoded: AtomicU64,

    /// 跳过的非通道帧数（心跳、遥测、空帧）
    pub frames_skipped: AtomicU64,

    /// 格式错误的通道帧数
    pub frames_malformed: AtomicU64,

    /// 邮箱中未读帧被覆盖的次数
    ///
    /// 快速增长说明控制循环跟不上接收机帧率。
    pub slot_overwrites: AtomicU64,

    /// 发送给 ESC 的命令数
    pub esc_commands_sent: AtomicU64,

    /// ESC 回复 OK 的次数
    pub esc_responses_ok: AtomicU64,

    /// ESC 回复 ERR 的次数
    pub esc_responses_err: AtomicU64,

    /// ESC 响应无法解析的次数
    pub esc_protocol_errors: AtomicU64,

    /// 舵机角度更新次数
    pub servo_updates: AtomicU64,

    /// 串口/管道/PWM IO 错误次数
    pub io_errors: AtomicU64,
}

impl RoverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            slot_overwrites: self.slot_overwrites.load(Ordering::Relaxed),
            esc_commands_sent: self.esc_commands_sent.load(Ordering::Relaxed),
            esc_responses_ok: self.esc_responses_ok.load(Ordering::Relaxed),
            esc_responses_err: self.esc_responses_err.load(Ordering::Relaxed),
            esc_protocol_errors: self.esc_protocol_errors.load(Ordering::Relaxed),
            servo_updates: self.servo_updates.load(Ordering::Relaxed),
            io_errors: self.io_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.frames_decoded.store(0, Ordering::Relaxed);
        self.frames_skipped.store(0, Ordering::Relaxed);
        self.frames_malformed.store(0, Ordering::Relaxed);
        self.slot_overwrites.store(0, Ordering::Relaxed);
        self.esc_commands_sent.store(0, Ordering::Relaxed);
        self.esc_responses_ok.store(0, Ordering::Relaxed);
        self.esc_responses_err.store(0, Ordering::Relaxed);
        self.esc_protocol_errors.store(0, Ordering::Relaxed);
        self.servo_updates.store(0, Ordering::Relaxed);
        self.io_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub frames_decoded: u64,
    pub frames_skipped: u64,
    pub frames_malformed: u64,
    pub slot_overwrites: u64,
    pub esc_commands_sent: u64,
    pub esc_responses_ok: u64,
    pub esc_responses_err: u64,
    pub esc_protocol_errors: u64,
    pub servo_updates: u64,
    pub io_errors: u64,
}

impl MetricsSnapshot {
    /// 被覆盖帧占解码帧的百分比（0.0-100.0）
    pub fn overwrite_rate(&self) -> f64 {
        if self.frames_decoded == 0 {
            return 0.0;
        }
        (self.slot_overwrites as f64 / self.frames_decoded as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = RoverMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = RoverMetrics::new();
        metrics.frames_decoded.fetch_add(100, Ordering::Relaxed);
        metrics.esc_commands_sent.fetch_add(50, Ordering::Relaxed);
        assert_eq!(metrics.snapshot().frames_decoded, 100);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_overwrite_rate() {
        let snapshot = MetricsSnapshot {
            frames_decoded: 200,
            slot_overwrites: 50,
            ..Default::default()
        };
        assert!((snapshot.overwrite_rate() - 25.0).abs() < 1e-9);
        assert_eq!(MetricsSnapshot::default().overwrite_rate(), 0.0);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(RoverMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().frames_decoded, 4000);
    }
}
