//! 最新值邮箱（Latest Value Slot）
//!
//! 单槽、覆盖写、带阻塞等待的跨线程交接原语：
//!
//! - 生产者 `publish` 永不阻塞，未读的旧值被直接覆盖（无队列，无背压）
//! - 消费者 `take_blocking` 等待未读值出现，取走后清除未读标志
//! - 唤醒后重新检查标志，伪唤醒不会返回旧值
//!
//! 一个槽只有一个“未读”标志，多个消费者共享一个槽时会互相抢占；
//! 需要多个消费者时使用 [`SlotFanout`]，每个消费者拥有自己的槽。

use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct SlotState<T> {
    value: Option<T>,
    unread: bool,
}

/// 单槽最新值邮箱
///
/// ```rust
/// use rover_driver::LatestValueSlot;
///
/// let slot = LatestValueSlot::new();
/// slot.publish(1);
/// slot.publish(2);
/// assert_eq!(slot.take_blocking(), 2);
/// assert_eq!(slot.try_take(), None);
/// assert_eq!(slot.latest(), Some(2));
/// ```
pub struct LatestValueSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
    overwrites: AtomicU64,
}

impl<T: Clone> LatestValueSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                unread: false,
            }),
            ready: Condvar::new(),
            overwrites: AtomicU64::new(0),
        }
    }

    /// 写入新值并唤醒所有等待者
    ///
    /// 返回 `true` 表示覆盖了一个尚未被读取的值。
    pub fn publish(&self, value: T) -> bool {
        let overwrote = {
            let mut state = self.state.lock();
            let overwrote = state.unread;
            state.value = Some(value);
            state.unread = true;
            overwrote
        };

        if overwrote {
            self.overwrites.fetch_add(1, Ordering::Relaxed);
        }
        self.ready.notify_all();
        overwrote
    }

    /// 阻塞等待未读值，取走后清除未读标志
    pub fn take_blocking(&self) -> T {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = Self::take_unread(&mut state) {
                return value;
            }
            self.ready.wait(&mut state);
        }
    }

    /// 最多等待 `timeout`，超时返回 `None`
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(value) = Self::take_unread(&mut state) {
                return Some(value);
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return Self::take_unread(&mut state);
            }
        }
    }

    /// 非阻塞读取：有未读值时取走并清除标志，否则返回 `None`
    pub fn try_take(&self) -> Option<T> {
        let mut state = self.state.lock();
        Self::take_unread(&mut state)
    }

    /// 最近一次写入的值（不论是否已读，不消费）
    pub fn latest(&self) -> Option<T> {
        self.state.lock().value.clone()
    }

    pub fn has_unread(&self) -> bool {
        self.state.lock().unread
    }

    /// 未读值被覆盖的累计次数
    pub fn overwrite_count(&self) -> u64 {
        self.overwrites.load(Ordering::Relaxed)
    }

    fn take_unread(state: &mut SlotState<T>) -> Option<T> {
        if !state.unread {
            return None;
        }
        let value = state.value.clone()?;
        state.unread = false;
        Some(value)
    }
}

impl<T: Clone> Default for LatestValueSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 一对多分发：每个订阅者拥有独立的槽和未读标志
pub struct SlotFanout<T> {
    subscribers: RwLock<Vec<Arc<LatestValueSlot<T>>>>,
}

impl<T: Clone> SlotFanout<T> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// 新增一个订阅者槽（只会收到之后发布的值）
    pub fn subscribe(&self) -> Arc<LatestValueSlot<T>> {
        let slot = Arc::new(LatestValueSlot::new());
        self.subscribers.write().push(slot.clone());
        slot
    }

    /// 写入所有订阅者槽，返回被覆盖的未读值个数
    pub fn publish(&self, value: T) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|slot| slot.publish(value.clone()))
            .count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl<T: Clone> Default for SlotFanout<T> {
    fn default() -> Self {
        Self::new()
    }
}
