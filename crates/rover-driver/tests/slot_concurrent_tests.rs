//! 最新值邮箱并发测试
//!
//! 验证覆盖写语义、阻塞等待语义以及一对多分发在多线程下的行为。

use proptest::prelude::*;
use rover_driver::{LatestValueSlot, SlotFanout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// 连续发布 P1..Pn 后，一次阻塞读取得到 Pn
#[test]
fn test_take_blocking_returns_last_published() {
    let slot = LatestValueSlot::new();
    for i in 1..=10u32 {
        slot.publish(i);
    }
    assert_eq!(slot.take_blocking(), 10);
    assert!(!slot.has_unread());
    assert_eq!(slot.overwrite_count(), 9);
}

/// 阻塞读取不会在发布前返回
#[test]
fn test_take_blocking_waits_for_publish() {
    let slot = Arc::new(LatestValueSlot::<u32>::new());

    let consumer = {
        let slot = slot.clone();
        thread::spawn(move || slot.take_blocking())
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!consumer.is_finished());

    slot.publish(42);
    assert_eq!(consumer.join().unwrap(), 42);
}

/// 空邮箱上的非阻塞读取立即返回
#[test]
fn test_try_take_on_empty_slot_does_not_block() {
    let slot = LatestValueSlot::<u32>::new();
    let start = Instant::now();
    assert_eq!(slot.try_take(), None);
    assert!(start.elapsed() < Duration::from_millis(50));
}

/// 多个等待者都会被唤醒（各自订阅的邮箱）
#[test]
fn test_fanout_wakes_every_subscriber() {
    let fanout = Arc::new(SlotFanout::<u32>::new());
    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let slot = fanout.subscribe();
            thread::spawn(move || slot.take_blocking())
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    fanout.publish(7);

    for consumer in consumers {
        assert_eq!(consumer.join().unwrap(), 7);
    }
}

/// 高频生产者 + 慢消费者：消费者看到的值单调递增，最终读到最后一个值
#[test]
fn test_slow_consumer_sees_monotonic_values() {
    let slot = Arc::new(LatestValueSlot::<u64>::new());
    let total = 10_000u64;

    let producer = {
        let slot = slot.clone();
        thread::spawn(move || {
            for i in 1..=total {
                slot.publish(i);
                if i % 100 == 0 {
                    thread::yield_now();
                }
            }
        })
    };

    let consumer = {
        let slot = slot.clone();
        thread::spawn(move || {
            let mut last = 0u64;
            let mut seen = 0usize;
            while last < total {
                let value = slot.take_blocking();
                assert!(value > last, "value went backwards: {value} <= {last}");
                last = value;
                seen += 1;
                thread::sleep(Duration::from_micros(50));
            }
            seen
        })
    };

    producer.join().unwrap();
    let seen = consumer.join().unwrap();
    assert!(seen >= 1);
    assert!(seen as u64 <= total);

    // 被消费的次数 + 被覆盖的次数 = 发布次数
    assert_eq!(seen as u64 + slot.overwrite_count(), total);
}

/// 有界等待在超时后返回 None
#[test]
fn test_take_timeout_expires() {
    let slot = LatestValueSlot::<u32>::new();
    let start = Instant::now();
    assert_eq!(slot.take_timeout(Duration::from_millis(30)), None);
    assert!(start.elapsed() >= Duration::from_millis(30));
}

proptest! {
    /// 任意发布序列之后，读取结果总是最后一个值，且只能读一次
    #[test]
    fn prop_last_write_wins(values in prop::collection::vec(any::<u16>(), 1..64)) {
        let slot = LatestValueSlot::new();
        for value in &values {
            slot.publish(*value);
        }
        prop_assert_eq!(slot.try_take(), values.last().copied());
        prop_assert_eq!(slot.try_take(), None);
        prop_assert_eq!(slot.latest(), values.last().copied());
        prop_assert_eq!(slot.overwrite_count(), values.len() as u64 - 1);
    }
}
