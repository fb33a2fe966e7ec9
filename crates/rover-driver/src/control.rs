//! 通道到执行器命令的映射
//!
//! 纯函数，不做 IO：控制循环读取最新通道帧后调用这里得到要执行的命令。

use rover_protocol::{
    CHANNEL_CENTER, CHANNEL_MAX, CHANNEL_MIN, ChannelFrame, REVERSE_THROTTLE_OFFSET,
};

/// 油门通道
pub const THROTTLE_CHANNEL: usize = 2;
/// 方向开关通道（2000 前进 / 1000 倒车 / 1500 空挡）
pub const DIRECTION_CHANNEL: usize = 8;
/// 遥测请求开关通道（1000 请求遥测）
pub const TELEMETRY_CHANNEL: usize = 9;
/// 默认舵机通道
pub const SERVO_CHANNEL: usize = 2;

/// 前进油门上限，保证与倒车区间（1024-2047）不重叠
pub const MAX_FORWARD_THROTTLE: u16 = REVERSE_THROTTLE_OFFSET - 1;

const SWITCH_LOW: u16 = CHANNEL_MIN;
const SWITCH_MID: u16 = CHANNEL_CENTER;
const SWITCH_HIGH: u16 = CHANNEL_MAX;

/// 一次 ESC 发送
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscAction {
    pub throttle: u16,
    pub telemetry: bool,
}

impl EscAction {
    pub const fn new(throttle: u16, telemetry: bool) -> Self {
        Self {
            throttle,
            telemetry,
        }
    }
}

/// 前进油门：`channel[2] - 1000`，低于 1000 取 0，上限 1023
pub fn forward_throttle(frame: &ChannelFrame) -> u16 {
    frame[THROTTLE_CHANNEL]
        .saturating_sub(CHANNEL_MIN)
        .min(MAX_FORWARD_THROTTLE)
}

/// ESC 策略（按优先级）
///
/// 1. `channel[9] == 1000` → 零油门并请求遥测
/// 2. `channel[8] == 2000` → 前进油门
/// 3. `channel[8] == 1000` → 倒车（油门 + 1024）
/// 4. `channel[8] == 1500` → 零油门
/// 5. 其他 → 不发送
pub fn esc_action(frame: &ChannelFrame) -> Option<EscAction> {
    let throttle = forward_throttle(frame);

    if frame[TELEMETRY_CHANNEL] == SWITCH_LOW {
        return Some(EscAction::new(0, true));
    }
    match frame[DIRECTION_CHANNEL] {
        SWITCH_HIGH => Some(EscAction::new(throttle, false)),
        SWITCH_LOW => Some(EscAction::new(throttle + REVERSE_THROTTLE_OFFSET, false)),
        SWITCH_MID => Some(EscAction::new(0, false)),
        _ => None,
    }
}

/// 舵机角度：`(channel[k] - 1000) * 90 / 1000`，限制在 `[min, max]` 内
///
/// 结果不大于 0 时返回 `None`（不更新舵机）；通道越界同样返回 `None`。
pub fn servo_angle(frame: &ChannelFrame, channel: usize, min: f64, max: f64) -> Option<f64> {
    let raw = frame.channel(channel)?;
    let angle = (f64::from(raw) - f64::from(CHANNEL_MIN)) * 90.0 / 1000.0;
    let angle = angle.clamp(min, max);
    (angle > 0.0).then_some(angle)
}
