//! 旧版二进制油门帧
//!
//! 早期 ESC 服务直接接收 16 位原始值，而不是文本命令：
//!
//! ```text
//!  15      12 11   10                     0
//! ┌──────────┬────┬────────────────────────┐
//! │ checksum │ T  │ throttle (11 bit)      │
//! └──────────┴────┴────────────────────────┘
//! ```
//!
//! - `throttle`: 0-1023 正转，1024-2047 反转（加 [`REVERSE_THROTTLE_OFFSET`]）
//! - `T`: 遥测请求位
//! - `checksum`: 对低 12 位计算的 4 位校验
//!
//! bilge 使用 LSB first 位序，第一个字段占最低位。
//!
//! [`REVERSE_THROTTLE_OFFSET`]: crate::REVERSE_THROTTLE_OFFSET

use crate::ProtocolError;
use bilge::prelude::*;

/// 油门字段最大值（11 位）
pub const LEGACY_THROTTLE_MAX: u16 = 0x07FF;

/// 低 12 位数据的 4 位校验
///
/// `!(d ^ (d >> 4) ^ (d >> 8)) & 0xF`
pub fn legacy_checksum(data: u16) -> u8 {
    (!(data ^ (data >> 4) ^ (data >> 8)) & 0x0F) as u8
}

/// 旧版油门帧（16 位）
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq, Eq)]
pub struct LegacyThrottleFrame {
    pub throttle: u11,  // Bit 0-10
    pub telemetry: bool, // Bit 11
    pub checksum: u4,   // Bit 12-15
}

impl LegacyThrottleFrame {
    /// 打包油门值和遥测位并附加校验
    ///
    /// # 错误
    /// - `ProtocolError::ThrottleOutOfRange`: 油门值超过 11 位
    pub fn encode(throttle: u16, telemetry: bool) -> Result<Self, ProtocolError> {
        if throttle > LEGACY_THROTTLE_MAX {
            return Err(ProtocolError::ThrottleOutOfRange {
                value: throttle,
                max: LEGACY_THROTTLE_MAX,
            });
        }

        let data = throttle | (u16::from(telemetry) << 11);
        Ok(Self::new(
            u11::new(throttle),
            telemetry,
            u4::new(legacy_checksum(data)),
        ))
    }

    /// 从原始 16 位值解析（不校验）
    pub fn from_raw(raw: u16) -> Self {
        Self::from(u16::new(raw))
    }

    /// 原始 16 位值
    pub fn raw(self) -> u16 {
        u16::from(self).value()
    }

    /// 高位在前的线上字节
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.raw().to_be_bytes()
    }

    /// 重新计算低 12 位的校验并与高 4 位比较
    pub fn verify(self) -> bool {
        legacy_checksum(self.raw() & 0x0FFF) == self.checksum().value()
    }
}
