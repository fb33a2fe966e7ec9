//! # Rover Hardware Access Layer
//!
//! 硬件访问层，只负责打开设备并暴露 `Read` / `Write` 句柄：
//!
//! - `serial`: 接收机串口（`serialport`）
//! - `pipe`: 与脉冲生成服务通信的命名管道对
//! - `pwm`: 舵机 PWM 输出（`PwmOutput` trait + Linux sysfs 实现）
//!
//! 协议解析和控制逻辑不在这一层。

use thiserror::Error;

pub mod pipe;
pub mod pwm;
pub mod serial;

pub use pipe::{EscPipes, PipePaths};
pub use pwm::{PwmOutput, SysfsPwm};
pub use serial::{SerialConfig, SerialReader, open_serial};

/// 硬件访问层统一错误类型
#[derive(Error, Debug)]
pub enum HalError {
    #[error("Serial port error on {path}: {source}")]
    Serial {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to open {role} pipe {path}: {source}")]
    Pipe {
        role: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PWM error on {path}: {source}")]
    Pwm {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PWM setting: {0}")]
    InvalidPwm(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hal_error_display() {
        let err = HalError::Pipe {
            role: "command",
            path: "/tmp/missing".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("command"));
        assert!(msg.contains("/tmp/missing"));

        let err = HalError::InvalidPwm("frequency must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid PWM setting: frequency must be positive"
        );
    }
}
