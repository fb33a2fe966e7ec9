//! 驱动层错误类型定义

use rover_hal::HalError;
use rover_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 接收机帧格式错误（非致命，跳过该帧）
    #[error("Decode error: {0}")]
    Decode(ProtocolError),

    /// 串口或管道 IO 错误（对所属循环致命）
    #[error("Stream IO error: {0}")]
    StreamIo(#[from] std::io::Error),

    /// ESC 响应无法解析（跳过本周期）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置错误（启动时致命）
    #[error("Config error: {0}")]
    Config(String),

    /// 舵机角度超出范围
    #[error("Servo angle {angle} out of range [{min}, {max}]")]
    InvalidAngle { angle: f64, min: f64, max: f64 },

    /// 硬件访问错误
    #[error("Hardware error: {0}")]
    Hal(#[from] HalError),

    /// 线程启动失败
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl DriverError {
    /// 是否应终止所属循环
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::StreamIo(_)
                | DriverError::Config(_)
                | DriverError::Hal(_)
                | DriverError::Spawn { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use rover_protocol::ProtocolError;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::Decode(ProtocolError::InvalidLength {
            expected: 29,
            actual: 3,
        });
        let msg = format!("{}", err);
        assert!(msg.contains("Decode error"), "message: {}", msg);
        assert!(msg.contains("Invalid frame length"), "message: {}", msg);

        let err = DriverError::Config("unsupported ESC speed".to_string());
        assert_eq!(format!("{}", err), "Config error: unsupported ESC speed");

        let err = DriverError::StreamIo(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "response pipe closed",
        ));
        let msg = format!("{}", err);
        assert!(msg.contains("Stream IO") && msg.contains("response pipe closed"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: DriverError = ProtocolError::UnsupportedSpeed { kbps: 999 }.into();
        match err {
            DriverError::Protocol(ProtocolError::UnsupportedSpeed { kbps }) => assert_eq!(kbps, 999),
            other => panic!("Expected Protocol variant, got {other:?}"),
        }
    }

    #[test]
    fn test_fatality() {
        assert!(
            DriverError::StreamIo(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_fatal()
        );
        assert!(DriverError::Config("x".to_string()).is_fatal());
        assert!(!DriverError::Protocol(ProtocolError::PayloadContainsNewline).is_fatal());
        assert!(
            !DriverError::Decode(ProtocolError::InvalidLength {
                expected: 29,
                actual: 1
            })
            .is_fatal()
        );
    }
}
