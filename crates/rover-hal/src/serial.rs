//! 接收机串口
//!
//! 串口以 8N1 打开，读超时较短；[`SerialReader`] 在超时后继续等待，
//! 对上层表现为阻塞读，同时在运行标志清除后返回，便于线程退出。

use crate::HalError;
use rover_protocol::RECEIVER_BAUD_RATE;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// 串口配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// 设备路径
    pub path: String,
    /// 波特率（接收机 115200，旧版蓝牙模块 9600）
    pub baud_rate: u32,
    /// 单次读超时
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyAMA0".to_string(),
            baud_rate: RECEIVER_BAUD_RATE,
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// 打开串口（8N1，无流控）
pub fn open_serial(config: &SerialConfig) -> Result<Box<dyn SerialPort>, HalError> {
    let port = serialport::new(&config.path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout)
        .open()
        .map_err(|source| HalError::Serial {
            path: config.path.clone(),
            source,
        })?;

    info!(
        "Serial port {} opened at {} baud",
        config.path, config.baud_rate
    );
    Ok(port)
}

/// 把带超时的读句柄包装成阻塞读
///
/// 底层读超时（`TimedOut` / `WouldBlock`）时，只要运行标志仍为 `true` 就重试；
/// 运行标志清除后把超时错误返回给调用方。
pub struct SerialReader<R> {
    inner: R,
    is_running: Arc<AtomicBool>,
}

impl<R: Read> SerialReader<R> {
    pub fn new(inner: R, is_running: Arc<AtomicBool>) -> Self {
        Self { inner, is_running }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for SerialReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
                        && self.is_running.load(Ordering::Acquire) =>
                {
                    debug!("Serial read timed out, waiting for more bytes");
                    continue;
                },
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// 按顺序返回预设结果的读句柄
    struct ScriptedReader {
        script: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.script.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                },
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    fn timed_out() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "timed out")
    }

    #[test]
    fn test_default_config() {
        let config = SerialConfig::default();
        assert_eq!(config.path, "/dev/ttyAMA0");
        assert_eq!(config.baud_rate, 115_200);
    }

    #[test]
    fn test_timeouts_are_retried_while_running() {
        let inner = ScriptedReader {
            script: VecDeque::from(vec![Err(timed_out()), Err(timed_out()), Ok(vec![0x1E, 0x40])]),
        };
        let mut reader = SerialReader::new(inner, Arc::new(AtomicBool::new(true)));

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[0x1E, 0x40]);
    }

    #[test]
    fn test_timeout_surfaces_after_stop() {
        let inner = ScriptedReader {
            script: VecDeque::from(vec![Err(timed_out())]),
        };
        let mut reader = SerialReader::new(inner, Arc::new(AtomicBool::new(false)));

        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_other_errors_pass_through() {
        let inner = ScriptedReader {
            script: VecDeque::from(vec![Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "unplugged",
            ))]),
        };
        let mut reader = SerialReader::new(inner, Arc::new(AtomicBool::new(true)));

        let mut buf = [0u8; 4];
        assert_eq!(
            reader.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }
}
