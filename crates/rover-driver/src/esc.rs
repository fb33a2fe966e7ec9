//! ESC 链路
//!
//! 通过一对字节流（命令流写、响应流读）与外部脉冲生成服务通信：
//!
//! - 握手：发送 `ADD <pin> <speedParam>`，等待以 `OK` 开头的响应行，得到端点编号
//! - 文本模式：每帧发送 `THROTTLE <id> <throttle> <telemetry>`，阻塞读取一行响应
//! - 旧版校验模式：每帧写出 2 字节带校验的原始值（高位在前），不读取响应
//!
//! 两种模式不能在同一条链路上混用，由配置决定。

use crate::error::DriverError;
use rover_hal::PipePaths;
use rover_protocol::{
    EscCommand, EscSpeed, HandshakeRequest, LegacyThrottleFrame, parse_handshake_reply,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use tracing::{debug, info, warn};

/// ESC 链路线上模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscWireMode {
    /// 文本命令 + 逐条响应
    #[default]
    Text,
    /// 16 位带校验原始帧，无响应
    LegacyChecksum,
}

/// 一个已握手的 ESC 端点
pub struct EscLink<W, R> {
    writer: W,
    reader: R,
    id: u32,
    mode: EscWireMode,
    line: String,
}

/// 基于命名管道的 ESC 链路
pub type PipeEscLink = EscLink<File, BufReader<File>>;

/// 类型擦除后的 ESC 链路
pub type BoxedEscLink = EscLink<Box<dyn Write + Send>, Box<dyn BufRead + Send>>;

/// 校验 ESC 速率（在任何 IO 之前调用）
pub fn validate_speed(kbps: u32) -> Result<EscSpeed, DriverError> {
    EscSpeed::from_kbps(kbps).map_err(|e| DriverError::Config(e.to_string()))
}

impl PipeEscLink {
    /// 校验速率后打开命名管道并握手
    pub fn open(
        paths: &PipePaths,
        pin: u8,
        speed_kbps: u32,
        mode: EscWireMode,
    ) -> Result<Self, DriverError> {
        let speed = validate_speed(speed_kbps)?;
        let (writer, reader) = paths.open()?.into_parts();
        Self::handshake(writer, reader, pin, speed, mode)
    }
}

impl<W: Write, R: BufRead> EscLink<W, R> {
    /// 校验速率并握手
    ///
    /// # 错误
    /// - `DriverError::Config`: 速率不受支持（此时不会写出任何字节）
    /// - `DriverError::StreamIo`: 读写失败，或握手完成前响应流结束
    /// - `DriverError::Protocol`: `OK` 响应中的端点编号无法解析
    pub fn connect(
        writer: W,
        reader: R,
        pin: u8,
        speed_kbps: u32,
        mode: EscWireMode,
    ) -> Result<Self, DriverError> {
        let speed = validate_speed(speed_kbps)?;
        Self::handshake(writer, reader, pin, speed, mode)
    }

    fn handshake(
        mut writer: W,
        mut reader: R,
        pin: u8,
        speed: EscSpeed,
        mode: EscWireMode,
    ) -> Result<Self, DriverError> {
        let request = HandshakeRequest::new(pin, speed);
        writer.write_all(request.encode_line().as_bytes())?;
        writer.flush()?;
        debug!("Sent ESC handshake: {}", request);

        let mut line = String::new();
        let id = loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(response_closed());
            }
            match parse_handshake_reply(&line)? {
                Some(id) => break id,
                None => warn!("Failed to add ESC: {}", line.trim_end()),
            }
        };

        info!(
            "ESC on pin {} registered as endpoint {} ({} kbit/s, {:?} mode)",
            pin,
            id,
            speed.kbps(),
            mode
        );

        Ok(Self {
            writer,
            reader,
            id,
            mode,
            line,
        })
    }

    /// 握手得到的端点编号
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn mode(&self) -> EscWireMode {
        self.mode
    }

    /// 发送一帧油门
    ///
    /// 文本模式返回解析后的响应；旧版校验模式不读响应，返回 `None`。
    ///
    /// # 错误
    /// - `DriverError::StreamIo`: 读写失败或响应流结束
    /// - `DriverError::Protocol`: 响应不是 `<KIND> <ID> <PAYLOAD>`，或油门超出 11 位
    pub fn send_frame(
        &mut self,
        throttle: u16,
        telemetry: bool,
    ) -> Result<Option<EscCommand>, DriverError> {
        match self.mode {
            EscWireMode::Text => {
                let command = EscCommand::throttle(self.id, throttle, telemetry);
                self.request(&command).map(Some)
            },
            EscWireMode::LegacyChecksum => {
                let frame = LegacyThrottleFrame::encode(throttle, telemetry)?;
                self.writer.write_all(&frame.to_be_bytes())?;
                self.writer.flush()?;
                debug!("Sent legacy ESC frame 0x{:04X}", frame.raw());
                Ok(None)
            },
        }
    }

    /// 写出一条命令并阻塞读取一行响应
    pub fn request(&mut self, command: &EscCommand) -> Result<EscCommand, DriverError> {
        let line = command.encode_line()?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        debug!("Sent ESC command: {}", command);

        self.read_response()
    }

    fn read_response(&mut self) -> Result<EscCommand, DriverError> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Err(response_closed());
        }
        let response = self.line.parse::<EscCommand>()?;
        debug!("ESC response: {}", response);
        Ok(response)
    }

    pub fn into_parts(self) -> (W, R) {
        (self.writer, self.reader)
    }
}

impl<W: Write + Send + 'static, R: BufRead + Send + 'static> EscLink<W, R> {
    /// 擦除读写端具体类型
    pub fn boxed(self) -> BoxedEscLink {
        EscLink {
            writer: Box::new(self.writer),
            reader: Box::new(self.reader),
            id: self.id,
            mode: self.mode,
            line: self.line,
        }
    }
}

fn response_closed() -> DriverError {
    DriverError::StreamIo(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "ESC response stream closed",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_protocol::{EscCommandKind, ProtocolError};
    use std::io::Cursor;

    type TestLink = EscLink<Vec<u8>, Cursor<Vec<u8>>>;

    fn link_with_responses(responses: &str, mode: EscWireMode) -> TestLink {
        EscLink::connect(
            Vec::new(),
            Cursor::new(responses.as_bytes().to_vec()),
            4,
            300,
            mode,
        )
        .unwrap()
    }

    fn written(link: TestLink) -> String {
        String::from_utf8(link.into_parts().0).unwrap()
    }

    #[test]
    fn test_handshake_sends_timing_param() {
        let link = link_with_responses("OK 3\n", EscWireMode::Text);
        assert_eq!(link.id(), 3);
        assert_eq!(written(link), "ADD 4 1250\n");
    }

    #[test]
    fn test_handshake_skips_non_ok_lines() {
        let link = link_with_responses("ERR busy\nhello\nOK 9\n", EscWireMode::Text);
        assert_eq!(link.id(), 9);
    }

    #[test]
    fn test_unsupported_speed_fails_before_any_write() {
        let mut out = Vec::new();
        let reader = Cursor::new(b"OK 1\n".to_vec());
        let result = EscLink::connect(&mut out, reader, 4, 999, EscWireMode::Text);
        assert!(matches!(result, Err(DriverError::Config(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_handshake_eof() {
        let reader = Cursor::new(b"ERR x\n".to_vec());
        let result = EscLink::connect(Vec::new(), reader, 4, 300, EscWireMode::Text);
        match result {
            Err(DriverError::StreamIo(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("handshake should fail on EOF"),
        }
    }

    #[test]
    fn test_handshake_malformed_ok() {
        let reader = Cursor::new(b"OK abc\n".to_vec());
        let result = EscLink::connect(Vec::new(), reader, 4, 300, EscWireMode::Text);
        assert!(matches!(
            result,
            Err(DriverError::Protocol(ProtocolError::InvalidTargetId { .. }))
        ));
    }

    #[test]
    fn test_send_frame_text_mode() {
        let mut link = link_with_responses("OK 3\nOK 3 \n", EscWireMode::Text);
        let response = link.send_frame(500, false).unwrap().unwrap();
        assert_eq!(response.kind, EscCommandKind::Ok);
        assert_eq!(response.id, 3);
        assert_eq!(written(link), "ADD 4 1250\nTHROTTLE 3 500 false\n");
    }

    #[test]
    fn test_send_frame_unparseable_response() {
        let mut link = link_with_responses("OK 3\ngarbage\n", EscWireMode::Text);
        assert!(matches!(
            link.send_frame(0, true),
            Err(DriverError::Protocol(_))
        ));
    }

    #[test]
    fn test_send_frame_response_eof() {
        let mut link = link_with_responses("OK 3\n", EscWireMode::Text);
        let err = link.send_frame(0, false).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_send_frame_legacy_mode() {
        let mut link = link_with_responses("OK 3\n", EscWireMode::LegacyChecksum);
        assert!(link.send_frame(500, true).unwrap().is_none());

        let out = link.into_parts().0;
        let raw = u16::from_be_bytes([out[out.len() - 2], out[out.len() - 1]]);
        assert_eq!(raw, LegacyThrottleFrame::encode(500, true).unwrap().raw());
        assert!(out.starts_with(b"ADD 4 1250\n"));
    }
}
