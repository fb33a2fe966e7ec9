//! ESC 文本命令协议
//!
//! 与外部脉冲生成服务之间的请求/响应协议。每条命令一行：
//!
//! ```text
//! <KIND> <ID> <PAYLOAD>\n
//! ```
//!
//! - `KIND`: `THROTTLE` / `OK` / `ERR`
//! - `ID`: 握手时服务分配的端点编号
//! - `PAYLOAD`: 剩余部分（可包含空格，不可包含换行）
//!
//! 握手使用单独的 `ADD <pin> <speedParam>` 请求，服务回复 `OK <id>`。

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscCommandKind {
    /// 油门命令（请求）
    Throttle,
    /// 成功响应
    Ok,
    /// 错误响应
    Err,
}

impl EscCommandKind {
    /// 线上文本形式
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Throttle => "THROTTLE",
            Self::Ok => "OK",
            Self::Err => "ERR",
        }
    }
}

impl fmt::Display for EscCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscCommandKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, ProtocolError> {
        match s {
            "THROTTLE" => Ok(Self::Throttle),
            "OK" => Ok(Self::Ok),
            "ERR" => Ok(Self::Err),
            other => Err(ProtocolError::UnknownCommandKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// ESC 命令（请求或响应）
///
/// 由控制循环在每次发送时创建，或由 `EscLink` 在解析响应时创建，用完即丢弃。
///
/// ```rust
/// use rover_protocol::{EscCommand, EscCommandKind};
///
/// let cmd = EscCommand::throttle(3, 500, false);
/// assert_eq!(cmd.to_string(), "THROTTLE 3 500 false");
///
/// let reply: EscCommand = "OK 3 done".parse().unwrap();
/// assert_eq!(reply.kind, EscCommandKind::Ok);
/// assert_eq!(reply.payload, "done");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscCommand {
    pub kind: EscCommandKind,
    pub id: u32,
    pub payload: String,
}

impl EscCommand {
    pub fn new(kind: EscCommandKind, id: u32, payload: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            payload: payload.into(),
        }
    }

    /// 油门命令，payload 为 `"<throttle> <telemetry>"`
    pub fn throttle(id: u32, throttle: u16, telemetry: bool) -> Self {
        Self::new(
            EscCommandKind::Throttle,
            id,
            format!("{} {}", throttle, telemetry),
        )
    }

    pub fn ok(id: u32) -> Self {
        Self::new(EscCommandKind::Ok, id, "")
    }

    pub fn err(id: u32, message: impl Into<String>) -> Self {
        Self::new(EscCommandKind::Err, id, message)
    }

    pub fn is_ok(&self) -> bool {
        self.kind == EscCommandKind::Ok
    }

    pub fn is_err(&self) -> bool {
        self.kind == EscCommandKind::Err
    }

    /// 编码为一行（含结尾 `\n`）
    ///
    /// # 错误
    /// - `ProtocolError::PayloadContainsNewline`: payload 含换行，会破坏行分帧
    pub fn encode_line(&self) -> Result<String, ProtocolError> {
        if self.payload.contains(['\n', '\r']) {
            return Err(ProtocolError::PayloadContainsNewline);
        }
        Ok(format!("{}\n", self))
    }
}

impl fmt::Display for EscCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.id, self.payload)
    }
}

impl FromStr for EscCommand {
    type Err = ProtocolError;

    /// 按空格切分为 kind / id / payload，payload 可为空
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let mut parts = trimmed.splitn(3, ' ');

        let (Some(kind), Some(id)) = (parts.next(), parts.next()) else {
            return Err(ProtocolError::MalformedCommand {
                line: trimmed.to_string(),
            });
        };
        if kind.is_empty() || id.is_empty() {
            return Err(ProtocolError::MalformedCommand {
                line: trimmed.to_string(),
            });
        }

        let kind = kind.parse::<EscCommandKind>()?;
        let id = id.parse::<u32>().map_err(|_| ProtocolError::InvalidTargetId {
            value: id.to_string(),
        })?;
        let payload = parts.next().unwrap_or("").to_string();

        Ok(Self { kind, id, payload })
    }
}

/// ESC 通信速率
///
/// 每种速率对应脉冲生成服务使用的时序参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscSpeed {
    Kbps150,
    Kbps300,
    Kbps600,
    Kbps1200,
}

impl EscSpeed {
    /// 从 kbit/s 数值查表
    ///
    /// # 错误
    /// - `ProtocolError::UnsupportedSpeed`: 不在 {150, 300, 600, 1200} 中
    pub fn from_kbps(kbps: u32) -> Result<Self, ProtocolError> {
        match kbps {
            150 => Ok(Self::Kbps150),
            300 => Ok(Self::Kbps300),
            600 => Ok(Self::Kbps600),
            1200 => Ok(Self::Kbps1200),
            _ => Err(ProtocolError::UnsupportedSpeed { kbps }),
        }
    }

    pub fn kbps(self) -> u32 {
        match self {
            Self::Kbps150 => 150,
            Self::Kbps300 => 300,
            Self::Kbps600 => 600,
            Self::Kbps1200 => 1200,
        }
    }

    /// 握手时发送的时序参数
    pub fn timing_param(self) -> u32 {
        match self {
            Self::Kbps150 => 2500,
            Self::Kbps300 => 1250,
            Self::Kbps600 => 625,
            Self::Kbps1200 => 313,
        }
    }
}

impl TryFrom<u32> for EscSpeed {
    type Error = ProtocolError;

    fn try_from(kbps: u32) -> Result<Self, Self::Error> {
        Self::from_kbps(kbps)
    }
}

/// 握手请求 `ADD <pin> <speedParam>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub pin: u8,
    pub speed: EscSpeed,
}

impl HandshakeRequest {
    pub fn new(pin: u8, speed: EscSpeed) -> Self {
        Self { pin, speed }
    }

    /// 编码为一行（含结尾 `\n`）
    pub fn encode_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for HandshakeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ADD {} {}", self.pin, self.speed.timing_param())
    }
}

/// 解析握手响应
///
/// - 以 `OK` 开头：返回末尾整数作为端点编号
/// - 其他内容：返回 `Ok(None)`，调用方记录日志后继续等待
///
/// # 错误
/// - `ProtocolError::InvalidTargetId`: 以 `OK` 开头但编号无法解析
pub fn parse_handshake_reply(line: &str) -> Result<Option<u32>, ProtocolError> {
    let trimmed = line.trim();
    if !trimmed.starts_with("OK") {
        return Ok(None);
    }

    let id = trimmed.split_whitespace().last().unwrap_or_default();
    id.parse::<u32>()
        .map(Some)
        .map_err(|_| ProtocolError::InvalidTargetId {
            value: id.to_string(),
        })
}
