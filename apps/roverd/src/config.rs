//! 服务配置（TOML）
//!
//! 缺省的段和字段使用车上实际部署的值：
//!
//! ```toml
//! [serial]
//! path = "/dev/ttyAMA0"
//! baud_rate = 115200
//!
//! [esc]
//! pin = 4
//! speed_kbps = 300
//! mode = "text"          # 或 "legacy"
//!
//! [servo]
//! pwm_chip = 0
//! pwm_channel = 2
//!
//! [diagnostics]
//! enabled = false
//! port = 8080
//! ```

use anyhow::{Context, Result, bail};
use rover_driver::{EscWireMode, PipelineConfig, ServoConfig, validate_speed};
use rover_hal::{PipePaths, SerialConfig};
use rover_protocol::{CHANNEL_COUNT, RECEIVER_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoverConfig {
    pub serial: SerialSection,
    pub esc: EscSection,
    pub servo: ServoSection,
    pub diagnostics: DiagnosticsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSection {
    pub path: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// 超过该时间没有收到通道帧视为链路丢失
    pub link_timeout_ms: u64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            path: "/dev/ttyAMA0".to_string(),
            baud_rate: RECEIVER_BAUD_RATE,
            read_timeout_ms: 100,
            link_timeout_ms: 500,
        }
    }
}

/// ESC 线上模式（配置文件中的写法）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscMode {
    #[default]
    Text,
    Legacy,
}

impl From<EscMode> for EscWireMode {
    fn from(mode: EscMode) -> Self {
        match mode {
            EscMode::Text => EscWireMode::Text,
            EscMode::Legacy => EscWireMode::LegacyChecksum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EscSection {
    pub enabled: bool,
    pub pin: u8,
    pub speed_kbps: u32,
    pub mode: EscMode,
    pub command_pipe: PathBuf,
    pub response_pipe: PathBuf,
    pub period_ms: u64,
}

impl Default for EscSection {
    fn default() -> Self {
        let pipes = PipePaths::default();
        Self {
            enabled: true,
            pin: 4,
            speed_kbps: 300,
            mode: EscMode::Text,
            command_pipe: pipes.command,
            response_pipe: pipes.response,
            period_ms: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServoSection {
    pub enabled: bool,
    pub pwm_chip: u32,
    pub pwm_channel: u32,
    /// 读取的接收机通道
    pub channel: usize,
    pub min_angle: f64,
    pub max_angle: f64,
    /// 脉宽（毫秒）
    pub min_pulse_width_ms: f64,
    pub max_pulse_width_ms: f64,
    pub frequency: u32,
    pub period_ms: u64,
}

impl Default for ServoSection {
    fn default() -> Self {
        Self {
            enabled: true,
            pwm_chip: 0,
            pwm_channel: 2,
            channel: 2,
            min_angle: 0.0,
            max_angle: 90.0,
            min_pulse_width_ms: 1.0,
            max_pulse_width_ms: 2.0,
            frequency: 50,
            period_ms: 21,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsSection {
    pub enabled: bool,
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for DiagnosticsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

impl RoverConfig {
    /// 从文件加载并校验
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// 启动前校验（在打开任何设备之前调用）
    pub fn validate(&self) -> Result<()> {
        if self.esc.enabled {
            validate_speed(self.esc.speed_kbps)?;
            if self.esc.period_ms == 0 {
                bail!("esc.period_ms must be non-zero");
            }
        }

        if self.servo.enabled {
            let servo = &self.servo;
            if servo.channel >= CHANNEL_COUNT {
                bail!(
                    "servo.channel {} out of range (0..{})",
                    servo.channel,
                    CHANNEL_COUNT
                );
            }
            if servo.max_angle <= servo.min_angle {
                bail!(
                    "servo angle range is empty: [{}, {}]",
                    servo.min_angle,
                    servo.max_angle
                );
            }
            if servo.frequency == 0 || servo.period_ms == 0 {
                bail!("servo.frequency and servo.period_ms must be non-zero");
            }
        }

        if self.serial.baud_rate == 0 {
            bail!("serial.baud_rate must be non-zero");
        }
        Ok(())
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            path: self.serial.path.clone(),
            baud_rate: self.serial.baud_rate,
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
        }
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.link_timeout_ms)
    }

    pub fn pipe_paths(&self) -> PipePaths {
        PipePaths {
            command: self.esc.command_pipe.clone(),
            response: self.esc.response_pipe.clone(),
        }
    }

    pub fn servo_config(&self) -> ServoConfig {
        ServoConfig {
            min_angle: self.servo.min_angle,
            max_angle: self.servo.max_angle,
            min_pulse_width: self.servo.min_pulse_width_ms / 1000.0,
            max_pulse_width: self.servo.max_pulse_width_ms / 1000.0,
            frequency: self.servo.frequency,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            servo_period: Duration::from_millis(self.servo.period_ms),
            esc_period: Duration::from_millis(self.esc.period_ms),
            servo_channel: self.servo.channel,
        }
    }

    pub fn diagnostics_addr(&self) -> SocketAddr {
        SocketAddr::new(self.diagnostics.bind, self.diagnostics.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_vehicle() {
        let config = RoverConfig::default();
        assert_eq!(config.serial.path, "/dev/ttyAMA0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.esc.pin, 4);
        assert_eq!(config.esc.speed_kbps, 300);
        assert_eq!(config.esc.mode, EscMode::Text);
        assert_eq!(
            config.esc.command_pipe,
            PathBuf::from("/home/pi/NamedPipes/PIOPipe")
        );
        assert!(!config.diagnostics.enabled);
        assert_eq!(config.diagnostics.port, 8080);
        assert_eq!(config.servo_config(), ServoConfig::default());
        assert_eq!(config.pipeline_config(), PipelineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(RoverConfig::from_toml("").unwrap(), RoverConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = RoverConfig::from_toml(
            r#"
            [esc]
            speed_kbps = 600
            mode = "legacy"

            [diagnostics]
            enabled = true
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.esc.speed_kbps, 600);
        assert_eq!(EscWireMode::from(config.esc.mode), EscWireMode::LegacyChecksum);
        assert_eq!(config.esc.pin, 4);
        assert_eq!(config.diagnostics_addr().port(), 9000);
        assert_eq!(config.serial, SerialSection::default());
    }

    #[test]
    fn test_unsupported_speed_fails_validation() {
        let config = RoverConfig::from_toml("[esc]\nspeed_kbps = 999\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("999"));
    }

    #[test]
    fn test_disabled_esc_skips_speed_check() {
        let config = RoverConfig::from_toml("[esc]\nenabled = false\nspeed_kbps = 999\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(RoverConfig::from_toml("[esc]\nspeeed = 300\n").is_err());
        assert!(RoverConfig::from_toml("[esc]\nmode = \"binary\"\n").is_err());
    }

    #[test]
    fn test_servo_channel_out_of_range() {
        let config = RoverConfig::from_toml("[servo]\nchannel = 14\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[serial]\npath = \"/dev/ttyUSB0\"\nbaud_rate = 9600").unwrap();

        let config = RoverConfig::load(file.path()).unwrap();
        assert_eq!(config.serial_config().path, "/dev/ttyUSB0");
        assert_eq!(config.serial_config().baud_rate, 9600);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RoverConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }
}
