//! PWM 输出
//!
//! `PwmOutput` 是舵机控制使用的执行器接口，`SysfsPwm` 通过 Linux
//! `/sys/class/pwm` 接口实现它。

use crate::HalError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PWM 执行器接口
pub trait PwmOutput: Send {
    /// 设置频率（Hz）
    fn set_frequency(&mut self, hz: f64) -> Result<(), HalError>;

    /// 设置占空比（百分比，0-100）
    fn set_duty_cycle(&mut self, percent: f64) -> Result<(), HalError>;
}

impl<T: PwmOutput + ?Sized> PwmOutput for Box<T> {
    fn set_frequency(&mut self, hz: f64) -> Result<(), HalError> {
        (**self).set_frequency(hz)
    }

    fn set_duty_cycle(&mut self, percent: f64) -> Result<(), HalError> {
        (**self).set_duty_cycle(percent)
    }
}

const SYSFS_PWM_ROOT: &str = "/sys/class/pwm";

/// Linux sysfs PWM 通道（`pwmchipN/pwmM`）
#[derive(Debug)]
pub struct SysfsPwm {
    channel_dir: PathBuf,
    period_ns: u64,
    enabled: bool,
}

impl SysfsPwm {
    /// 打开 `/sys/class/pwm/pwmchip{chip}/pwm{channel}`，必要时先导出通道
    pub fn open(chip: u32, channel: u32) -> Result<Self, HalError> {
        Self::open_at(SYSFS_PWM_ROOT, chip, channel)
    }

    /// 在指定根目录下打开（测试使用临时目录）
    pub fn open_at(root: impl AsRef<Path>, chip: u32, channel: u32) -> Result<Self, HalError> {
        let chip_dir = root.as_ref().join(format!("pwmchip{chip}"));
        let channel_dir = chip_dir.join(format!("pwm{channel}"));

        if !channel_dir.exists() {
            write_attr(&chip_dir.join("export"), &channel.to_string())?;
            info!("Exported PWM channel {} on pwmchip{}", channel, chip);
        }

        Ok(Self {
            channel_dir,
            period_ns: 0,
            enabled: false,
        })
    }

    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }
}

impl PwmOutput for SysfsPwm {
    fn set_frequency(&mut self, hz: f64) -> Result<(), HalError> {
        if !(hz.is_finite() && hz > 0.0) {
            return Err(HalError::InvalidPwm(format!(
                "frequency must be positive, got {hz}"
            )));
        }

        let period_ns = (1e9 / hz).round() as u64;
        write_attr(&self.channel_dir.join("period"), &period_ns.to_string())?;
        self.period_ns = period_ns;
        debug!("PWM period set to {} ns", period_ns);
        Ok(())
    }

    fn set_duty_cycle(&mut self, percent: f64) -> Result<(), HalError> {
        if self.period_ns == 0 {
            return Err(HalError::InvalidPwm(
                "frequency must be set before duty cycle".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&percent) {
            return Err(HalError::InvalidPwm(format!(
                "duty cycle must be within 0-100%, got {percent}"
            )));
        }

        let duty_ns = (self.period_ns as f64 * percent / 100.0).round() as u64;
        write_attr(&self.channel_dir.join("duty_cycle"), &duty_ns.to_string())?;

        if !self.enabled {
            write_attr(&self.channel_dir.join("enable"), "1")?;
            self.enabled = true;
        }
        Ok(())
    }
}

fn write_attr(path: &Path, value: &str) -> Result<(), HalError> {
    fs::write(path, value).map_err(|source| HalError::Pwm {
        path: path.display().to_string(),
        source,
    })
}
