//! 舵机角度到 PWM 占空比的转换

use crate::error::DriverError;
use rover_hal::PwmOutput;
use tracing::trace;

/// 舵机参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoConfig {
    /// 最小角度（度）
    pub min_angle: f64,
    /// 最大角度（度）
    pub max_angle: f64,
    /// 最小角度对应的脉宽（秒）
    pub min_pulse_width: f64,
    /// 最大角度对应的脉宽（秒）
    pub max_pulse_width: f64,
    /// PWM 频率（Hz）
    pub frequency: u32,
}

impl Default for ServoConfig {
    /// 0-90°，1-2ms，50Hz
    fn default() -> Self {
        Self {
            min_angle: 0.0,
            max_angle: 90.0,
            min_pulse_width: 0.001,
            max_pulse_width: 0.002,
            frequency: 50,
        }
    }
}

impl ServoConfig {
    /// 角度对应的占空比（百分比）
    ///
    /// `PW = (maxPW - minPW) * angle / (|max| + |min|) + minPW`，
    /// `duty = PW / (1 / frequency) * 100`
    pub fn duty_cycle(&self, angle: f64) -> f64 {
        let percent = angle / (self.max_angle.abs() + self.min_angle.abs());
        let pulse_width =
            (self.max_pulse_width - self.min_pulse_width) * percent + self.min_pulse_width;
        pulse_width * f64::from(self.frequency) * 100.0
    }
}

/// 通过 `PwmOutput` 驱动的舵机
pub struct Servo<P> {
    pwm: P,
    config: ServoConfig,
    angle: Option<f64>,
}

impl<P: PwmOutput> Servo<P> {
    /// 创建舵机并设置 PWM 频率
    pub fn new(mut pwm: P, config: ServoConfig) -> Result<Self, DriverError> {
        if config.frequency == 0 || config.max_angle <= config.min_angle {
            return Err(DriverError::Config(format!(
                "invalid servo parameters: {:?}",
                config
            )));
        }
        pwm.set_frequency(f64::from(config.frequency))?;
        Ok(Self {
            pwm,
            config,
            angle: None,
        })
    }

    /// 转到指定角度，返回写出的占空比
    ///
    /// # 错误
    /// - `DriverError::InvalidAngle`: 角度不在 `[min_angle, max_angle]` 内
    /// - `DriverError::Hal`: PWM 写入失败
    pub fn set_angle(&mut self, angle: f64) -> Result<f64, DriverError> {
        if !(self.config.min_angle..=self.config.max_angle).contains(&angle) {
            return Err(DriverError::InvalidAngle {
                angle,
                min: self.config.min_angle,
                max: self.config.max_angle,
            });
        }

        let duty = self.config.duty_cycle(angle);
        self.pwm.set_duty_cycle(duty)?;
        self.angle = Some(angle);
        trace!("Servo angle {:.2}° → duty {:.3}%", angle, duty);
        Ok(duty)
    }

    /// 最近一次设置的角度
    pub fn angle(&self) -> Option<f64> {
        self.angle
    }

    pub fn config(&self) -> &ServoConfig {
        &self.config
    }

    /// 擦除 PWM 具体类型
    pub fn boxed(self) -> Servo<Box<dyn PwmOutput>>
    where
        P: 'static,
    {
        Servo {
            pwm: Box::new(self.pwm),
            config: self.config,
            angle: self.angle,
        }
    }
}
