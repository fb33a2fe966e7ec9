//! ESC 命名管道对
//!
//! 脉冲生成服务创建两个命名管道：命令管道（本进程写）和响应管道（本进程读）。
//! 打开 FIFO 会阻塞到对端也打开为止，因此先打开响应管道，与服务的打开顺序配合。

use crate::HalError;
use std::fs::{File, OpenOptions};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// 一个 ESC 端点使用的管道对
#[derive(Debug)]
pub struct EscPipes {
    pub command: File,
    pub response: BufReader<File>,
}

impl EscPipes {
    /// 打开管道对（管道文件必须已存在，不会创建）
    pub fn open(
        command_path: impl AsRef<Path>,
        response_path: impl AsRef<Path>,
    ) -> Result<Self, HalError> {
        let command_path = command_path.as_ref();
        let response_path = response_path.as_ref();

        let response = File::open(response_path).map_err(|source| HalError::Pipe {
            role: "response",
            path: display(response_path),
            source,
        })?;

        let command = OpenOptions::new()
            .write(true)
            .open(command_path)
            .map_err(|source| HalError::Pipe {
                role: "command",
                path: display(command_path),
                source,
            })?;

        info!(
            "ESC pipes opened: command={}, response={}",
            command_path.display(),
            response_path.display()
        );

        Ok(Self {
            command,
            response: BufReader::new(response),
        })
    }

    /// 拆分为 (写端, 读端)
    pub fn into_parts(self) -> (File, BufReader<File>) {
        (self.command, self.response)
    }
}

/// 管道路径配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipePaths {
    pub command: PathBuf,
    pub response: PathBuf,
}

impl Default for PipePaths {
    fn default() -> Self {
        Self {
            command: PathBuf::from("/home/pi/NamedPipes/PIOPipe"),
            response: PathBuf::from("/home/pi/NamedPipes/PIOTelemetry"),
        }
    }
}

impl PipePaths {
    pub fn open(&self) -> Result<EscPipes, HalError> {
        EscPipes::open(&self.command, &self.response)
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
