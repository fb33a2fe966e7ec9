//! 只读诊断端口
//!
//! 每个连接收到最新通道帧（14 个大端 `i32`，共 56 字节），随后连接被关闭。
//! 尚未收到任何帧时发送全 0。

use rover_driver::{ChannelFrame, RoverContext};
use rover_protocol::CHANNEL_COUNT;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 单个快照的字节数
pub const SNAPSHOT_LEN: usize = CHANNEL_COUNT * 4;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 通道帧快照（大端 i32）
pub fn encode_snapshot(frame: Option<&ChannelFrame>) -> [u8; SNAPSHOT_LEN] {
    let mut out = [0u8; SNAPSHOT_LEN];
    if let Some(frame) = frame {
        for (chunk, &value) in out.chunks_exact_mut(4).zip(frame.channels()) {
            chunk.copy_from_slice(&i32::from(value).to_be_bytes());
        }
    }
    out
}

/// 绑定端口并启动诊断线程
///
/// 监听套接字为非阻塞模式，线程在运行标志清除后退出。
pub fn spawn(
    addr: SocketAddr,
    ctx: Arc<RoverContext>,
    is_running: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    info!("Diagnostics listening on {}", listener.local_addr()?);

    thread::Builder::new()
        .name("rover-diagnostics".to_string())
        .spawn(move || serve(listener, ctx, is_running))
}

fn serve(listener: TcpListener, ctx: Arc<RoverContext>, is_running: Arc<AtomicBool>) {
    while is_running.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = send_snapshot(stream, &ctx) {
                    warn!("Diagnostics: failed to serve {}: {}", peer, e);
                } else {
                    debug!("Diagnostics: served snapshot to {}", peer);
                }
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            },
            Err(e) => {
                warn!("Diagnostics: accept failed: {}", e);
                thread::sleep(ACCEPT_POLL_INTERVAL);
            },
        }
    }
    debug!("Diagnostics thread exiting");
}

fn send_snapshot(mut stream: TcpStream, ctx: &RoverContext) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    let snapshot = encode_snapshot(ctx.latest_frame().as_ref());
    stream.write_all(&snapshot)?;
    stream.flush()
}
