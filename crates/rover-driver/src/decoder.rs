//! 接收机字节流解码
//!
//! 把串口字节流切分为长度前缀帧，并解析出通道帧：
//!
//! 1. 读 1 字节长度 `L`（包含自身）
//! 2. 阻塞读取 `L-1` 字节 payload
//! 3. payload 首字节为帧类型，`0x40` 为通道数据，其余类型整帧丢弃
//!
//! 读错误（包括流结束）对解码器是致命的，不在这一层重试。

use crate::error::DriverError;
use crate::metrics::RoverMetrics;
use rover_protocol::{ChannelFrame, ReceiverPacket, parse_payload};
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, trace, warn};

/// 接收机帧解码器
///
/// 作为迭代器使用时，每项为一个通道帧；非通道帧和格式错误的帧被跳过。
/// 遇到 IO 错误时产出一次 `Err`，之后迭代结束。
///
/// ```rust
/// use rover_driver::FrameDecoder;
/// use std::io::Cursor;
///
/// let mut bytes = vec![0x1E, 0x40];
/// for _ in 0..14 {
///     bytes.extend_from_slice(&[0xE8, 0x03]);
/// }
///
/// let mut decoder = FrameDecoder::new(Cursor::new(bytes));
/// let frame = decoder.next().unwrap().unwrap();
/// assert!(frame.channels().iter().all(|&v| v == 1000));
/// ```
pub struct FrameDecoder<R> {
    reader: R,
    payload: Vec<u8>,
    metrics: Option<Arc<RoverMetrics>>,
    finished: bool,
}

impl<R: Read> FrameDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            payload: Vec::with_capacity(u8::MAX as usize),
            metrics: None,
            finished: false,
        }
    }

    /// 解码计数写入指定指标
    pub fn with_metrics(mut self, metrics: Arc<RoverMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 读取并解析下一个长度前缀帧
    ///
    /// # 错误
    /// - `DriverError::StreamIo`: 读失败或流结束
    /// - `DriverError::Decode`: 通道帧 payload 过短
    pub fn read_packet(&mut self) -> Result<ReceiverPacket, DriverError> {
        let mut len = [0u8; 1];
        self.reader.read_exact(&mut len)?;

        let declared = len[0] as usize;
        if declared <= 1 {
            return Ok(ReceiverPacket::Empty);
        }

        self.payload.resize(declared - 1, 0);
        self.reader.read_exact(&mut self.payload)?;

        parse_payload(&self.payload).map_err(DriverError::Decode)
    }

    /// 读到下一个通道帧为止，期间跳过其他帧
    pub fn next_frame(&mut self) -> Result<ChannelFrame, DriverError> {
        loop {
            match self.read_packet() {
                Ok(ReceiverPacket::Channels(frame)) => {
                    self.bump(|m| &m.frames_decoded);
                    trace!("Decoded channel frame: {:?}", frame.channels());
                    return Ok(frame);
                },
                Ok(ReceiverPacket::Unrecognized { header }) => {
                    self.bump(|m| &m.frames_skipped);
                    debug!(
                        "Skipping frame with header 0x{:02X}: {}",
                        header,
                        hex::encode(&self.payload)
                    );
                },
                Ok(ReceiverPacket::Empty) => {
                    self.bump(|m| &m.frames_skipped);
                    trace!("Skipping empty frame");
                },
                Err(DriverError::Decode(e)) => {
                    self.bump(|m| &m.frames_malformed);
                    warn!("Dropping malformed channel frame: {}", e);
                },
                Err(e) => {
                    self.bump(|m| &m.io_errors);
                    return Err(e);
                },
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn bump(&self, counter: impl Fn(&RoverMetrics) -> &std::sync::atomic::AtomicU64) {
        if let Some(metrics) = &self.metrics {
            counter(metrics).fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<R: Read> Iterator for FrameDecoder<R> {
    type Item = Result<ChannelFrame, DriverError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    fn channel_bytes(values: [u16; 14]) -> Vec<u8> {
        let mut bytes = vec![0x1E, 0x40];
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_decode_single_frame() {
        let mut decoder = FrameDecoder::new(Cursor::new(channel_bytes([1000; 14])));
        let frame = decoder.next().unwrap().unwrap();
        assert_eq!(frame.channels(), &[1000; 14]);
    }

    #[test]
    fn test_eof_is_reported_once() {
        let mut decoder = FrameDecoder::new(Cursor::new(channel_bytes([1500; 14])));
        assert!(decoder.next().unwrap().is_ok());

        match decoder.next() {
            Some(Err(DriverError::StreamIo(e))) => {
                assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof)
            },
            other => panic!("expected EOF error, got {other:?}"),
        }
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_unknown_header_is_skipped() {
        let mut bytes = vec![0x04, 0x10, 0xAA, 0xBB];
        bytes.extend(channel_bytes([1200; 14]));

        let metrics = Arc::new(RoverMetrics::new());
        let mut decoder = FrameDecoder::new(Cursor::new(bytes)).with_metrics(metrics.clone());
        let frame = decoder.next().unwrap().unwrap();

        assert_eq!(frame.channels(), &[1200; 14]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_skipped, 1);
        assert_eq!(snapshot.frames_decoded, 1);
    }

    #[test]
    fn test_every_outcome_is_counted() {
        let mut bytes = vec![0x00];
        bytes.extend([0x03, 0x10, 0xAA]);
        bytes.extend([0x04, 0x40, 0x01, 0x02]);
        bytes.extend(channel_bytes([1700; 14]));

        let metrics = Arc::new(RoverMetrics::new());
        let frames: Vec<_> = FrameDecoder::new(Cursor::new(bytes))
            .with_metrics(metrics.clone())
            .collect();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap().channels(), &[1700; 14]);
        assert!(frames[1].is_err());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_decoded, 1);
        assert_eq!(snapshot.frames_skipped, 2);
        assert_eq!(snapshot.frames_malformed, 1);
        assert_eq!(snapshot.io_errors, 1);
    }

    #[test]
    fn test_zero_and_one_length_bytes_do_not_hang() {
        let mut bytes = vec![0x00, 0x01];
        bytes.extend(channel_bytes([1300; 14]));

        let mut decoder = FrameDecoder::new(Cursor::new(bytes));
        assert_eq!(decoder.read_packet().unwrap(), ReceiverPacket::Empty);
        assert_eq!(decoder.read_packet().unwrap(), ReceiverPacket::Empty);
        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame.channels(), &[1300; 14]);
    }

    #[test]
    fn test_short_channel_payload_is_skipped() {
        // 长度 4：0x40 + 2 字节，不足 29
        let mut bytes = vec![0x04, 0x40, 0xE8, 0x03];
        bytes.extend(channel_bytes([1400; 14]));

        let metrics = Arc::new(RoverMetrics::new());
        let mut decoder = FrameDecoder::new(Cursor::new(bytes)).with_metrics(metrics.clone());

        let frame = decoder.next().unwrap().unwrap();
        assert_eq!(frame.channels(), &[1400; 14]);
        assert_eq!(metrics.snapshot().frames_malformed, 1);
    }

    #[test]
    fn test_oversized_channel_frame_consumes_declared_bytes() {
        // 长度 0x20：多出 2 字节尾部，应被忽略但从流中消费掉
        let mut bytes = vec![0x20, 0x40];
        for _ in 0..14 {
            bytes.extend_from_slice(&1600u16.to_le_bytes());
        }
        bytes.extend_from_slice(&[0xFF, 0xFF]);
        bytes.extend(channel_bytes([1700; 14]));

        let frames: Vec<_> = FrameDecoder::new(Cursor::new(bytes))
            .take(2)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(frames[0].channels(), &[1600; 14]);
        assert_eq!(frames[1].channels(), &[1700; 14]);
    }

    /// 每次只返回 1 字节的读句柄
    struct TrickleReader(Cursor<Vec<u8>>);

    impl Read for TrickleReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn test_short_reads_are_reassembled() {
        let mut values = [1500u16; 14];
        values[2] = 1750;
        let reader = TrickleReader(Cursor::new(channel_bytes(values)));

        let frame = FrameDecoder::new(reader).next_frame().unwrap();
        assert_eq!(frame.into_inner(), values);
    }
}
