//! Length-prefixed framing used by the demo transport.
//!
//! ```text
//! | 4 bytes   | 4 bytes | N bytes            |
//! | magic     | N       | krpc::Message      |
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use krpc::{Error, Message, MsgMeta, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAGIC_NUM: u32 = u32::from_be_bytes(*b"KRPC");

const HEADER_LEN: usize = 2 * std::mem::size_of::<u32>();

/// Encodes `meta` and `payload` as one frame.
///
/// # Errors
///
/// Returns an error if the metadata cannot be serialized or the frame is
/// longer than `max_msg_size`.
pub fn encode(meta: &MsgMeta, payload: &[u8], max_msg_size: usize) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len() + 128);
    buf.put_u32(MAGIC_NUM);
    buf.put_u32(0);
    meta.serialize_to(payload, &mut buf)?;
    let len = buf.len() - HEADER_LEN;
    if len > max_msg_size {
        return Err(Error::invalid_argument(format!("msg is too long: {len}")));
    }
    let len = u32::try_from(len)?;
    buf[4..HEADER_LEN].copy_from_slice(&len.to_be_bytes());
    Ok(buf)
}

/// Reads frames from a byte stream.
pub struct FrameReader<R> {
    stream: R,
    buffer: BytesMut,
    max_msg_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R, max_msg_size: usize) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(64 << 10),
            max_msg_size,
        }
    }

    /// Returns the next message, `None` on a clean end of stream.
    ///
    /// # Errors
    ///
    /// Fails on a bad header, an oversized or truncated frame, or an
    /// undecodable message.
    pub async fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(bytes) = self.parse_frame()? {
                return Message::parse(bytes).map(Some);
            }
            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(Error::internal(format!(
                        "stream closed with {} pending byte(s)",
                        self.buffer.len()
                    )))
                };
            }
        }
    }

    fn parse_frame(&mut self) -> Result<Option<Bytes>> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }
        let mut header = &self.buffer[..HEADER_LEN];
        let magic = header.get_u32();
        if magic != MAGIC_NUM {
            return Err(Error::invalid_argument(format!(
                "invalid header: {magic:08X}"
            )));
        }

        let len = usize::try_from(header.get_u32())?;
        if len > self.max_msg_size {
            return Err(Error::invalid_argument(format!("msg is too long: {len}")));
        }

        if self.buffer.len() < HEADER_LEN + len {
            self.buffer.reserve(HEADER_LEN + len - self.buffer.len());
            Ok(None)
        } else {
            self.buffer.advance(HEADER_LEN);
            Ok(Some(self.buffer.split_to(len).freeze()))
        }
    }
}

/// Writes one encoded frame and flushes the stream.
///
/// # Errors
///
/// Returns `Internal` if the stream fails.
pub async fn write_frame<W: AsyncWrite + Unpin>(stream: &mut W, frame: &[u8]) -> Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await?;
    Ok(())
}
