//! Length-prefixed framing for the control channel

use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (1 MiB)
const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// Reads and writes `[u32 big-endian length][payload]` frames
pub struct FrameCodec;

impl FrameCodec {
    /// Read one frame. Returns `None` on a clean end of stream.
    pub async fn read<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Bytes>> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf);
        if len == 0 {
            return Err(Error::Protocol("Zero-length frame".to_string()));
        }
        if len > MAX_FRAME_SIZE {
            return Err(Error::Protocol(format!("Frame too large: {} bytes", len)));
        }

        let mut buf = BytesMut::zeroed(len as usize);
        reader.read_exact(&mut buf).await?;
        Ok(Some(buf.freeze()))
    }

    /// Write one frame and flush
    pub async fn write<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= MAX_FRAME_SIZE)
            .ok_or_else(|| {
                Error::Protocol(format!("Frame too large: {} bytes", payload.len()))
            })?;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(64);
        FrameCodec::write(&mut a, b"{\"command\":\"list\"}").await.unwrap();
        drop(a);

        let frame = FrameCodec::read(&mut b).await.unwrap().unwrap();
        assert_eq!(&frame[..], b"{\"command\":\"list\"}");
        assert!(FrameCodec::read(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_zero_and_oversized_frames() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&0u32.to_be_bytes()).await.unwrap();
        assert!(matches!(
            FrameCodec::read(&mut b).await,
            Err(Error::Protocol(_))
        ));

        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&(MAX_FRAME_SIZE + 1).to_be_bytes()).await.unwrap();
        assert!(matches!(
            FrameCodec::read(&mut b).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&10u32.to_be_bytes()).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);
        assert!(FrameCodec::read(&mut b).await.is_err());
    }
}
