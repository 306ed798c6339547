//! Frame reader and writer
//!
//! A frame is a big-endian u32 payload length followed by the bincode
//! payload. The reader enforces a frame-size cap so a misbehaving peer
//! cannot make us allocate unbounded memory.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::WireError;

/// Default maximum frame size: 16MB
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Async frame reader
pub struct FrameReader<R: AsyncRead + Unpin> {
    reader: BufReader<R>,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_frame_size(reader, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_frame_size,
        }
    }

    /// Read and decode the next frame.
    ///
    /// A clean EOF at a frame boundary maps to `ConnectionClosed`.
    pub async fn read_frame<T: DeserializeOwned>(&mut self) -> Result<T, WireError> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(WireError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > self.max_frame_size {
            return Err(WireError::FrameTooLarge(len, self.max_frame_size));
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).await?;
        Ok(bincode::deserialize(&payload)?)
    }
}

/// Async frame writer
pub struct FrameWriter<W: AsyncWrite + Unpin> {
    writer: BufWriter<W>,
    max_frame_size: usize,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_max_frame_size(writer, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(writer: W, max_frame_size: usize) -> Self {
        Self {
            writer: BufWriter::new(writer),
            max_frame_size,
        }
    }

    /// Encode and write one frame, flushing afterwards.
    pub async fn write_frame<T: Serialize>(&mut self, value: &T) -> Result<(), WireError> {
        let payload = bincode::serialize(value)?;
        if payload.len() > self.max_frame_size {
            return Err(WireError::FrameTooLarge(payload.len(), self.max_frame_size));
        }

        self.writer
            .write_all(&(payload.len() as u32).to_be_bytes())
            .await?;
        self.writer.write_all(&payload).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Request, RequestBody};

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let request = Request {
            id: 7,
            body: RequestBody::Call {
                bucket_id: 42,
                function: "get_uuid".to_string(),
                args: b"[]".to_vec(),
            },
        };

        let mut buf = Vec::new();
        let mut writer = FrameWriter::new(&mut buf);
        writer.write_frame(&request).await.unwrap();

        let mut reader = FrameReader::new(buf.as_slice());
        let decoded: Request = reader.read_frame().await.unwrap();
        assert_eq!(decoded, request);
    }

    #[tokio::test]
    async fn test_reader_rejects_oversized_frame() {
        // Length header claims more than the cap allows
        let mut buf = Vec::new();
        buf.extend_from_slice(&(1024u32).to_be_bytes());
        buf.extend_from_slice(&[0u8; 1024]);

        let mut reader = FrameReader::with_max_frame_size(buf.as_slice(), 512);
        let result: Result<Request, _> = reader.read_frame().await;
        assert!(matches!(result, Err(WireError::FrameTooLarge(1024, 512))));
    }

    #[tokio::test]
    async fn test_reader_reports_closed_connection() {
        let buf: Vec<u8> = Vec::new();
        let mut reader = FrameReader::new(buf.as_slice());
        let result: Result<Request, _> = reader.read_frame().await;
        assert!(matches!(result, Err(WireError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_writer_rejects_oversized_frame() {
        let request = Request {
            id: 1,
            body: RequestBody::Call {
                bucket_id: 0,
                function: "f".to_string(),
                args: vec![0u8; 4096],
            },
        };

        let mut buf = Vec::new();
        let mut writer = FrameWriter::with_max_frame_size(&mut buf, 128);
        let result = writer.write_frame(&request).await;
        assert!(matches!(result, Err(WireError::FrameTooLarge(_, 128))));
    }
}
