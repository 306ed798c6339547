//! Wire protocol client
//!
//! One connection, strictly request/response. Callers give each operation a
//! deadline; a timeout poisons nothing because every call creates fresh
//! correlation ids and the connection is dropped by the caller on error.

use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::codec::{FrameReader, FrameWriter};
use crate::message::{Request, RequestBody, Response, ResponseBody};
use crate::WireError;

/// Wire protocol client connection
pub struct WireClient {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    next_id: u64,
}

impl WireClient {
    /// Connect with a bounded connect timeout
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, WireError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| WireError::Timeout)??;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            next_id: 0,
        })
    }

    /// Send one request and wait for its response within `timeout`.
    pub async fn request(
        &mut self,
        body: RequestBody,
        timeout: Duration,
    ) -> Result<ResponseBody, WireError> {
        self.next_id += 1;
        let id = self.next_id;

        let exchange = async {
            self.writer.write_frame(&Request { id, body }).await?;
            let response: Response = self.reader.read_frame().await?;
            if response.id != id {
                return Err(WireError::IdMismatch {
                    want: id,
                    got: response.id,
                });
            }
            Ok(response.body)
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| WireError::Timeout)?
    }

    /// Liveness probe
    pub async fn ping(&mut self, timeout: Duration) -> Result<(), WireError> {
        match self.request(RequestBody::Ping, timeout).await? {
            ResponseBody::Pong => Ok(()),
            ResponseBody::Error { code, message } => Err(WireError::Remote { code, message }),
            other => Err(WireError::Remote {
                code: crate::message::ErrorCode::Internal,
                message: format!("unexpected ping response: {:?}", other),
            }),
        }
    }

    /// Invoke a function on the owner of `bucket_id`, returning the raw
    /// JSON result bytes.
    pub async fn call(
        &mut self,
        bucket_id: u32,
        function: &str,
        args: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, WireError> {
        let body = RequestBody::Call {
            bucket_id,
            function: function.to_string(),
            args,
        };
        match self.request(body, timeout).await? {
            ResponseBody::Ok { value } => Ok(value),
            ResponseBody::Error { code, message } => Err(WireError::Remote { code, message }),
            ResponseBody::Pong => Err(WireError::Remote {
                code: crate::message::ErrorCode::Internal,
                message: "unexpected pong for call".to_string(),
            }),
        }
    }
}
