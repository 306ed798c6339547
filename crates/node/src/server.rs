//! Binary protocol server
//!
//! Accepts router connections and executes routed function calls.

use std::sync::Arc;

use tokio::io::split;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};

use wire::{FrameReader, FrameWriter, Request, RequestBody, Response, ResponseBody, WireError};

use crate::node::StorageNode;

/// Binary protocol server
pub struct WireServer {
    node: Arc<StorageNode>,
    listener: TcpListener,
}

impl WireServer {
    pub fn new(node: Arc<StorageNode>, listener: TcpListener) -> Self {
        Self { node, listener }
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the task is dropped
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let node = self.node.clone();
                    tokio::spawn(async move {
                        match handle_connection(stream, node).await {
                            Ok(()) | Err(WireError::ConnectionClosed) => {}
                            Err(e) => warn!("Connection {} failed: {}", addr, e),
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, node: Arc<StorageNode>) -> Result<(), WireError> {
    stream.set_nodelay(true)?;
    let (read_half, write_half) = split(stream);
    let mut reader = FrameReader::new(read_half);
    let mut writer = FrameWriter::new(write_half);

    loop {
        let request: Request = reader.read_frame().await?;
        let body = match request.body {
            RequestBody::Ping => ResponseBody::Pong,
            RequestBody::Call { function, args, .. } => match node.handle_call(&function, &args) {
                Ok(value) => ResponseBody::Ok { value },
                Err(e) => ResponseBody::Error {
                    code: e.code(),
                    message: e.to_string(),
                },
            },
        };
        writer
            .write_frame(&Response {
                id: request.id,
                body,
            })
            .await?;
    }
}
