//! Binary protocol front-end
//!
//! Clients speak the same framed protocol to the router as the router speaks
//! to storage nodes; the router resolves the bucket and forwards the call.

use std::sync::Arc;

use tokio::io::split;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};

use wire::{FrameReader, FrameWriter, Request, RequestBody, Response, ResponseBody, WireError};

use crate::router::WriteRouter;

/// Router front-end server
pub struct RouterServer {
    router: Arc<WriteRouter>,
    listener: TcpListener,
}

impl RouterServer {
    pub fn new(router: Arc<WriteRouter>, listener: TcpListener) -> Self {
        Self { router, listener }
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept client connections until the task is dropped
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New client connection from {}", addr);
                    let router = self.router.clone();
                    tokio::spawn(async move {
                        match handle_client(stream, router).await {
                            Ok(()) | Err(WireError::ConnectionClosed) => {}
                            Err(e) => warn!("Client {} failed: {}", addr, e),
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

async fn handle_client(stream: TcpStream, router: Arc<WriteRouter>) -> Result<(), WireError> {
    stream.set_nodelay(true)?;
    let (read_half, write_half) = split(stream);
    let mut reader = FrameReader::new(read_half);
    let mut writer = FrameWriter::new(write_half);

    loop {
        let request: Request = reader.read_frame().await?;
        let body = match request.body {
            RequestBody::Ping => ResponseBody::Pong,
            RequestBody::Call {
                bucket_id,
                function,
                args,
            } => match router.route_write(bucket_id, &function, &args).await {
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
