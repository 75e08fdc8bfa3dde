//! Control server for Unix sockets
//!
//! This module implements the server that listens for incoming control
//! connections and dispatches commands to the handler.

use crate::control::{ApiError, ApiRequest, ApiResponse, CommandHandler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info};

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/mesh-control.sock";

/// Control server manages the control API socket
pub struct ControlServer {
    /// Path to Unix socket
    socket_path: PathBuf,
    /// Command handler
    handler: Arc<CommandHandler>,
}

impl ControlServer {
    /// Create a new control server
    pub fn new(socket_path: PathBuf, handler: Arc<CommandHandler>) -> Self {
        Self {
            socket_path,
            handler,
        }
    }

    /// Socket this server binds
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one
    pub fn bind(&self) -> Result<UnixListener, ApiError> {
        info!("Starting control server at {:?}", self.socket_path);

        // Remove existing socket if present
        if self.socket_path.exists() {
            info!("Removing existing socket at {:?}", self.socket_path);
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                ApiError::InternalError(format!("Failed to remove existing socket: {}", e))
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ApiError::InternalError(format!("Failed to create socket directory: {}", e))
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| {
            ApiError::InternalError(format!("Failed to bind Unix socket: {}", e))
        })?;

        info!("Control server listening at {:?}", self.socket_path);
        Ok(listener)
    }

    /// Bind and accept connections until the task is dropped
    pub async fn start(&self) -> Result<(), ApiError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: UnixListener) -> Result<(), ApiError> {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handler).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Shutdown the server and clean up
    pub async fn shutdown(&self) -> Result<(), ApiError> {
        info!("Shutting down control server");

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                ApiError::InternalError(format!("Failed to remove socket: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: UnixStream,
    handler: Arc<CommandHandler>,
) -> Result<(), ApiError> {
    debug!("New client connection");

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();

        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("Client disconnected");
                break;
            }
            Ok(_) => {
                let request_str = line.trim();
                if request_str.is_empty() {
                    continue;
                }

                debug!("Received request: {}", request_str);

                let response = match ApiRequest::from_json(request_str) {
                    Ok(request) => handler.handle_request(request).await,
                    Err(e) => {
                        error!("Failed to parse request: {}", e);
                        ApiResponse::error("unknown".to_string(), e)
                    }
                };

                let mut response_str = response.to_json()?;
                response_str.push('\n');

                writer
                    .write_all(response_str.as_bytes())
                    .await
                    .map_err(|e| {
                        ApiError::InternalError(format!("Failed to write response: {}", e))
                    })?;

                writer.flush().await.map_err(|e| {
                    ApiError::InternalError(format!("Failed to flush response: {}", e))
                })?;
            }
            Err(e) => {
                error!("Failed to read from socket: {}", e);
                break;
            }
        }
    }

    Ok(())
}
