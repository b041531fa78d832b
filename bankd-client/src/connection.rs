//! Connection management.

use crate::error::ClientError;
use bankd_protocol::codec::Encoder;
use bankd_protocol::{decode, Decoder, StatusCode, WireMode, DEFAULT_PORT, MAX_FRAME_SIZE};
use bytes::Bytes;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Deadline for each server message.
    pub request_timeout: Duration,
    /// Message boundary format. Must match the server.
    pub wire_mode: WireMode,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)))
    }
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            wire_mode: WireMode::Padded,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_wire_mode(mut self, wire_mode: WireMode) -> Self {
        self.wire_mode = wire_mode;
        self
    }
}

/// A connection to a bankd server.
///
/// The protocol is strictly one exchange at a time, so a connection is used
/// through `&mut self` and never shared between tasks.
pub struct Connection<S = TcpStream> {
    config: ConnectionConfig,
    stream: Option<S>,
    /// Buffers partial reads in length-prefixed mode.
    decoder: Decoder,
}

impl Connection<TcpStream> {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            stream: None,
            decoder: Decoder::new(),
        }
    }

    /// Connects to the server.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let tcp_stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        tcp_stream.set_nodelay(true).ok();

        self.stream = Some(tcp_stream);
        self.decoder.clear();
        tracing::debug!("Connected to {}", self.config.addr);
        Ok(())
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already connected stream.
    pub fn with_stream(config: ConnectionConfig, stream: S) -> Self {
        Self {
            config,
            stream: Some(stream),
            decoder: Decoder::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Sends one message: a command or an answer to a sub-request.
    pub async fn send(&mut self, payload: &str) -> Result<(), ClientError> {
        let encoded = Encoder::encode_request(self.config.wire_mode, payload.as_bytes())?;
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        stream.write_all(&encoded).await?;
        stream.flush().await?;
        tracing::debug!("Sent {} bytes", encoded.len());
        Ok(())
    }

    /// Receives one server message.
    pub async fn recv(&mut self) -> Result<(StatusCode, String), ClientError> {
        let timeout = self.config.request_timeout;
        let (status, payload) = tokio::time::timeout(timeout, self.read_message())
            .await
            .map_err(|_| {
                tracing::debug!("Read timeout");
                ClientError::Timeout
            })??;

        let text = String::from_utf8(payload.to_vec())
            .map_err(|_| bankd_protocol::ProtocolError::InvalidUtf8)?;
        tracing::debug!("Received {} ({} bytes)", status, text.len());
        Ok((status, text))
    }

    async fn read_message(&mut self) -> Result<(StatusCode, Bytes), ClientError> {
        let mode = self.config.wire_mode;
        let mut buf = [0u8; MAX_FRAME_SIZE];

        loop {
            if mode == WireMode::LengthPrefixed {
                if let Some(message) = self.decoder.decode_response()? {
                    return Ok(message);
                }
            }

            let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                self.stream = None;
                return Err(ClientError::ConnectionClosed);
            }

            match mode {
                WireMode::Padded => {
                    let (status, payload) = decode(&buf[..n])?;
                    return Ok((status, Bytes::copy_from_slice(payload)));
                }
                WireMode::LengthPrefixed => self.decoder.extend(&buf[..n]),
            }
        }
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!("Shutting down connection");
            let _ = stream.shutdown().await;
        }
        self.decoder.clear();
        Ok(())
    }
}
