//! Session management.
//!
//! A session owns one client connection. It tracks who is logged in and
//! provides the framed read/write primitives the command handler uses,
//! including the server-initiated sub-requests that happen in the middle of a
//! command.

use crate::error::ServerError;
use bankd_protocol::codec::Encoder;
use bankd_protocol::{trim_padding, Decoder, StatusCode, SubRequest, WireMode, MAX_FRAME_SIZE};
use bankd_storage::AccountId;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

/// Per-connection settings taken from the server configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Message boundary format.
    pub wire_mode: WireMode,
    /// Deadline for each read and write.
    pub idle_timeout: Duration,
    /// Receive buffer size.
    pub max_frame_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wire_mode: WireMode::Padded,
            idle_timeout: Duration::from_secs(300),
            max_frame_bytes: MAX_FRAME_SIZE,
        }
    }
}

/// Authentication state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// No successful login yet.
    Unauthenticated,
    /// Logged in as the given account.
    Authenticated(AccountId),
}

/// A client session.
pub struct Session<S> {
    /// Unique session ID.
    pub id: String,

    /// Remote address.
    pub remote_addr: SocketAddr,

    stream: S,

    config: SessionConfig,

    /// Buffers partial reads in length-prefixed mode.
    decoder: Decoder,

    state: SessionState,

    request_count: u64,

    created_at: Instant,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new session over a connected stream.
    pub fn new(stream: S, remote_addr: SocketAddr, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr,
            stream,
            config,
            decoder: Decoder::new(),
            state: SessionState::Unauthenticated,
            request_count: 0,
            created_at: Instant::now(),
        }
    }

    /// Reads one message body.
    ///
    /// The idle deadline restarts with every call. A timeout or a closed peer
    /// ends the session.
    pub async fn read_frame(&mut self) -> Result<Bytes, ServerError> {
        let frame = match self.config.wire_mode {
            WireMode::Padded => {
                let mut buf = vec![0u8; self.config.max_frame_bytes];
                let n = self.read_with_deadline(&mut buf).await?;
                Bytes::copy_from_slice(trim_padding(&buf[..n]))
            }
            WireMode::LengthPrefixed => loop {
                if let Some(body) = self.decoder.decode_body().map_err(ServerError::Framing)? {
                    break body;
                }
                let mut buf = [0u8; MAX_FRAME_SIZE];
                let n = self.read_with_deadline(&mut buf).await?;
                self.decoder.extend(&buf[..n]);
            },
        };

        tracing::debug!("[{}] Received {} bytes", self.remote_addr, frame.len());
        Ok(frame)
    }

    async fn read_with_deadline(&mut self, buf: &mut [u8]) -> Result<usize, ServerError> {
        let n = tokio::time::timeout(self.config.idle_timeout, self.stream.read(buf))
            .await
            .map_err(|_| ServerError::IdleTimeout)??;
        if n == 0 {
            return Err(ServerError::ConnectionClosed);
        }
        Ok(n)
    }

    /// Reads one message as trimmed text.
    pub async fn read_text(&mut self) -> Result<String, ServerError> {
        let frame = self.read_frame().await?;
        let text = std::str::from_utf8(&frame)
            .map_err(|_| bankd_protocol::ProtocolError::InvalidUtf8)?;
        Ok(text.trim().to_string())
    }

    /// Writes one status-prefixed message.
    ///
    /// Payloads that would not fit in one frame are cut at a char boundary,
    /// since replies may echo client input or file contents.
    pub async fn write_frame(&mut self, status: StatusCode, payload: &str) -> Result<(), ServerError> {
        let fitted = fit_payload(payload);
        if fitted.len() < payload.len() {
            tracing::debug!(
                "[{}] Truncated {} byte payload to {} bytes",
                self.remote_addr,
                payload.len(),
                fitted.len()
            );
        }
        let bytes = Encoder::encode_response(self.config.wire_mode, status, fitted.as_bytes())?;
        tokio::time::timeout(self.config.idle_timeout, async {
            self.stream.write_all(&bytes).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| ServerError::IdleTimeout)??;
        tracing::debug!("[{}] Wrote {} bytes", self.remote_addr, bytes.len());
        Ok(())
    }

    /// Asks the client for more input and waits for the answer.
    pub async fn request(&mut self, request: SubRequest) -> Result<String, ServerError> {
        self.write_frame(StatusCode::Request, request.as_str()).await?;
        let answer = self.read_text().await?;
        if request.is_secret() {
            tracing::debug!("[{}] Sub-request {} answered", self.remote_addr, request);
        } else {
            tracing::debug!(
                "[{}] Sub-request {} answered: {}",
                self.remote_addr,
                request,
                answer
            );
        }
        Ok(answer)
    }

    /// Returns the logged-in account or an authorization error.
    pub fn require_authenticated(&self) -> Result<AccountId, ServerError> {
        match self.state {
            SessionState::Authenticated(id) => Ok(id),
            SessionState::Unauthenticated => Err(ServerError::NotAuthenticated),
        }
    }

    /// Records a successful login, replacing any previous identity.
    pub fn authenticate(&mut self, account: AccountId) {
        self.state = SessionState::Authenticated(account);
    }

    /// Returns whether the session is authenticated.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// Returns the wire mode.
    pub fn wire_mode(&self) -> WireMode {
        self.config.wire_mode
    }

    /// Records a request.
    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    /// Returns the request count.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Returns the session age.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Shuts down the write side of the connection.
    pub async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!("[{}] Shutdown error: {}", self.remote_addr, e);
        }
    }
}

/// Longest prefix of `payload` that fits in one frame after the status byte.
fn fit_payload(payload: &str) -> &str {
    let max = MAX_FRAME_SIZE - 1;
    if payload.len() <= max {
        return payload;
    }
    let mut end = max;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    &payload[..end]
}
