//! TCP server implementation.

use crate::config::Config;
use crate::error::ServerError;
use crate::handler::CommandHandler;
use crate::metrics::Metrics;
use crate::session::{Session, SessionConfig};
use bankd_protocol::{WireMode, MAX_FRAME_SIZE};
use bankd_storage::AccountStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout, applied to every read.
    pub idle_timeout: Duration,
    /// Receive buffer size.
    pub max_frame_bytes: usize,
    /// Message boundary format.
    pub wire_mode: WireMode,
    /// Directory with localized welcome messages.
    pub welcome_dir: PathBuf,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_frame_bytes", &self.max_frame_bytes)
            .field("wire_mode", &self.wire_mode)
            .field("welcome_dir", &self.welcome_dir)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds the runtime configuration from loaded settings.
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            idle_timeout: config.network.idle_timeout(),
            max_frame_bytes: config.network.max_frame_bytes,
            wire_mode: config.network.wire_mode,
            welcome_dir: config.welcome.dir.clone(),
            metrics: None,
        }
    }

    /// Sets the wire mode.
    pub fn with_wire_mode(mut self, wire_mode: WireMode) -> Self {
        self.wire_mode = wire_mode;
        self
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Sets the welcome message directory.
    pub fn with_welcome_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.welcome_dir = dir.into();
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            wire_mode: self.wire_mode,
            idle_timeout: self.idle_timeout,
            max_frame_bytes: self.max_frame_bytes.clamp(1, MAX_FRAME_SIZE),
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for bankd.
pub struct Server {
    config: ServerConfig,
    handler: Arc<CommandHandler>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig, store: Arc<dyn AccountStore>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut handler = CommandHandler::new(store).with_welcome_dir(config.welcome_dir.clone());
        if let Some(ref metrics) = config.metrics {
            handler = handler.with_metrics(metrics.clone());
        }
        Self {
            config,
            handler: Arc::new(handler),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and runs the server.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Runs the server on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let local_addr = listener.local_addr()?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Server listening on {} ({} framing)",
            local_addr,
            self.config.wire_mode
        );

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => self.spawn_connection(tcp_stream, addr),
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn spawn_connection(&self, tcp_stream: TcpStream, addr: SocketAddr) {
        self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

        if let Some(ref metrics) = self.config.metrics {
            metrics.connections_total.inc();
            metrics.connections_active.inc();
        }

        let handler = self.handler.clone();
        let stats = self.stats.clone();
        let config = self.config.clone();
        let mut conn_shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            if let Err(e) = tcp_stream.set_nodelay(true) {
                tracing::debug!("[{}] Failed to set TCP_NODELAY: {}", addr, e);
            }

            let result = Self::handle_connection(
                tcp_stream,
                addr,
                handler,
                &config,
                &stats,
                &mut conn_shutdown,
            )
            .await;

            match result {
                Ok(()) | Err(ServerError::ConnectionClosed) | Err(ServerError::ShuttingDown) => {}
                Err(ServerError::IdleTimeout) => {
                    tracing::info!("[{}] Idle timeout", addr);
                }
                Err(e) => {
                    tracing::debug!("Connection {} error: {}", addr, e);
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }
            }

            stats.connections_active.fetch_sub(1, Ordering::Relaxed);
            if let Some(ref metrics) = config.metrics {
                metrics.connections_active.dec();
            }

            tracing::info!("Client disconnected: {}", addr);
        });
    }

    /// Serves commands on one connection until it ends.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        handler: Arc<CommandHandler>,
        config: &ServerConfig,
        stats: &ServerStats,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!("Client connected: {}", addr);

        let mut session = Session::new(stream, addr, config.session_config());
        tracing::debug!("[{}] Session {}", addr, session.id);

        let result = loop {
            let frame = tokio::select! {
                frame = session.read_frame() => frame,
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    Err(ServerError::ShuttingDown)
                }
            };
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => break Err(e),
            };

            stats.requests_total.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = handler.handle(&mut session, &frame).await {
                break Err(e);
            }
        };

        tracing::debug!(
            "[{}] Session {} ended after {:?} ({} requests)",
            addr,
            session.id,
            session.age(),
            session.request_count()
        );
        session.close().await;
        result
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankd_protocol::{decode, StatusCode};
    use bankd_storage::LocalStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn start_server(config: ServerConfig) -> (Arc<Server>, SocketAddr) {
        let store = LocalStore::new();
        store.create_account("1111222233334444", "4242", 1000).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(Server::new(config, Arc::new(store)));
        let runner = server.clone();
        tokio::spawn(async move { runner.serve(listener).await });
        (server, addr)
    }

    async fn read_response(stream: &mut TcpStream) -> (StatusCode, String) {
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        let (status, payload) = decode(&buf[..n]).unwrap();
        (status, String::from_utf8(payload.to_vec()).unwrap())
    }

    #[test]
    fn test_server_config_from_config() {
        let mut config = Config::default();
        config.network.idle_timeout_secs = 12;
        config.network.wire_mode = WireMode::LengthPrefixed;

        let server_config = ServerConfig::from_config(&config);
        assert_eq!(server_config.bind_addr.port(), 1337);
        assert_eq!(server_config.idle_timeout, Duration::from_secs(12));
        assert_eq!(server_config.wire_mode, WireMode::LengthPrefixed);
        assert!(!server_config.metrics_enabled());
    }

    #[tokio::test]
    async fn test_server_not_running_before_serve() {
        let server = Server::new(
            ServerConfig::new("127.0.0.1:0".parse().unwrap()),
            Arc::new(LocalStore::new()),
        );
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_padded_session_over_tcp() {
        let (server, addr) = start_server(ServerConfig::new("127.0.0.1:0".parse().unwrap())).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"get_blnce").await.unwrap();
        assert_eq!(
            read_response(&mut stream).await,
            (StatusCode::Failure, "Authentication required".to_string())
        );

        stream.write_all(b"login").await.unwrap();
        assert_eq!(
            read_response(&mut stream).await,
            (StatusCode::Request, "get_user".to_string())
        );
        stream.write_all(b"1111222233334444").await.unwrap();
        assert_eq!(
            read_response(&mut stream).await,
            (StatusCode::Request, "get_passw".to_string())
        );
        stream.write_all(b"4242").await.unwrap();
        assert_eq!(
            read_response(&mut stream).await,
            (StatusCode::Success, "Authenticated".to_string())
        );

        stream.write_all(b"get_blnce").await.unwrap();
        assert_eq!(
            read_response(&mut stream).await,
            (StatusCode::Success, "1000".to_string())
        );

        assert_eq!(server.stats().connections_total.load(Ordering::Relaxed), 1);
        assert_eq!(server.stats().requests_total.load(Ordering::Relaxed), 3);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_idle_connection_is_closed() {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap())
            .with_idle_timeout(Duration::from_millis(100));
        let (server, addr) = start_server(config).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_serving() {
        let store = Arc::new(LocalStore::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Arc::new(Server::new(
            ServerConfig::new("127.0.0.1:0".parse().unwrap()),
            store,
        ));
        let runner = server.clone();
        let task = tokio::spawn(async move { runner.serve(listener).await });

        while !server.is_running() {
            tokio::task::yield_now().await;
        }
        server.shutdown();
        task.await.unwrap().unwrap();
        assert!(!server.is_running());
    }
}
