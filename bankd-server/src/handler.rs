//! Command handlers.

use crate::auth::PinVerifier;
use crate::error::ServerError;
use crate::metrics::Metrics;
use crate::session::Session;
use crate::welcome::WelcomeMessages;
use bankd_protocol::{trim_padding, Command, ProtocolError, StatusCode, SubRequest};
use bankd_storage::account::mask_card_number;
use bankd_storage::{AccountId, AccountStore, StorageError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};

/// Maximum compare-and-set rounds for one balance update.
pub const MAX_BALANCE_UPDATE_ATTEMPTS: usize = 16;

const DEFAULT_WELCOME_DIR: &str = "./files";

/// Direction of a balance update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BalanceChange {
    Withdraw,
    Deposit,
}

/// Command handler.
///
/// Shared by every connection. Per-connection state lives in the [`Session`].
pub struct CommandHandler {
    store: Arc<dyn AccountStore>,
    pin_verifier: PinVerifier,
    welcome: WelcomeMessages,
    /// Metrics for request tracking.
    metrics: Option<Arc<Metrics>>,
}

impl CommandHandler {
    /// Creates a new command handler.
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            pin_verifier: PinVerifier::new(),
            welcome: WelcomeMessages::new(DEFAULT_WELCOME_DIR),
            metrics: None,
        }
    }

    /// Sets the welcome message directory.
    pub fn with_welcome_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.welcome = WelcomeMessages::new(dir);
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns a reference to the metrics, if set.
    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    /// Handles one client command, including any sub-requests it issues.
    ///
    /// Recoverable errors are answered with a `Failure` frame and reported as
    /// `Ok`. Only errors that end the session are returned.
    pub async fn handle<S>(&self, session: &mut Session<S>, raw: &[u8]) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        session.record_request();
        let started = Instant::now();

        let (label, result) = match std::str::from_utf8(trim_padding(raw)) {
            Ok(text) => {
                let token = text.trim();
                match Command::parse(token) {
                    Some(command) => {
                        tracing::info!("[{}] Request: {}", session.remote_addr, command);
                        (command.as_str(), self.dispatch(session, command).await)
                    }
                    None => {
                        tracing::info!("[{}] Request: unknown {:?}", session.remote_addr, token);
                        ("unknown", Err(ServerError::BadRequest(token.to_string())))
                    }
                }
            }
            Err(_) => ("unknown", Err(ProtocolError::InvalidUtf8.into())),
        };

        if let Some(ref metrics) = self.metrics {
            metrics.requests_total.with_label_values(&[label]).inc();
            metrics
                .request_duration
                .with_label_values(&[label])
                .observe(started.elapsed().as_secs_f64());
            if let Err(ref e) = result {
                metrics.failures_total.with_label_values(&[e.kind()]).inc();
            }
        }

        match result {
            Ok(payload) => {
                tracing::info!("[{}] Response: SUCCESS ({})", session.remote_addr, label);
                session.write_frame(StatusCode::Success, &payload).await
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                match e {
                    ServerError::Storage(ref inner) => {
                        tracing::error!("[{}] Store failure: {}", session.remote_addr, inner);
                    }
                    _ => tracing::info!(
                        "[{}] Response: FAILURE ({}: {})",
                        session.remote_addr,
                        label,
                        e.kind()
                    ),
                }
                session
                    .write_frame(StatusCode::Failure, &e.failure_message())
                    .await
            }
        }
    }

    async fn dispatch<S>(
        &self,
        session: &mut Session<S>,
        command: Command,
    ) -> Result<String, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // Gate before any sub-request or store access
        if command.requires_auth() {
            session.require_authenticated()?;
        }

        match command {
            Command::GetWelcome => self.handle_get_welcome(session).await,
            Command::Login => self.handle_login(session).await,
            Command::GetBalance => self.handle_get_balance(session),
            Command::Withdraw => self.handle_withdraw(session).await,
            Command::Deposit => self.handle_deposit(session).await,
        }
    }

    async fn handle_get_welcome<S>(&self, session: &mut Session<S>) -> Result<String, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let lang = session.request(SubRequest::Language).await?;
        self.welcome.load(&lang).await
    }

    async fn handle_login<S>(&self, session: &mut Session<S>) -> Result<String, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let card_number = session.request(SubRequest::CardNumber).await?;
        let pin = session.request(SubRequest::Pin).await?;

        let account = self
            .store
            .find_account_by_card_number(&card_number)?
            .ok_or_else(|| {
                tracing::info!(
                    "[{}] Login failed: unknown card {}",
                    session.remote_addr,
                    mask_card_number(&card_number)
                );
                ServerError::AccountNotFound
            })?;

        // An account without a PIN can never log in
        let stored = self.store.get_pin(account)?.ok_or(ServerError::WrongPin)?;
        if !self.pin_verifier.verify(&pin, &stored) {
            tracing::info!(
                "[{}] Login failed: wrong PIN for card {}",
                session.remote_addr,
                mask_card_number(&card_number)
            );
            return Err(ServerError::WrongPin);
        }

        session.authenticate(account);
        tracing::info!(
            "[{}] Authenticated card {} as account {}",
            session.remote_addr,
            mask_card_number(&card_number),
            account
        );
        Ok("Authenticated".to_string())
    }

    fn handle_get_balance<S>(&self, session: &Session<S>) -> Result<String, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let account = session.require_authenticated()?;
        let balance = self.store.get_balance(account)?;
        Ok(balance.to_string())
    }

    async fn handle_withdraw<S>(&self, session: &mut Session<S>) -> Result<String, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let account = session.require_authenticated()?;

        let code = session.request(SubRequest::AuthCode).await?;
        if !self.store.consume_one_time_code(account, &code)? {
            return Err(ServerError::WrongCode);
        }

        // The code is spent from here on, whatever happens to the amount
        let amount = self.read_amount(session).await?;
        let balance = self.update_balance(account, amount, BalanceChange::Withdraw)?;
        tracing::info!(
            "[{}] Account {} withdrew {} (balance {})",
            session.remote_addr,
            account,
            amount,
            balance
        );
        Ok("Balance updated".to_string())
    }

    async fn handle_deposit<S>(&self, session: &mut Session<S>) -> Result<String, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let account = session.require_authenticated()?;

        let amount = self.read_amount(session).await?;
        let balance = self.update_balance(account, amount, BalanceChange::Deposit)?;
        tracing::info!(
            "[{}] Account {} deposited {} (balance {})",
            session.remote_addr,
            account,
            amount,
            balance
        );
        Ok("Balance updated".to_string())
    }

    async fn read_amount<S>(&self, session: &mut Session<S>) -> Result<i64, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let text = session.request(SubRequest::Amount).await?;
        parse_amount(&text)
    }

    /// Applies a withdrawal or deposit with compare-and-set, re-reading the
    /// balance whenever a concurrent writer wins the race.
    fn update_balance(
        &self,
        account: AccountId,
        amount: i64,
        change: BalanceChange,
    ) -> Result<i64, ServerError> {
        for attempt in 1..=MAX_BALANCE_UPDATE_ATTEMPTS {
            let current = self.store.get_balance(account)?;
            let new = match change {
                BalanceChange::Withdraw => {
                    if amount > current {
                        return Err(ServerError::InsufficientFunds);
                    }
                    current - amount
                }
                BalanceChange::Deposit => current
                    .checked_add(amount)
                    .ok_or_else(|| ServerError::InvalidAmount(amount.to_string()))?,
            };

            if self.store.compare_and_set_balance(account, current, new)? {
                return Ok(new);
            }
            tracing::debug!(
                "Balance update on account {} lost race (attempt {})",
                account,
                attempt
            );
        }

        tracing::warn!(
            "Balance update on account {} gave up after {} attempts",
            account,
            MAX_BALANCE_UPDATE_ATTEMPTS
        );
        Err(StorageError::Conflict(account).into())
    }
}

/// Parses a non-negative decimal amount.
fn parse_amount(text: &str) -> Result<i64, ServerError> {
    match text.parse::<i64>() {
        Ok(amount) if amount >= 0 => Ok(amount),
        _ => Err(ServerError::InvalidAmount(text.to_string())),
    }
}
