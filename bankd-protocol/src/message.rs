//! Command and sub-request names.

use std::fmt;

/// Commands a client may send at the top level of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Fetch the localized welcome message.
    GetWelcome,
    /// Authenticate with card number and PIN.
    Login,
    /// Read the balance of the authenticated account.
    GetBalance,
    /// Withdraw with a one-time code.
    Withdraw,
    /// Deposit into the authenticated account.
    Deposit,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::GetWelcome,
        Command::Login,
        Command::GetBalance,
        Command::Withdraw,
        Command::Deposit,
    ];

    /// Returns the wire token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::GetWelcome => "get_wmsg",
            Command::Login => "login",
            Command::GetBalance => "get_blnce",
            Command::Withdraw => "withdraw",
            Command::Deposit => "deposit",
        }
    }

    /// Parses a wire token. Tokens are case-sensitive.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == token)
    }

    /// Returns whether the command moves or reveals money.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Command::GetBalance | Command::Withdraw | Command::Deposit
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input the server asks for in the middle of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubRequest {
    /// Language code for the welcome message.
    Language,
    /// Card number.
    CardNumber,
    /// PIN.
    Pin,
    /// One-time withdrawal code.
    AuthCode,
    /// Integer amount in the smallest currency unit.
    Amount,
}

impl SubRequest {
    pub const ALL: [SubRequest; 5] = [
        SubRequest::Language,
        SubRequest::CardNumber,
        SubRequest::Pin,
        SubRequest::AuthCode,
        SubRequest::Amount,
    ];

    /// Returns the wire token.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubRequest::Language => "get_lang",
            SubRequest::CardNumber => "get_user",
            SubRequest::Pin => "get_passw",
            SubRequest::AuthCode => "authcode",
            SubRequest::Amount => "get_amnt",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == token)
    }

    /// Returns whether the answer is a credential that must not be logged.
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            SubRequest::CardNumber | SubRequest::Pin | SubRequest::AuthCode
        )
    }
}

impl fmt::Display for SubRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
