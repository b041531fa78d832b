//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use bankd_protocol::{Command, StatusCode, SubRequest};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// High-level client for bankd.
///
/// Each call sends one command and answers the server's sub-requests from its
/// own arguments. When the server asks for something the call cannot answer,
/// the call fails with [`ClientError::UnexpectedRequest`] and the connection
/// should be closed, since the server is still waiting for input.
pub struct Client<S = TcpStream> {
    conn: Connection<S>,
}

impl Client<TcpStream> {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Connection::new(config),
        }
    }

    /// Connects to the server.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.conn.connect().await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection<S>) -> Self {
        Self { conn }
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&mut self) -> &mut Connection<S> {
        &mut self.conn
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    /// Runs one command to completion.
    async fn exchange(
        &mut self,
        command: Command,
        answers: &[(SubRequest, &str)],
    ) -> Result<String, ClientError> {
        tracing::debug!("Sending command {}", command);
        self.conn.send(command.as_str()).await?;

        loop {
            let (status, text) = self.conn.recv().await?;
            match status {
                StatusCode::Success => return Ok(text),
                StatusCode::Failure => return Err(ClientError::Failed(text)),
                StatusCode::Request => {
                    let answer = SubRequest::parse(&text).and_then(|request| {
                        answers
                            .iter()
                            .find(|(asked, _)| *asked == request)
                            .map(|(_, answer)| *answer)
                    });
                    match answer {
                        Some(answer) => {
                            tracing::debug!("Answering sub-request {}", text);
                            self.conn.send(answer).await?;
                        }
                        None => return Err(ClientError::UnexpectedRequest(text)),
                    }
                }
            }
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Fetches the welcome message in the given language.
    pub async fn welcome_message(&mut self, lang: &str) -> Result<String, ClientError> {
        self.exchange(Command::GetWelcome, &[(SubRequest::Language, lang)])
            .await
    }

    /// Logs in with a card number and PIN.
    pub async fn login(&mut self, card_number: &str, pin: &str) -> Result<(), ClientError> {
        self.exchange(
            Command::Login,
            &[(SubRequest::CardNumber, card_number), (SubRequest::Pin, pin)],
        )
        .await?;
        Ok(())
    }

    /// Returns the balance of the logged-in account.
    pub async fn balance(&mut self) -> Result<i64, ClientError> {
        let text = self.exchange(Command::GetBalance, &[]).await?;
        text.parse()
            .map_err(|_| ClientError::BadResponse(format!("balance is not a number: {}", text)))
    }

    /// Withdraws `amount` using a one-time authorization code.
    pub async fn withdraw(&mut self, code: &str, amount: i64) -> Result<(), ClientError> {
        let amount = amount.to_string();
        self.exchange(
            Command::Withdraw,
            &[(SubRequest::AuthCode, code), (SubRequest::Amount, &amount)],
        )
        .await?;
        Ok(())
    }

    /// Deposits `amount`.
    pub async fn deposit(&mut self, amount: i64) -> Result<(), ClientError> {
        let amount = amount.to_string();
        self.exchange(Command::Deposit, &[(SubRequest::Amount, &amount)])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn client(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock> {
        Client::from_connection(Connection::with_stream(ConnectionConfig::default(), mock))
    }

    #[tokio::test]
    async fn test_login_answers_sub_requests() {
        let mock = Builder::new()
            .write(b"login")
            .read(b"\x02get_user")
            .write(b"1111222233334444")
            .read(b"\x02get_passw")
            .write(b"4242")
            .read(b"\x01Authenticated")
            .build();

        client(mock).login("1111222233334444", "4242").await.unwrap();
    }

    #[tokio::test]
    async fn test_withdraw() {
        let mock = Builder::new()
            .write(b"withdraw")
            .read(b"\x02authcode")
            .write(b"9999")
            .read(b"\x02get_amnt")
            .write(b"300")
            .read(b"\x01Balance updated")
            .build();

        client(mock).withdraw("9999", 300).await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_error() {
        let mock = Builder::new()
            .write(b"withdraw")
            .read(b"\x02authcode")
            .write(b"0000")
            .read(b"\x00Wrong code")
            .build();

        let err = client(mock).withdraw("0000", 10).await.unwrap_err();
        assert_eq!(err.failure_message(), Some("Wrong code"));
    }

    #[tokio::test]
    async fn test_unexpected_sub_request() {
        let mock = Builder::new()
            .write(b"deposit")
            .read(b"\x02authcode")
            .build();

        let err = client(mock).deposit(10).await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedRequest(ref name) if name == "authcode"));
    }

    #[tokio::test]
    async fn test_balance_parsing() {
        let mock = Builder::new()
            .write(b"get_blnce")
            .read(b"\x01-25")
            .write(b"get_blnce")
            .read(b"\x01lots")
            .build();
        let mut client = client(mock);

        assert_eq!(client.balance().await.unwrap(), -25);
        assert!(matches!(
            client.balance().await,
            Err(ClientError::BadResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_welcome_message() {
        let mock = Builder::new()
            .write(b"get_wmsg")
            .read(b"\x02get_lang")
            .write(b"en")
            .read(b"\x01Welcome!")
            .build();

        assert_eq!(
            client(mock).welcome_message("en").await.unwrap(),
            "Welcome!"
        );
    }
}
