//! Per-connection menu session.
//!
//! A session greets the customer, then loops over the menu until the customer
//! declines further service or the connection drops. Every registry call is a
//! single short critical section; no lock is held while waiting on the peer.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, info, warn};

use crate::Amount;
use crate::model::{Identity, WindowId};
use crate::registry::{AccountRegistry, DepositError, OpenAccountError, WithdrawalError};

pub mod command;
pub mod messages;

use command::{Command, ContinueAnswer, parse_secret, parse_selection};

/// Longest input line accepted from a customer, in bytes.
pub const MAX_LINE_BYTES: u64 = 1024;
/// Account labels are cut to this many characters.
pub const MAX_LABEL_CHARS: usize = 49;

/// Why a session ended without reaching the farewell.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("peer disconnected")]
    PeerDisconnected,
    #[error("no input within {0:?}")]
    IdleTimeout(Duration),
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Welcome,
    MenuPrompt,
    OpeningAccount,
    Depositing,
    Withdrawing,
    ContinueQuestion,
    Farewell,
}

/// One customer's conversation with one window.
pub struct Session<'a, S> {
    stream: BufReader<S>,
    identity: &'a Identity,
    window: WindowId,
    registry: &'a AccountRegistry,
    idle_timeout: Option<Duration>,
}

impl<'a, S> Session<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        identity: &'a Identity,
        window: WindowId,
        registry: &'a AccountRegistry,
    ) -> Self {
        Self {
            stream: BufReader::new(stream),
            identity,
            window,
            registry,
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Drive the session to the farewell. Any read failure ends it early.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        let mut state = State::Welcome;
        loop {
            state = match state {
                State::Welcome => {
                    let greeting = messages::welcome(self.identity, self.window);
                    self.send(&greeting).await?;
                    State::MenuPrompt
                }
                State::MenuPrompt => {
                    let line = self.ask(messages::MENU_PROMPT).await?;
                    match Command::classify(&line) {
                        Command::OpenAccount => State::OpeningAccount,
                        Command::Deposit => State::Depositing,
                        Command::Withdraw => State::Withdrawing,
                        Command::Unknown => {
                            self.send(messages::UNKNOWN_COMMAND).await?;
                            State::MenuPrompt
                        }
                    }
                }
                State::OpeningAccount => {
                    self.open_account().await?;
                    State::ContinueQuestion
                }
                State::Depositing => {
                    self.deposit().await?;
                    State::ContinueQuestion
                }
                State::Withdrawing => self.withdraw().await?,
                State::ContinueQuestion => {
                    let line = self.ask(messages::CONTINUE_PROMPT).await?;
                    // unrecognized answers keep the session going
                    match ContinueAnswer::classify(&line) {
                        ContinueAnswer::Stop => State::Farewell,
                        ContinueAnswer::Continue => {
                            debug!(identity = %self.identity, window = %self.window, "continuing session");
                            State::MenuPrompt
                        }
                    }
                }
                State::Farewell => {
                    self.send(messages::FAREWELL).await?;
                    info!(identity = %self.identity, window = %self.window, "session completed");
                    return Ok(());
                }
            };
        }
    }
}

/// Menu operations
impl<S> Session<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn open_account(&mut self) -> Result<(), SessionError> {
        let capacity = self.registry.capacity();
        // checked again atomically by the registry
        if self.registry.account_count(self.identity) >= capacity {
            return self.send(&messages::capacity_reached(capacity)).await;
        }

        let line = self.ask(messages::LABEL_PROMPT).await?;
        let label: String = line.trim().chars().take(MAX_LABEL_CHARS).collect();

        match self.registry.open_account(self.identity, &label) {
            Ok(opened) => self.send(&messages::opened(&opened)).await,
            Err(OpenAccountError::CapacityExceeded { capacity, .. }) => {
                self.send(&messages::capacity_reached(capacity)).await
            }
            Err(e @ OpenAccountError::UnknownIdentity(_)) => {
                warn!(identity = %self.identity, reason = %e, "open account refused");
                self.send(messages::NOT_REGISTERED).await
            }
        }
    }

    async fn deposit(&mut self) -> Result<(), SessionError> {
        let line = self.ask(messages::TARGET_PROMPT).await?;
        let Some(target) = self.registry.find_identity(&line) else {
            return self.send(messages::UNKNOWN_TARGET).await;
        };

        let accounts = self.registry.list_accounts(&target);
        if accounts.is_empty() {
            return self.send(&messages::target_has_no_accounts(&target)).await;
        }
        self.send(&messages::target_accounts(&target, &accounts)).await?;

        let line = self.ask(messages::DEPOSIT_SELECT_PROMPT).await?;
        let Some(index) = parse_selection(&line).filter(|&i| i < accounts.len()) else {
            return self.send(messages::INVALID_SELECTION).await;
        };

        let line = self.ask(messages::DEPOSIT_AMOUNT_PROMPT).await?;
        let Some(amount) = parse_positive(&line) else {
            return self.send(messages::INVALID_AMOUNT).await;
        };

        let reply = match self.registry.deposit(&target, index, amount) {
            Ok(receipt) => {
                info!(from = %self.identity, to = %target, amount = %amount, "deposit by session");
                messages::deposited(&receipt)
            }
            Err(DepositError::InvalidIndex(_)) => messages::INVALID_SELECTION.to_string(),
            Err(DepositError::InvalidAmount) => messages::INVALID_AMOUNT.to_string(),
            Err(DepositError::BalanceOverflow(_)) => messages::BALANCE_OVERFLOW.to_string(),
            Err(DepositError::UnknownIdentity(_)) => messages::UNKNOWN_TARGET.to_string(),
        };
        self.send(&reply).await
    }

    /// Returns the next state: back to the menu when there is nothing to
    /// withdraw from, otherwise on to the continue question.
    async fn withdraw(&mut self) -> Result<State, SessionError> {
        let accounts = self.registry.list_accounts(self.identity);
        if accounts.is_empty() {
            self.send(messages::NO_OWN_ACCOUNTS).await?;
            return Ok(State::MenuPrompt);
        }
        self.send(&messages::own_accounts(&accounts)).await?;

        let line = self.ask(messages::WITHDRAW_SELECT_PROMPT).await?;
        let Some(index) = parse_selection(&line).filter(|&i| i < accounts.len()) else {
            self.send(messages::INVALID_SELECTION).await?;
            return Ok(State::ContinueQuestion);
        };

        let line = self.ask(messages::SECRET_PROMPT).await?;
        let supplied = match parse_secret(&line) {
            Some(secret) if secret == self.identity.secret() => secret,
            _ => {
                warn!(identity = %self.identity, window = %self.window, "withdrawal secret mismatch");
                self.send(messages::SECRET_MISMATCH).await?;
                return Ok(State::ContinueQuestion);
            }
        };

        let line = self.ask(messages::WITHDRAW_AMOUNT_PROMPT).await?;
        let Some(amount) = parse_positive(&line) else {
            self.send(messages::INVALID_AMOUNT).await?;
            return Ok(State::ContinueQuestion);
        };

        let reply = match self.registry.withdraw(self.identity, index, amount, supplied) {
            Ok(receipt) => messages::withdrawn(&receipt),
            Err(WithdrawalError::InsufficientFunds { balance, requested }) => {
                messages::insufficient_funds(balance, requested)
            }
            Err(WithdrawalError::SecretMismatch(_)) => messages::SECRET_MISMATCH.to_string(),
            Err(WithdrawalError::InvalidIndex(_)) => messages::INVALID_SELECTION.to_string(),
            Err(WithdrawalError::InvalidAmount) => messages::INVALID_AMOUNT.to_string(),
            Err(WithdrawalError::UnknownIdentity(_)) => messages::NOT_REGISTERED.to_string(),
        };
        self.send(&reply).await?;
        Ok(State::ContinueQuestion)
    }
}

/// Connection I/O
impl<S> Session<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send(&mut self, text: &str) -> Result<(), SessionError> {
        self.stream.write_all(text.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn ask(&mut self, prompt: &str) -> Result<String, SessionError> {
        self.send(prompt).await?;
        self.read_line().await
    }

    /// Next input line, decoded lossily so stray bytes only fail the
    /// classifiers and never the session.
    async fn read_line(&mut self) -> Result<String, SessionError> {
        let read = read_capped_line(&mut self.stream);
        let result = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read).await.ok(),
            None => Some(read.await),
        };

        let Some(result) = result else {
            let limit = self.idle_timeout.unwrap_or_default();
            warn!(identity = %self.identity, window = %self.window, ?limit, "session idle timeout");
            // best effort, the session ends either way
            let _ = self.send(messages::IDLE_TIMEOUT).await;
            return Err(SessionError::IdleTimeout(limit));
        };

        let Some(CappedLine { bytes, truncated }) = result? else {
            return Err(SessionError::PeerDisconnected);
        };
        if truncated {
            warn!(
                identity = %self.identity,
                window = %self.window,
                limit = MAX_LINE_BYTES,
                "input line too long, rest discarded"
            );
        }

        let line = String::from_utf8_lossy(&bytes).into_owned();
        debug!(identity = %self.identity, window = %self.window, input = %line.trim_end(), "received");
        Ok(line)
    }
}

struct CappedLine {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Read one newline-terminated line of at most `MAX_LINE_BYTES`. Whatever
/// follows the cap up to the next newline is dropped, so one line is always
/// one answer. `None` on EOF.
async fn read_capped_line<R>(reader: &mut R) -> io::Result<Option<CappedLine>>
where
    R: AsyncBufRead + Unpin,
{
    let mut bytes = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_BYTES)
        .read_until(b'\n', &mut bytes)
        .await?;
    if n == 0 {
        return Ok(None);
    }

    let truncated = bytes.last() != Some(&b'\n') && bytes.len() as u64 >= MAX_LINE_BYTES;
    if truncated {
        let mut overflow = Vec::new();
        loop {
            overflow.clear();
            let n = (&mut *reader)
                .take(MAX_LINE_BYTES)
                .read_until(b'\n', &mut overflow)
                .await?;
            if n == 0 || overflow.last() == Some(&b'\n') {
                break;
            }
        }
    }

    Ok(Some(CappedLine { bytes, truncated }))
}

fn parse_positive(line: &str) -> Option<Amount> {
    line.parse::<Amount>().ok().filter(|amount| !amount.is_zero())
}
