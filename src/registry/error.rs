//! Error types for registry operations.

use thiserror::Error;

use crate::Amount;

/// Error while opening an account.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpenAccountError {
    #[error("identity {0} is not registered")]
    UnknownIdentity(String),
    #[error("{identity} already holds the maximum of {capacity} accounts")]
    CapacityExceeded { identity: String, capacity: usize },
}

/// Error during deposit processing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DepositError {
    #[error("identity {0} is not registered")]
    UnknownIdentity(String),
    #[error("account #{} does not exist", .0 + 1)]
    InvalidIndex(usize),
    #[error("deposit amount must be positive")]
    InvalidAmount,
    #[error("deposit of {0} would overflow the balance")]
    BalanceOverflow(Amount),
}

/// Error during withdrawal processing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WithdrawalError {
    #[error("identity {0} is not registered")]
    UnknownIdentity(String),
    #[error("account #{} does not exist", .0 + 1)]
    InvalidIndex(usize),
    #[error("withdrawal amount must be positive")]
    InvalidAmount,
    #[error("secret does not match for {0}")]
    SecretMismatch(String),
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },
}
