use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Whole-unit money amount. Balances can never go below zero, so the value is unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(u64);

/// Reason a user-supplied amount could not be read.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseAmountError {
    #[error("amount is empty")]
    Empty,
    #[error("'{0}' is not a whole non-negative number")]
    NotANumber(String),
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(value: u64) -> Self {
        Amount(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        trimmed
            .parse::<u64>()
            .map(Amount)
            .map_err(|_| ParseAmountError::NotANumber(trimmed.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
