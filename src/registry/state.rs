use crate::Amount;

/// One account held by a registered identity.
/// Records are never deleted; `active` is kept for display filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub owner: String,
    pub label: String,
    pub balance: Amount,
    pub active: bool,
}

impl AccountRecord {
    pub fn open(owner: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            label: label.into(),
            balance: Amount::ZERO,
            active: true,
        }
    }

    /// Add `amount` to the balance, or `None` if the balance would overflow.
    pub fn credit(&mut self, amount: Amount) -> Option<Amount> {
        self.balance = self.balance.checked_add(amount)?;
        Some(self.balance)
    }

    /// Take `amount` from the balance, or `None` if it would go below zero.
    pub fn debit(&mut self, amount: Amount) -> Option<Amount> {
        self.balance = self.balance.checked_sub(amount)?;
        Some(self.balance)
    }
}
