//! Shared in-memory account registry.
//!
//! Every registered identity owns an ordered ledger of at most `capacity`
//! accounts. All reads and writes go through a single registry-wide lock, and
//! each check-then-mutate sequence runs inside one critical section.

use parking_lot::Mutex;
use tracing::info;

use crate::Amount;
use crate::model::{Identity, Secret};

mod state;
pub use state::AccountRecord;

mod error;
pub use error::{DepositError, OpenAccountError, WithdrawalError};

/// Default number of accounts one identity may open.
pub const DEFAULT_ACCOUNT_CAPACITY: usize = 5;

/// Result of a successful `open_account`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub account: AccountRecord,
    /// Number of accounts the owner holds after opening this one.
    pub count: usize,
    pub capacity: usize,
}

/// Result of a successful deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub owner: String,
    pub label: String,
    pub amount: Amount,
    pub balance: Amount,
}

/// The registry of identities and their accounts.
pub struct AccountRegistry {
    identities: Vec<Identity>,
    capacity: usize,
    /// One ledger per identity, indexed by roster position.
    ledgers: Mutex<Vec<Vec<AccountRecord>>>,
}

/// Public API
impl AccountRegistry {
    pub fn new(identities: impl IntoIterator<Item = Identity>, capacity: usize) -> Self {
        let identities: Vec<Identity> = identities.into_iter().collect();
        let ledgers = identities.iter().map(|_| Vec::with_capacity(capacity)).collect();
        Self {
            identities,
            capacity,
            ledgers: Mutex::new(ledgers),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a registered identity by its roster id (e.g. `pi203`).
    pub fn find_identity(&self, id: &str) -> Option<Identity> {
        let id = id.trim();
        self.identities.iter().find(|identity| identity.id() == id).cloned()
    }

    /// Number of accounts `identity` currently holds.
    pub fn account_count(&self, identity: &Identity) -> usize {
        let ledgers = self.ledgers.lock();
        self.ledger_index(identity)
            .map(|idx| ledgers[idx].len())
            .unwrap_or(0)
    }

    /// Active accounts of `identity`, in the order they were opened.
    pub fn list_accounts(&self, identity: &Identity) -> Vec<AccountRecord> {
        let ledgers = self.ledgers.lock();
        match self.ledger_index(identity) {
            Some(idx) => ledgers[idx].iter().filter(|a| a.active).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Open a new empty account. Rejected without mutation once the owner
    /// holds `capacity` accounts.
    pub fn open_account(
        &self,
        identity: &Identity,
        label: &str,
    ) -> Result<Opened, OpenAccountError> {
        let result = self.apply_open(identity, label);
        match &result {
            Ok(opened) => info!(
                identity = %identity,
                label = %opened.account.label,
                count = opened.count,
                "open account applied"
            ),
            Err(e) => info!(identity = %identity, reason = %e, "open account skipped"),
        }
        result
    }

    /// Credit `amount` to the `index`-th (0-based) active account of `target`.
    /// Any session may deposit into any registered identity's account.
    pub fn deposit(
        &self,
        target: &Identity,
        index: usize,
        amount: Amount,
    ) -> Result<Receipt, DepositError> {
        let result = self.apply_deposit(target, index, amount);
        Self::log_result("deposit", target, amount, &result);
        result
    }

    /// Debit `amount` from the `index`-th (0-based) active account of `own`.
    /// Requires the identity-bound secret and enough balance.
    pub fn withdraw(
        &self,
        own: &Identity,
        index: usize,
        amount: Amount,
        supplied: Secret,
    ) -> Result<Receipt, WithdrawalError> {
        let result = self.apply_withdrawal(own, index, amount, supplied);
        Self::log_result("withdrawal", own, amount, &result);
        result
    }

    /// Copy of every account in roster order, for reporting.
    pub fn snapshot(&self) -> Vec<AccountRecord> {
        self.ledgers.lock().iter().flatten().cloned().collect()
    }
}

/// Private API
impl AccountRegistry {
    /// Small helper to log deposit/withdrawal results
    fn log_result<E: std::fmt::Display>(
        operation: &str,
        identity: &Identity,
        amount: Amount,
        result: &Result<Receipt, E>,
    ) {
        match result {
            Ok(receipt) => info!(
                identity = %identity,
                label = %receipt.label,
                amount = %amount,
                balance = %receipt.balance,
                "{operation} applied"
            ),
            Err(e) => info!(
                identity = %identity,
                amount = %amount,
                reason = %e,
                "{operation} skipped"
            ),
        }
    }

    /// Ledger slot of a registered identity; identities from another roster yield `None`.
    fn ledger_index(&self, identity: &Identity) -> Option<usize> {
        let position = identity.position();
        match self.identities.get(position) {
            Some(registered) if registered == identity => Some(position),
            _ => None,
        }
    }

    fn apply_open(&self, identity: &Identity, label: &str) -> Result<Opened, OpenAccountError> {
        let idx = self
            .ledger_index(identity)
            .ok_or_else(|| OpenAccountError::UnknownIdentity(identity.id().to_string()))?;

        let mut ledgers = self.ledgers.lock();
        let ledger = &mut ledgers[idx];
        if ledger.len() >= self.capacity {
            return Err(OpenAccountError::CapacityExceeded {
                identity: identity.id().to_string(),
                capacity: self.capacity,
            });
        }

        let account = AccountRecord::open(identity.id(), label);
        ledger.push(account.clone());

        Ok(Opened {
            account,
            count: ledger.len(),
            capacity: self.capacity,
        })
    }

    fn apply_deposit(
        &self,
        target: &Identity,
        index: usize,
        amount: Amount,
    ) -> Result<Receipt, DepositError> {
        let idx = self
            .ledger_index(target)
            .ok_or_else(|| DepositError::UnknownIdentity(target.id().to_string()))?;

        if amount.is_zero() {
            return Err(DepositError::InvalidAmount);
        }

        let mut ledgers = self.ledgers.lock();
        let account = ledgers[idx]
            .iter_mut()
            .filter(|a| a.active)
            .nth(index)
            .ok_or(DepositError::InvalidIndex(index))?;

        let balance = account
            .credit(amount)
            .ok_or(DepositError::BalanceOverflow(amount))?;

        Ok(Receipt {
            owner: account.owner.clone(),
            label: account.label.clone(),
            amount,
            balance,
        })
    }

    fn apply_withdrawal(
        &self,
        own: &Identity,
        index: usize,
        amount: Amount,
        supplied: Secret,
    ) -> Result<Receipt, WithdrawalError> {
        let idx = self
            .ledger_index(own)
            .ok_or_else(|| WithdrawalError::UnknownIdentity(own.id().to_string()))?;

        let mut ledgers = self.ledgers.lock();
        let account = ledgers[idx]
            .iter_mut()
            .filter(|a| a.active)
            .nth(index)
            .ok_or(WithdrawalError::InvalidIndex(index))?;

        if amount.is_zero() {
            return Err(WithdrawalError::InvalidAmount);
        }

        if supplied != own.secret() {
            return Err(WithdrawalError::SecretMismatch(own.id().to_string()));
        }

        let balance = account
            .debit(amount)
            .ok_or(WithdrawalError::InsufficientFunds {
                balance: account.balance,
                requested: amount,
            })?;

        Ok(Receipt {
            owner: account.owner.clone(),
            label: account.label.clone(),
            amount,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    // test utils

    fn roster() -> Vec<Identity> {
        (0..3)
            .map(|i| Identity::new(format!("pi{}", 200 + i), 200 + i as Secret, i))
            .collect()
    }

    fn registry() -> (AccountRegistry, Vec<Identity>) {
        let identities = roster();
        (
            AccountRegistry::new(identities.clone(), DEFAULT_ACCOUNT_CAPACITY),
            identities,
        )
    }

    fn amount(value: u64) -> Amount {
        Amount::new(value)
    }

    #[test]
    fn new_registry_has_no_accounts() {
        let (registry, ids) = registry();
        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.account_count(&ids[0]), 0);
        assert!(registry.list_accounts(&ids[0]).is_empty());
    }

    #[test]
    fn find_identity_by_roster_id() {
        let (registry, ids) = registry();
        assert_eq!(registry.find_identity("pi201"), Some(ids[1].clone()));
        assert_eq!(registry.find_identity(" pi202\n"), Some(ids[2].clone()));
        assert_eq!(registry.find_identity("pi299"), None);
        assert_eq!(registry.find_identity(""), None);
    }

    // Open account

    #[test]
    fn open_deposit_and_list() {
        let (registry, ids) = registry();
        let opened = registry.open_account(&ids[0], "Alpha").unwrap();
        assert_eq!(opened.account.label, "Alpha");
        assert_eq!(opened.account.balance, Amount::ZERO);
        assert_eq!(opened.count, 1);
        assert_eq!(opened.capacity, 5);

        let receipt = registry.deposit(&ids[0], 0, amount(100)).unwrap();
        assert_eq!(receipt.balance, amount(100));

        let accounts = registry.list_accounts(&ids[0]);
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].label, "Alpha");
        assert_eq!(accounts[0].balance, amount(100));
    }

    #[test]
    fn accounts_are_listed_in_opening_order() {
        let (registry, ids) = registry();
        for label in ["A", "B", "C"] {
            registry.open_account(&ids[1], label).unwrap();
        }
        let labels: Vec<_> = registry
            .list_accounts(&ids[1])
            .into_iter()
            .map(|a| a.label)
            .collect();
        assert_eq!(labels, ["A", "B", "C"]);
    }

    #[test]
    fn sixth_account_is_rejected_without_mutation() {
        let (registry, ids) = registry();
        for i in 0..5 {
            registry.open_account(&ids[0], &format!("bank{i}")).unwrap();
        }
        let before = registry.list_accounts(&ids[0]);

        let result = registry.open_account(&ids[0], "one too many");
        assert_eq!(
            result,
            Err(OpenAccountError::CapacityExceeded {
                identity: "pi200".to_string(),
                capacity: 5
            })
        );
        assert_eq!(registry.list_accounts(&ids[0]), before);
        assert_eq!(registry.account_count(&ids[0]), 5);
    }

    #[test]
    fn foreign_identity_is_rejected() {
        let (registry, _) = registry();
        let stranger = Identity::new("pi999", 999, 0);
        assert!(matches!(
            registry.open_account(&stranger, "x"),
            Err(OpenAccountError::UnknownIdentity(_))
        ));
        assert!(registry.list_accounts(&stranger).is_empty());
    }

    // Deposit

    #[test]
    fn deposit_into_another_identity_is_allowed() {
        let (registry, ids) = registry();
        registry.open_account(&ids[2], "Beta").unwrap();

        let receipt = registry.deposit(&ids[2], 0, amount(40)).unwrap();
        assert_eq!(receipt.owner, "pi202");
        assert_eq!(receipt.label, "Beta");
        assert_eq!(receipt.amount, amount(40));
        assert_eq!(receipt.balance, amount(40));
    }

    #[test]
    fn deposit_validates_index_and_amount() {
        let (registry, ids) = registry();
        registry.open_account(&ids[0], "Alpha").unwrap();

        assert_eq!(
            registry.deposit(&ids[0], 1, amount(10)),
            Err(DepositError::InvalidIndex(1))
        );
        assert_eq!(
            registry.deposit(&ids[0], 0, Amount::ZERO),
            Err(DepositError::InvalidAmount)
        );
        assert_eq!(registry.list_accounts(&ids[0])[0].balance, Amount::ZERO);
    }

    #[test]
    fn deposit_overflow_is_rejected() {
        let (registry, ids) = registry();
        registry.open_account(&ids[0], "Alpha").unwrap();
        registry.deposit(&ids[0], 0, amount(u64::MAX)).unwrap();

        assert_eq!(
            registry.deposit(&ids[0], 0, amount(1)),
            Err(DepositError::BalanceOverflow(amount(1)))
        );
        assert_eq!(registry.list_accounts(&ids[0])[0].balance, amount(u64::MAX));
    }

    // Withdrawal

    #[test]
    fn withdrawal_decreases_balance() {
        let (registry, ids) = registry();
        registry.open_account(&ids[0], "Alpha").unwrap();
        registry.deposit(&ids[0], 0, amount(100)).unwrap();

        let receipt = registry.withdraw(&ids[0], 0, amount(30), 200).unwrap();
        assert_eq!(receipt.balance, amount(70));
        assert_eq!(receipt.label, "Alpha");
    }

    #[test]
    fn withdrawal_with_wrong_secret_leaves_balance_unchanged() {
        let (registry, ids) = registry();
        registry.open_account(&ids[0], "Alpha").unwrap();
        registry.deposit(&ids[0], 0, amount(100)).unwrap();

        assert_eq!(
            registry.withdraw(&ids[0], 0, amount(10), 201),
            Err(WithdrawalError::SecretMismatch("pi200".to_string()))
        );
        assert_eq!(registry.list_accounts(&ids[0])[0].balance, amount(100));

        // a later attempt with the right secret still works
        assert!(registry.withdraw(&ids[0], 0, amount(10), 200).is_ok());
    }

    #[test]
    fn overdraw_is_rejected_then_exact_amount_succeeds() {
        let (registry, ids) = registry();
        registry.open_account(&ids[1], "Alpha").unwrap();
        registry.deposit(&ids[1], 0, amount(50)).unwrap();

        assert_eq!(
            registry.withdraw(&ids[1], 0, amount(51), 201),
            Err(WithdrawalError::InsufficientFunds {
                balance: amount(50),
                requested: amount(51)
            })
        );
        assert_eq!(registry.list_accounts(&ids[1])[0].balance, amount(50));

        let receipt = registry.withdraw(&ids[1], 0, amount(50), 201).unwrap();
        assert_eq!(receipt.balance, Amount::ZERO);
    }

    #[test]
    fn withdrawal_validates_index_and_amount() {
        let (registry, ids) = registry();
        registry.open_account(&ids[0], "Alpha").unwrap();

        assert_eq!(
            registry.withdraw(&ids[0], 3, amount(1), 200),
            Err(WithdrawalError::InvalidIndex(3))
        );
        assert_eq!(
            registry.withdraw(&ids[0], 0, Amount::ZERO, 200),
            Err(WithdrawalError::InvalidAmount)
        );
    }

    // Concurrency

    #[test]
    fn concurrent_operations_do_not_lose_updates() {
        let (registry, ids) = registry();
        registry.open_account(&ids[0], "Shared").unwrap();
        registry.deposit(&ids[0], 0, amount(1_000)).unwrap();

        let (deposited, withdrawn) = thread::scope(|scope| {
            let depositors: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        (0..250)
                            .filter(|_| registry.deposit(&ids[0], 0, amount(3)).is_ok())
                            .count() as u64
                            * 3
                    })
                })
                .collect();
            let withdrawers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        (0..250)
                            .filter(|_| registry.withdraw(&ids[0], 0, amount(5), 200).is_ok())
                            .count() as u64
                            * 5
                    })
                })
                .collect();

            let deposited: u64 = depositors.into_iter().map(|h| h.join().unwrap()).sum();
            let withdrawn: u64 = withdrawers.into_iter().map(|h| h.join().unwrap()).sum();
            (deposited, withdrawn)
        });

        let balance = registry.list_accounts(&ids[0])[0].balance;
        assert_eq!(balance.value(), 1_000 + deposited - withdrawn);
    }

    #[test]
    fn concurrent_opens_respect_capacity() {
        let (registry, ids) = registry();

        let opened: usize = thread::scope(|scope| {
            let handles: Vec<_> = (0..10)
                .map(|i| {
                    let registry = &registry;
                    let owner = &ids[0];
                    scope.spawn(move || registry.open_account(owner, &format!("b{i}")).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(opened, 5);
        assert_eq!(registry.account_count(&ids[0]), 5);
    }

    #[test]
    fn snapshot_covers_every_identity() {
        let (registry, ids) = registry();
        registry.open_account(&ids[0], "A").unwrap();
        registry.open_account(&ids[2], "C").unwrap();

        let owners: Vec<_> = registry.snapshot().into_iter().map(|a| a.owner).collect();
        assert_eq!(owners, ["pi200", "pi202"]);
    }
}
