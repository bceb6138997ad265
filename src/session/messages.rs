//! Customer-facing texts.
//!
//! Prompts end with `": "` and wait for one input line; every other message
//! ends with a newline. The relay client relies on that shape.

use crate::model::{Identity, WindowId};
use crate::registry::{AccountRecord, Opened, Receipt};
use crate::Amount;

/// Trailing marker of every message that expects an answer.
pub const PROMPT_MARKER: &str = ": ";
/// Present in every message after which the server closes the connection.
pub const CLOSING_MARKER: &str = "Closing the connection";
/// Present in the farewell message.
pub const FAREWELL_MARKER: &str = "Thank you for banking with us";

pub const REJECTED: &str = "Unregistered address. Closing the connection.\n";
pub const LINE_FULL: &str =
    "The waiting line is full. Closing the connection, please come back later.\n";
pub const IDLE_TIMEOUT: &str = "No input for too long. Closing the connection.\n";

pub const MENU_PROMPT: &str =
    "\nWhat can we do for you? (open account / deposit / withdraw)\nInput: ";
pub const UNKNOWN_COMMAND: &str = "Sorry, we could not find that service.\n\
     Please say 'open account', 'deposit' or 'withdraw'.\n";

pub const LABEL_PROMPT: &str = "\nBank name for the new account: ";
pub const TARGET_PROMPT: &str = "\nID of the customer to deposit to (e.g. pi200): ";
pub const UNKNOWN_TARGET: &str = "That customer ID does not exist.\n";
pub const DEPOSIT_SELECT_PROMPT: &str = "\nSelect the account to deposit to: ";
pub const DEPOSIT_AMOUNT_PROMPT: &str = "\nAmount to deposit: ";
pub const WITHDRAW_SELECT_PROMPT: &str = "\nSelect the account to withdraw from: ";
pub const SECRET_PROMPT: &str = "\nPassword (the last 3 digits of your ID): ";
pub const WITHDRAW_AMOUNT_PROMPT: &str = "\nAmount to withdraw: ";

pub const INVALID_SELECTION: &str = "Invalid account number.\n";
pub const INVALID_AMOUNT: &str = "Please enter a positive whole amount.\n";
pub const BALANCE_OVERFLOW: &str = "That deposit would exceed the maximum balance.\n";
pub const SECRET_MISMATCH: &str = "Password does not match.\n";
pub const NOT_REGISTERED: &str = "Your ID is not registered for this service.\n";
pub const NO_OWN_ACCOUNTS: &str = "You have no accounts yet.\n   Please open an account first.\n";

pub const CONTINUE_PROMPT: &str = "\nAnything else we can help you with? (yes/no): ";
pub const FAREWELL: &str = "\nAll done. Thank you for banking with us!\n";

pub fn queued(position: usize) -> String {
    format!("All windows are busy. You are number {position} in line, please wait...\n")
}

pub fn welcome(identity: &Identity, window: WindowId) -> String {
    format!(
        "\n========== Welcome to the bank ==========\n\
         Customer: {identity}\n\
         Window: {window}\n\
         =========================================\n"
    )
}

pub fn capacity_reached(capacity: usize) -> String {
    format!("You cannot open any more accounts (at most {capacity} per customer).\n")
}

pub fn opened(opened: &Opened) -> String {
    format!(
        "\nYour account is open!\n\
         \x20  Bank: {}\n\
         \x20  Opening balance: {}\n\
         \x20  Accounts held: {}/{}\n",
        opened.account.label, opened.account.balance, opened.count, opened.capacity
    )
}

pub fn target_has_no_accounts(target: &Identity) -> String {
    format!("{target} has no open accounts.\n")
}

/// Accounts of a deposit target; balances of other customers are not shown.
pub fn target_accounts(target: &Identity, accounts: &[AccountRecord]) -> String {
    let mut text = format!("\n{target}'s accounts:\n");
    for (i, account) in accounts.iter().enumerate() {
        text.push_str(&format!("   {}. {}\n", i + 1, account.label));
    }
    text
}

pub fn own_accounts(accounts: &[AccountRecord]) -> String {
    let mut text = String::from("\nYour accounts:\n=========================================\n");
    if accounts.is_empty() {
        text.push_str("   (no accounts)\n");
    }
    for (i, account) in accounts.iter().enumerate() {
        text.push_str(&format!(
            "   {}. {} - balance: {}\n",
            i + 1,
            account.label,
            account.balance
        ));
    }
    text.push_str("=========================================\n");
    text
}

pub fn deposited(receipt: &Receipt) -> String {
    format!(
        "\nDeposit complete!\n\
         \x20  To: {}\n\
         \x20  Bank: {}\n\
         \x20  Amount: {}\n\
         \x20  New balance: {}\n",
        receipt.owner, receipt.label, receipt.amount, receipt.balance
    )
}

pub fn insufficient_funds(balance: Amount, requested: Amount) -> String {
    format!(
        "Insufficient funds.\n\
         \x20  Current balance: {balance}\n\
         \x20  Requested: {requested}\n"
    )
}

pub fn withdrawn(receipt: &Receipt) -> String {
    format!(
        "\nWithdrawal complete!\n\
         \x20  Bank: {}\n\
         \x20  Amount: {}\n\
         \x20  New balance: {}\n",
        receipt.label, receipt.amount, receipt.balance
    )
}
