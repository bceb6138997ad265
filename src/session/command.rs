//! Keyword classification of customer input, independent of any I/O.

use crate::model::Secret;

/// Operation requested at the menu prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    OpenAccount,
    Deposit,
    Withdraw,
    Unknown,
}

/// Answer to the "anything else?" question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueAnswer {
    Continue,
    Stop,
}

const STOP_TOKENS: &[&str] = &[
    "no", "nope", "nah", "n", "stop", "quit", "exit", "done", "end", "bye", "finish", "nothing",
];

/// Korean is agglutinative ("아니요", "없어요"), so these match anywhere in a token.
const STOP_FRAGMENTS: &[&str] = &["아니", "없", "종료", "끝"];

/// Split input into lowercase alphanumeric words.
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn has_stem(tokens: &[String], stem: &str) -> bool {
    tokens.iter().any(|token| token.starts_with(stem))
}

fn has_fragment(tokens: &[String], fragment: &str) -> bool {
    tokens.iter().any(|token| token.contains(fragment))
}

impl Command {
    /// Ordered match: account+open, then deposit, then withdraw. Each also
    /// accepts its Korean keywords (통장+개설, 입금, 출금).
    pub fn classify(input: &str) -> Self {
        let tokens = tokenize(input);
        let open = has_stem(&tokens, "account") && has_stem(&tokens, "open");
        if open || (has_fragment(&tokens, "통장") && has_fragment(&tokens, "개설")) {
            Command::OpenAccount
        } else if has_stem(&tokens, "deposit") || has_fragment(&tokens, "입금") {
            Command::Deposit
        } else if has_stem(&tokens, "withdraw") || has_fragment(&tokens, "출금") {
            Command::Withdraw
        } else {
            Command::Unknown
        }
    }
}

impl ContinueAnswer {
    /// Any stop word ends the session; everything else, including input we
    /// do not understand, goes back to the menu.
    pub fn classify(input: &str) -> Self {
        let tokens = tokenize(input);
        let stop = tokens.iter().any(|token| STOP_TOKENS.contains(&token.as_str()))
            || STOP_FRAGMENTS.iter().any(|fragment| has_fragment(&tokens, fragment));
        if stop {
            ContinueAnswer::Stop
        } else {
            ContinueAnswer::Continue
        }
    }
}

/// Parse a 1-based menu selection into a 0-based index.
pub fn parse_selection(input: &str) -> Option<usize> {
    input.trim().parse::<usize>().ok()?.checked_sub(1)
}

/// Parse a typed withdrawal secret; anything but a plain number is `None`.
pub fn parse_secret(input: &str) -> Option<Secret> {
    input.trim().parse().ok()
}
