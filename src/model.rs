//! Core domain types shared by the registry, the dispatcher and sessions.

use std::fmt;

/// Withdrawal secret bound to an identity (its allow-listed address suffix).
pub type Secret = u16;

/// Window (worker slot) number, 1-based as announced to customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(usize);

impl WindowId {
    pub fn from_index(index: usize) -> Self {
        WindowId(index + 1)
    }

    pub fn index(self) -> usize {
        self.0 - 1
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered customer from the closed roster.
///
/// Identities are created once at startup and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    id: String,
    secret: Secret,
    /// Position in the roster; the registry keys its ledgers by it.
    position: usize,
}

impl Identity {
    pub fn new(id: impl Into<String>, secret: Secret, position: usize) -> Self {
        Self {
            id: id.into(),
            secret,
            position,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn secret(&self) -> Secret {
        self.secret
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_ids_are_one_based() {
        let window = WindowId::from_index(0);
        assert_eq!(window.to_string(), "1");
        assert_eq!(window.index(), 0);
        assert_eq!(WindowId::from_index(4).to_string(), "5");
    }

    #[test]
    fn display_uses_roster_id() {
        assert_eq!(Identity::new("pi200", 200, 0).to_string(), "pi200");
    }
}
