//! Password policy.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Character-class and length requirements for password columns.
///
/// Stored as the `password` blob of the settings row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    /// Require an ASCII uppercase letter.
    pub upper: bool,
    /// Require an ASCII lowercase letter.
    pub lower: bool,
    /// Require an ASCII digit.
    pub number: bool,
    /// Require a character that is not an ASCII letter or digit.
    pub special: bool,
    /// Minimum length in characters.
    pub length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            upper: true,
            lower: true,
            number: true,
            special: true,
            length: 8,
        }
    }
}

impl PasswordPolicy {
    /// Checks a password, returning the first unmet requirement.
    ///
    /// # Errors
    ///
    /// Returns a description of the requirement that failed.
    pub fn check(&self, password: &str) -> Result<(), String> {
        if self.upper && !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err("must contain an uppercase letter".into());
        }
        if self.lower && !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err("must contain a lowercase letter".into());
        }
        if self.number && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err("must contain a number".into());
        }
        if self.special && !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
            return Err("must contain a special character".into());
        }
        if password.chars().count() < self.length {
            return Err(format!("must be at least {} characters", self.length));
        }
        Ok(())
    }

    /// True if the password meets every requirement.
    #[must_use]
    pub fn allows(&self, password: &str) -> bool {
        self.check(password).is_ok()
    }

    /// Draws random passwords of `length` characters from `alphabet` until
    /// one satisfies the policy.
    ///
    /// Returns `None` if the alphabet cannot satisfy the policy within a
    /// bounded number of attempts.
    #[must_use]
    pub fn generate(&self, alphabet: &str, length: usize) -> Option<String> {
        let chars: Vec<char> = alphabet.chars().collect();
        if chars.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        (0..256)
            .map(|_| {
                (0..length)
                    .filter_map(|_| chars.choose(&mut rng))
                    .collect::<String>()
            })
            .find(|candidate| self.allows(candidate))
    }
}
