//! Salted text encryption for password columns.

use super::key::{CryptoManager, EncryptionKey};
use crate::error::{CoreError, CoreResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::seq::SliceRandom;

/// Characters a generated salt is drawn from.
pub const SALT_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789`~!@#$%^&*()-_=+,.<>/?|[];";

/// Generates a random salt of `length` characters.
#[must_use]
pub fn generate_salt(length: usize) -> String {
    let alphabet: Vec<char> = SALT_ALPHABET.chars().collect();
    let mut rng = rand::thread_rng();
    (0..length)
        .filter_map(|_| alphabet.choose(&mut rng))
        .collect()
}

/// Reversible, salted encryption of short strings.
///
/// The plaintext is suffixed with the salt, encrypted, and stored as
/// `base64(nonce || ciphertext || tag)`. Decryption strips the salt again.
pub struct TextCipher {
    manager: CryptoManager,
    salt: String,
}

impl TextCipher {
    /// Creates a cipher from a key and salt.
    #[must_use]
    pub fn new(key: &EncryptionKey, salt: impl Into<String>) -> Self {
        Self {
            manager: CryptoManager::new(key),
            salt: salt.into(),
        }
    }

    /// Creates a cipher from the secret and salt stored in settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot be turned into a key.
    pub fn from_secret(secret: &str, salt: &str) -> CoreResult<Self> {
        let key = EncryptionKey::from_secret(secret, salt.as_bytes())?;
        Ok(Self::new(&key, salt))
    }

    /// Encrypts `plaintext`.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn encrypt(&self, plaintext: &str) -> CoreResult<String> {
        let mut salted = String::with_capacity(plaintext.len() + self.salt.len());
        salted.push_str(plaintext);
        salted.push_str(&self.salt);
        let sealed = self.manager.encrypt(salted.as_bytes())?;
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypts text produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid ciphertext for this key,
    /// or if the decrypted value does not end with the salt.
    pub fn decrypt(&self, ciphertext: &str) -> CoreResult<String> {
        let sealed = STANDARD
            .decode(ciphertext)
            .map_err(|e| CoreError::encryption(format!("ciphertext is not base64: {e}")))?;
        let opened = self.manager.decrypt(&sealed)?;
        let salted = String::from_utf8(opened)
            .map_err(|_| CoreError::encryption("decrypted value is not UTF-8"))?;
        salted
            .strip_suffix(self.salt.as_str())
            .map(str::to_string)
            .ok_or_else(|| CoreError::encryption("salt mismatch"))
    }
}

impl std::fmt::Debug for TextCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextCipher")
            .field("manager", &self.manager)
            .field("salt", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cipher(salt: &str) -> TextCipher {
        TextCipher::new(&EncryptionKey::generate(), salt)
    }

    #[test]
    fn ciphertext_hides_plaintext() {
        let cipher = cipher("pepper");
        let sealed = cipher.encrypt("Ch@ng3_!+").unwrap();
        assert!(!sealed.contains("Ch@ng3"));
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "Ch@ng3_!+");
    }

    #[test]
    fn wrong_salt_is_detected() {
        let key = EncryptionKey::generate();
        let sealed = TextCipher::new(&key, "salt-one").encrypt("secret").unwrap();
        assert!(TextCipher::new(&key, "salt-two").decrypt(&sealed).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let cipher = cipher("pepper");
        assert!(cipher.decrypt("not base64 at all!").is_err());
        assert!(cipher.decrypt("AAAA").is_err());
    }

    #[test]
    fn generated_salt_uses_alphabet() {
        let salt = generate_salt(64);
        assert_eq!(salt.chars().count(), 64);
        assert!(salt.chars().all(|c| SALT_ALPHABET.contains(c)));
    }

    proptest! {
        #[test]
        fn printable_ascii_roundtrip(plain in "[ -~]{0,64}", salt in "[ -~]{0,32}") {
            let cipher = cipher(&salt);
            let sealed = cipher.encrypt(&plain).unwrap();
            prop_assert_eq!(cipher.decrypt(&sealed).unwrap(), plain);
        }
    }
}
