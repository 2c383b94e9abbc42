//! Encryption at rest for password columns.
//!
//! ## Security Model
//!
//! - Uses AES-256-GCM for authenticated encryption
//! - Unique nonce per encryption operation
//! - Keys are zeroized on drop
//! - A secret that is not a raw 32-byte key is stretched with HKDF-SHA256
//!
//! Password columns are encrypted, not hashed: anyone holding the secret
//! and salt from the settings row can recover the plaintext.
//!
//! ## Usage
//!
//! ```rust
//! use paperdb_core::crypto::{EncryptionKey, TextCipher};
//!
//! let secret = EncryptionKey::generate().to_secret();
//! let cipher = TextCipher::from_secret(&secret, "pepper").unwrap();
//!
//! let stored = cipher.encrypt("hunter2").unwrap();
//! assert_eq!(cipher.decrypt(&stored).unwrap(), "hunter2");
//! ```

mod key;
mod text;

pub use key::{CryptoManager, EncryptionKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use text::{generate_salt, TextCipher, SALT_ALPHABET};
