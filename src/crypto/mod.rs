use std::fmt;
use std::io;

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    Tag, XChaCha20Poly1305, XNonce,
};
use log::warn;
use sha2::Sha512;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::config;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encryption,
    #[error("key incorrect or message corrupted")]
    Authentication,
    #[error("failed to read password: {0}")]
    Prompt(#[from] io::Error),
}

/// A 32-byte symmetric key. Zeroed when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; config::KEY_SIZE]);

impl Key {
    pub fn from_bytes(bytes: [u8; config::KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// The well-known key selected by `--password default`. Provides no confidentiality.
    pub fn default_key() -> Self {
        Self(config::DEFAULT_KEY)
    }

    pub fn as_bytes(&self) -> &[u8; config::KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Where a password comes from when the user did not pass one inline.
pub trait SecretProvider {
    fn read_secret(&self, prompt: &str) -> io::Result<String>;
}

/// Reads the password from the controlling terminal without echoing it.
pub struct TerminalPrompt;

impl SecretProvider for TerminalPrompt {
    fn read_secret(&self, prompt: &str) -> io::Result<String> {
        rpassword::prompt_password(prompt)
    }
}

/// Hands out a fixed secret. Useful for tests and non-interactive callers.
pub struct StaticSecret(pub String);

impl SecretProvider for StaticSecret {
    fn read_secret(&self, _prompt: &str) -> io::Result<String> {
        Ok(self.0.clone())
    }
}

/// How the user asked for the key to be obtained.
///
/// A given password is wiped from memory when the value is dropped.
#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    /// Use [`config::DEFAULT_KEY`].
    Default,
    /// Derive from this password.
    Given(Zeroizing<String>),
    /// Ask a [`SecretProvider`] for the password, then derive.
    Prompt,
}

impl Password {
    /// Map the `--password [secret]` flag: absent or `default` selects the
    /// default key, present without a value prompts.
    pub fn from_arg(arg: Option<Option<String>>) -> Self {
        match arg {
            None => Password::Default,
            Some(None) => Password::Prompt,
            Some(Some(pw)) if pw == config::DEFAULT_PASSWORD => Password::Default,
            Some(Some(pw)) => Password::Given(Zeroizing::new(pw)),
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Password::Default => f.write_str("Default"),
            Password::Given(_) => f.write_str("Given(..)"),
            Password::Prompt => f.write_str("Prompt"),
        }
    }
}

/// Resolve a [`Password`] into a key, prompting through `provider` if needed.
pub fn resolve_key(password: &Password, provider: &dyn SecretProvider) -> Result<Key, CryptoError> {
    match password {
        Password::Default => {
            warn!("using the default key: the output is NOT confidential");
            Ok(Key::default_key())
        }
        Password::Given(pw) => Ok(derive_key(pw.as_bytes())),
        Password::Prompt => {
            let pw = Zeroizing::new(provider.read_secret("Enter password: ")?);
            Ok(derive_key(pw.as_bytes()))
        }
    }
}

/// Derive a 32-byte key from a password with PBKDF2-HMAC-SHA512 over the fixed salt.
pub fn derive_key(password: &[u8]) -> Key {
    let mut key = [0u8; config::KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha512>(password, config::SALT, config::KDF_ITERATIONS, &mut key);
    Key(key)
}

/// The nonce is the salt's first 24 bytes for every message.
///
/// Encoding two different files with the same password therefore reuses a
/// (key, nonce) pair, which leaks the XOR of their plaintexts. Use a distinct
/// password per file when that matters.
fn fixed_nonce() -> XNonce {
    XNonce::clone_from_slice(&config::SALT[..config::NONCE_SIZE])
}

/// Encrypt with XChaCha20-Poly1305. `aad` is authenticated but not encrypted.
/// Returns the detached tag and the ciphertext.
pub fn encrypt(
    key: &Key,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<([u8; config::TAG_SIZE], Vec<u8>), CryptoError> {
    let cipher = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key.as_bytes()));

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&fixed_nonce(), aad, &mut buffer)
        .map_err(|_| CryptoError::Encryption)?;

    let mut tag_bytes = [0u8; config::TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);
    Ok((tag_bytes, buffer))
}

/// Decrypt and verify. Fails with [`CryptoError::Authentication`] on a wrong key
/// or any modification of tag, ciphertext or `aad`.
pub fn decrypt(
    key: &Key,
    aad: &[u8],
    tag: &[u8; config::TAG_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key.as_bytes()));

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(&fixed_nonce(), aad, &mut buffer, Tag::from_slice(tag))
        .map_err(|_| CryptoError::Authentication)?;
    Ok(buffer)
}
