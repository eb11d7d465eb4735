//! Common key management
//!
//! The platform common key is read once from OTP; the derived (vWii) common
//! key is that key's decryption of a fixed ciphertext. Both are cached in a
//! [`KeyContext`] for as long as the context lives.

use log::{debug, info, warn};
use std::sync::OnceLock;

use super::backends::{KeyBank, KeySource};
use super::constants::AES_KEY_SIZE;
use super::crypto::{AesKey, aes_cbc_decrypt, sha1};
use super::defaults::{
    KOREAN_KEY_PROBE, KOREAN_KEY_PROBE_PLAIN, OTP_COMMON_KEY_OFFSET, SEEPROM_KOREAN_KEY_OFFSET,
    VWII_COMMON_KEY_ENC,
};
use crate::exceptions::{Result, TitleError};

/// The cached key pair
#[derive(Clone, PartialEq, Eq)]
pub struct CommonKeys {
    pub common: AesKey,
    pub vwii: AesKey,
}

impl std::fmt::Debug for CommonKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommonKeys")
            .field("common", &"<redacted>")
            .field("vwii", &"<redacted>")
            .finish()
    }
}

impl CommonKeys {
    /// Key selected by a ticket's common key index (0 = common, 2 = vWii)
    pub fn for_index(&self, index: u8) -> Option<&AesKey> {
        match index {
            0 => Some(&self.common),
            2 => Some(&self.vwii),
            _ => None,
        }
    }

    /// Short SHA-1 fingerprints, safe to print
    pub fn fingerprints(&self) -> (String, String) {
        (
            hex::encode(&sha1(&self.common)[..4]),
            hex::encode(&sha1(&self.vwii)[..4]),
        )
    }
}

/// Read the platform key and derive the vWii key from it
pub fn derive_common_keys(bank: &dyn KeyBank) -> Result<CommonKeys> {
    let mut common = [0u8; AES_KEY_SIZE];
    let read = bank.read_key(KeySource::Otp, OTP_COMMON_KEY_OFFSET, &mut common)?;
    if read != AES_KEY_SIZE {
        return Err(TitleError::Malformed(format!(
            "OTP returned {read} bytes of common key, expected {AES_KEY_SIZE}"
        )));
    }

    let mut vwii = VWII_COMMON_KEY_ENC;
    aes_cbc_decrypt(&common, &[0u8; 16], &mut vwii)?;

    Ok(CommonKeys { common, vwii })
}

/// Key bank plus the lazily derived common keys
pub struct KeyContext<K: KeyBank> {
    bank: K,
    keys: OnceLock<CommonKeys>,
}

impl<K: KeyBank> std::fmt::Debug for KeyContext<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyContext")
            .field("derived", &self.keys.get().is_some())
            .finish()
    }
}

impl<K: KeyBank> KeyContext<K> {
    pub fn new(bank: K) -> Self {
        KeyContext {
            bank,
            keys: OnceLock::new(),
        }
    }

    /// Common keys, derived on first call and cached afterwards
    pub fn common_keys(&self) -> Result<&CommonKeys> {
        if let Some(keys) = self.keys.get() {
            return Ok(keys);
        }

        let derived = derive_common_keys(&self.bank)?;
        info!("🔑 Common keys derived");
        Ok(self.keys.get_or_init(|| derived))
    }

    pub fn is_derived(&self) -> bool {
        self.keys.get().is_some()
    }

    /// Drop the cached keys so the next call derives them again
    pub fn reset(&mut self) {
        if self.keys.take().is_some() {
            debug!("Common key cache cleared");
        }
    }

    /// Whether the SEEPROM holds a working Korean common key
    pub fn has_korean_key(&self) -> bool {
        has_korean_key(&self.bank)
    }

    pub fn bank(&self) -> &K {
        &self.bank
    }
}

/// Decrypt the probe vector with the SEEPROM Korean key and compare it with
/// the expected plaintext. Any read failure counts as "no key".
pub fn has_korean_key(bank: &dyn KeyBank) -> bool {
    let mut key = [0u8; AES_KEY_SIZE];
    match bank.read_key(KeySource::Seeprom, SEEPROM_KOREAN_KEY_OFFSET, &mut key) {
        Ok(AES_KEY_SIZE) => {}
        Ok(read) => {
            debug!("Short Korean key read: {read} bytes");
            return false;
        }
        Err(e) => {
            warn!("⚠️ Korean key read failed: {e}");
            return false;
        }
    }

    probe_matches(&key, &KOREAN_KEY_PROBE)
}

fn probe_matches(key: &AesKey, probe: &[u8; 16]) -> bool {
    let mut plain = *probe;
    aes_cbc_decrypt(key, &[0u8; 16], &mut plain).is_ok() && &plain == KOREAN_KEY_PROBE_PLAIN
}
