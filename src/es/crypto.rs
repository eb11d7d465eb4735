//! Digest and cipher primitives for signed content

use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha1::{Digest, Sha1};

use super::constants::{AES_KEY_SIZE, SHA1_SIZE};
use crate::exceptions::{Result, TitleError};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

const AES_BLOCK_SIZE: usize = 16;

/// 20-byte content/forging digest
pub type Sha1Hash = [u8; SHA1_SIZE];

/// 16-byte AES key
pub type AesKey = [u8; AES_KEY_SIZE];

/// SHA-1 over a byte slice
pub fn sha1(data: &[u8]) -> Sha1Hash {
    Sha1::digest(data).into()
}

/// AES-128-CBC decrypt `data` in place; length must be a block multiple
pub fn aes_cbc_decrypt(key: &AesKey, iv: &[u8; 16], data: &mut [u8]) -> Result<()> {
    let len = data.len();
    if len % AES_BLOCK_SIZE != 0 {
        return Err(TitleError::Malformed(format!(
            "{len} bytes is not a whole number of AES blocks"
        )));
    }
    let cipher = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|e| TitleError::Generic(format!("AES setup failed: {e}")))?;
    cipher
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| {
            TitleError::Malformed(format!("{len} bytes is not a whole number of AES blocks"))
        })?;
    Ok(())
}

/// AES-128-CBC encrypt `data` in place; length must be a block multiple
pub fn aes_cbc_encrypt(key: &AesKey, iv: &[u8; 16], data: &mut [u8]) -> Result<()> {
    let len = data.len();
    if len % AES_BLOCK_SIZE != 0 {
        return Err(TitleError::Malformed(format!(
            "{len} bytes is not a whole number of AES blocks"
        )));
    }
    let cipher = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|e| TitleError::Generic(format!("AES setup failed: {e}")))?;
    cipher
        .encrypt_padded_mut::<NoPadding>(data, len)
        .map_err(|_| {
            TitleError::Malformed(format!("{len} bytes is not a whole number of AES blocks"))
        })?;
    Ok(())
}
