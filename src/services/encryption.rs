use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{ProvisionError, Result};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Parses the 64-hex-char master key.
pub fn parse_master_key(hex_key: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| ProvisionError::Secret(format!("master key is not hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| ProvisionError::Secret("master key must be exactly 32 bytes".into()))
}

/// Derives the key used for one secret scope from the master key.
pub fn derive_scope_key(master_key: &[u8; 32], scope: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, master_key);
    let info = format!("tenant-provisioner-scope-{scope}");
    let mut scope_key = [0u8; 32];
    hk.expand(info.as_bytes(), &mut scope_key)
        .map_err(|_| ProvisionError::Secret("failed to derive scope key".into()))?;
    Ok(scope_key)
}

/// Encrypts with AES-256-GCM, returning `(ciphertext, iv, tag)`.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ProvisionError::Secret(format!("failed to create cipher: {e}")))?;

    let mut iv = vec![0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    // aes-gcm appends the tag to the ciphertext
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| ProvisionError::Secret(format!("encryption failed: {e}")))?;
    let tag = sealed.split_off(sealed.len().saturating_sub(TAG_LEN));

    Ok((sealed, iv, tag))
}

pub fn decrypt(ciphertext: &[u8], iv: &[u8], tag: &[u8], key: &[u8; 32]) -> Result<Vec<u8>> {
    if iv.len() != IV_LEN {
        return Err(ProvisionError::Secret(format!("IV must be exactly {IV_LEN} bytes")));
    }
    if tag.len() != TAG_LEN {
        return Err(ProvisionError::Secret(format!(
            "authentication tag must be exactly {TAG_LEN} bytes"
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ProvisionError::Secret(format!("failed to create cipher: {e}")))?;

    let mut combined = ciphertext.to_vec();
    combined.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(iv), combined.as_ref())
        .map_err(|e| ProvisionError::Secret(format!("decryption failed: {e}")))
}
