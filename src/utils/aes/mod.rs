use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use rabe_bn::Gt;
use rand::Rng;
use crate::error::NacAbeError;
use crate::utils::hash::sha3_kdf;

/// Length of a content key in bytes.
pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Key Encapsulation Mechanism (Encryption Function): derives an AES-256 key
/// from a group element and seals the plaintext with it.
pub fn encrypt_symmetric(msg: &Gt, plaintext: &[u8]) -> Result<Vec<u8>, NacAbeError> {
    let key = sha3_kdf(msg.to_string().as_bytes(), "nacabe-kem");
    encrypt_aead(&key, plaintext, &[])
}

/// Key Encapsulation Mechanism (Decryption Function)
pub fn decrypt_symmetric(msg: &Gt, nonce_ct: &[u8]) -> Result<Vec<u8>, NacAbeError> {
    let key = sha3_kdf(msg.to_string().as_bytes(), "nacabe-kem");
    decrypt_aead(&key, nonce_ct, &[])
}

/// Draws a fresh random content key.
pub fn generate_key() -> [u8; KEY_LEN] {
    rand::thread_rng().gen()
}

/// AES-256-GCM with a random nonce; the output is `nonce || ciphertext || tag`.
pub fn encrypt_aead(key: &[u8; KEY_LEN], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, NacAbeError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce: [u8; NONCE_LEN] = rand::thread_rng().gen();
    let ct = cipher.encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })?;
    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok(out)
}

pub fn decrypt_aead(key: &[u8; KEY_LEN], nonce_ct: &[u8], aad: &[u8]) -> Result<Vec<u8>, NacAbeError> {
    if nonce_ct.len() < NONCE_LEN {
        return Err(NacAbeError::trust("ciphertext shorter than its nonce"));
    }
    let (nonce, ct) = nonce_ct.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    Ok(cipher.decrypt(Nonce::from_slice(nonce), Payload { msg: ct, aad })?)
}
