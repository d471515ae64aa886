use rabe_bn::Fr;
use sha3::{
    Digest,
    Sha3_256
};
use crate::error::NacAbeError;
use std::ops::Mul;

/// Hash a &str to [`rabe_bn::G1`] or [`rabe_bn::G2`] using Base g
pub fn sha3_hash<T: Mul<Fr, Output = T>>(g: T, data: &str) -> Result<T, NacAbeError> {
    Ok(g * sha3_hash_fr(data)?)
}

/// Hash a &str to [`rabe_bn::Fr`]
pub fn sha3_hash_fr(data: &str) -> Result<Fr, NacAbeError> {
    let mut hasher = Sha3_256::new();
    hasher.update(data.as_bytes());
    match Fr::from_slice(&hasher.finalize()) {
        Ok(fr) => Ok(fr),
        Err(e) => Err(e.into())
    }
}

/// Derives a 256 bit symmetric key from arbitrary key material and a label
pub fn sha3_kdf(material: &[u8], label: &str) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(label.as_bytes());
    hasher.update(material);
    hasher.finalize().into()
}
