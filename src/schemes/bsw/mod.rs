//! This is the documentation for the `BSW` scheme:
//!
//! * Developped by John Bethencourt, Amit Sahai, Brent Waters, "Ciphertext-Policy Attribute-Based Encryption"
//! * Published in Security and Privacy, 2007. SP'07. IEEE Symposium on. IEEE
//! * Available from <https://doi.org/10.1109/SP.2007.11>
//! * Type: encryption (attribute-based)
//! * Setting: bilinear groups (asymmetric)
//!
//! This is the ABE primitive the access-control roles treat as opaque: they
//! only ever call [`setup`], [`keygen`], [`encrypt`] and [`decrypt`].
//!
//! # Examples
//!
//! ```
//! use nacabe::schemes::bsw::*;
//! use nacabe::utils::policy::pest::PolicyLanguage;
//! let (pk, msk) = setup();
//! let plaintext = String::from("our plaintext!").into_bytes();
//! let policy = String::from(r#"A and B"#);
//! let ct: CpAbeCiphertext = encrypt(&pk, &policy, PolicyLanguage::HumanPolicy, &plaintext).unwrap();
//! let sk: CpAbeSecretKey = keygen(&pk, &msk, &vec!["A".to_string(), "B".to_string()]).unwrap();
//! assert_eq!(decrypt(&sk, &ct).unwrap(), plaintext);
//! ```
use std::collections::BTreeSet;
use rabe_bn::{pairing, Fr, Gt, G1, G2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::error::NacAbeError;
use crate::utils::{
    aes::{decrypt_symmetric, encrypt_symmetric},
    hash::sha3_hash,
    policy::pest::{parse, PolicyLanguage, PolicyValue},
    secretsharing::{calc_pruned, gen_shares_policy},
};

/// A BSW Public Key (PK)
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct CpAbePublicKey {
    pub g1: G1,
    pub g2: G2,
    pub h: G1,
    pub f: G2,
    pub e_gg_alpha: Gt,
}

/// A BSW Master Key (MSK)
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct CpAbeMasterKey {
    pub beta: Fr,
    pub g2_alpha: G2,
}

/// A per-attribute component of keys and ciphertexts
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct CpAbeAttribute {
    pub str: String,
    pub g1: G1,
    pub g2: G2,
}

/// A BSW Secret User Key (SK)
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct CpAbeSecretKey {
    pub d: G2,
    pub d_j: Vec<CpAbeAttribute>,
}

impl CpAbeSecretKey {
    pub fn attributes(&self) -> BTreeSet<String> {
        self.d_j.iter().map(|attribute| attribute.str.clone()).collect()
    }
}

/// A BSW Ciphertext (CT); `c_y` holds one entry per policy leaf
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct CpAbeCiphertext {
    pub policy: (String, PolicyLanguage),
    pub c: G1,
    pub c_p: Gt,
    pub c_y: Vec<CpAbeAttribute>,
    pub ct: Vec<u8>,
}

/// The setup algorithm of BSW CP-ABE. Generates a new CpAbePublicKey and a new CpAbeMasterKey.
pub fn setup() -> (CpAbePublicKey, CpAbeMasterKey) {
    // random number generator
    let mut rng = rand::thread_rng();
    // generator of group G1: g1 and generator of group G2: g2
    let g1: G1 = rng.gen();
    let g2: G2 = rng.gen();
    // random beta with an inverse, and alpha
    let (beta, beta_inv) = loop {
        let candidate: Fr = rng.gen();
        if let Some(inverse) = candidate.inverse() {
            break (candidate, inverse);
        }
    };
    let alpha: Fr = rng.gen();
    // calculate h and f
    let h = g1 * beta;
    let f = g2 * beta_inv;
    // calculate the pairing between g1 and g2^alpha
    let g2_alpha = g2 * alpha;
    let e_gg_alpha = pairing(g1, g2_alpha);
    (
        CpAbePublicKey { g1, g2, h, f, e_gg_alpha },
        CpAbeMasterKey { beta, g2_alpha },
    )
}

/// The key generation algorithm of BSW CP-ABE.
///
/// # Arguments
///
///	* `pk` - A Public Key (PK), generated by the function setup()
///	* `msk` - A Master Key (MSK), generated by the function setup()
///	* `attributes` - A set of attributes bound to the new key
///
pub fn keygen(
    pk: &CpAbePublicKey,
    msk: &CpAbeMasterKey,
    attributes: &[String],
) -> Result<CpAbeSecretKey, NacAbeError> {
    if attributes.is_empty() {
        return Err(NacAbeError::encoding("empty attributes!"));
    }
    let beta_inv = msk
        .beta
        .inverse()
        .ok_or_else(|| NacAbeError::encoding("master key has no inverse"))?;
    // random number generator
    let mut rng = rand::thread_rng();
    let r: Fr = rng.gen();
    let g_r = pk.g2 * r;
    let d = (msk.g2_alpha + g_r) * beta_inv;
    let mut d_j: Vec<CpAbeAttribute> = Vec::new();
    for j in attributes {
        let r_j: Fr = rng.gen();
        d_j.push(CpAbeAttribute {
            str: j.clone(),
            g1: pk.g1 * r_j,
            g2: g_r + (sha3_hash(pk.g2, j)? * r_j),
        });
    }
    Ok(CpAbeSecretKey { d, d_j })
}

/// The encrypt algorithm of BSW CP-ABE.
///
/// # Arguments
///
///	* `pk` - A Public Key (PK), generated by the function setup()
///	* `policy` - An access policy given as String
///	* `language` - The policy language the policy is written in
///	* `plaintext` - plaintext data given as a Vector of u8
///
pub fn encrypt(
    pk: &CpAbePublicKey,
    policy: &str,
    language: PolicyLanguage,
    plaintext: &[u8],
) -> Result<CpAbeCiphertext, NacAbeError> {
    if plaintext.is_empty() {
        return Err(NacAbeError::encoding("plaintext empty"));
    }
    let parsed: PolicyValue = parse(policy, language)?;
    let mut rng = rand::thread_rng();
    // the shared root secret
    let s: Fr = rng.gen();
    let msg: Gt = rng.gen();
    let shares = gen_shares_policy(s, &parsed)?;
    let c = pk.h * s;
    let c_p = pk.e_gg_alpha.pow(s) * msg;
    let mut c_y: Vec<CpAbeAttribute> = Vec::new();
    for (j, j_val) in shares {
        let hashed = sha3_hash(pk.g2, &j)?;
        c_y.push(CpAbeAttribute {
            str: j,
            g1: pk.g1 * j_val,
            g2: hashed * j_val,
        });
    }
    //Encrypt plaintext using derived key from secret
    Ok(CpAbeCiphertext {
        policy: (policy.to_string(), language),
        c,
        c_p,
        c_y,
        ct: encrypt_symmetric(&msg, plaintext)?,
    })
}

/// The decrypt algorithm of BSW CP-ABE. Fails with
/// [`ErrorKind::InsufficientAttributes`](crate::error::ErrorKind) whenever the
/// key cannot open the ciphertext.
///
/// # Arguments
///
///	* `sk` - A Secret Key (SK), generated by the function keygen()
///	* `ct` - A BSW CP-ABE Ciphertext
///
pub fn decrypt(sk: &CpAbeSecretKey, ct: &CpAbeCiphertext) -> Result<Vec<u8>, NacAbeError> {
    let policy = parse(ct.policy.0.as_ref(), ct.policy.1)?;
    let pruned = match calc_pruned(&sk.attributes(), &policy)? {
        Some(pruned) => pruned,
        None => {
            return Err(NacAbeError::insufficient_attributes(
                "attributes in sk do not match policy in ct.",
            ))
        }
    };
    let mut a = Gt::one();
    for (leaf, coefficient) in pruned {
        let c_j = ct
            .c_y
            .get(leaf)
            .ok_or_else(|| NacAbeError::insufficient_attributes("ciphertext is missing a policy leaf"))?;
        let d_j = sk
            .d_j
            .iter()
            .find(|attribute| attribute.str == c_j.str)
            .ok_or_else(|| NacAbeError::insufficient_attributes("ciphertext leaf does not match policy"))?;
        a = a * (pairing(c_j.g1, d_j.g2) * pairing(d_j.g1, c_j.g2).inverse()).pow(coefficient);
    }
    let msg = ct.c_p * (pairing(ct.c, sk.d) * a.inverse()).inverse();
    // Decrypt plaintext using derived secret from cp-abe scheme
    decrypt_symmetric(&msg, &ct.ct)
        .map_err(|_| NacAbeError::insufficient_attributes("could not open the key encapsulation"))
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::error::ErrorKind;

    fn attrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_or() {
        // setup scheme
        let (pk, msk) = setup();
        // our plaintext
        let plaintext = String::from("dance like no one's watching, encrypt like everyone is!")
            .into_bytes();
        // our policy
        let policy = String::from(r#"{"name": "or", "children": [{"name": "A"}, {"name": "B"}]}"#);
        // cp-abe ciphertext
        let ct_cp: CpAbeCiphertext = encrypt(&pk, &policy, PolicyLanguage::JsonPolicy, &plaintext).unwrap();
        // and now decrypt again with matching sk
        let matching = decrypt(&keygen(&pk, &msk, &attrs(&["D", "B"])).unwrap(), &ct_cp);
        assert_eq!(matching.unwrap(), plaintext);
        let no_match = decrypt(&keygen(&pk, &msk, &attrs(&["C", "D"])).unwrap(), &ct_cp);
        assert_eq!(no_match.unwrap_err().kind(), ErrorKind::InsufficientAttributes);
    }

    #[test]
    fn test_and() {
        let (pk, msk) = setup();
        let plaintext = String::from("dance like no one's watching, encrypt like everyone is!")
            .into_bytes();
        let policy = String::from(r#"A and B"#);
        let ct_cp = encrypt(&pk, &policy, PolicyLanguage::HumanPolicy, &plaintext).unwrap();
        let matching = decrypt(&keygen(&pk, &msk, &attrs(&["A", "B", "C"])).unwrap(), &ct_cp);
        assert_eq!(matching.unwrap(), plaintext);
        let no_match = decrypt(&keygen(&pk, &msk, &attrs(&["A", "D"])).unwrap(), &ct_cp);
        assert!(no_match.is_err());
    }

    #[test]
    fn test_or_and() {
        let (pk, msk) = setup();
        let plaintext = String::from("dance like no one's watching, encrypt like everyone is!")
            .into_bytes();
        let policy = String::from(r#"(A and B) or (C and D)"#);
        let ct_cp = encrypt(&pk, &policy, PolicyLanguage::HumanPolicy, &plaintext).unwrap();
        let matching = decrypt(&keygen(&pk, &msk, &attrs(&["C", "D"])).unwrap(), &ct_cp);
        assert_eq!(matching.unwrap(), plaintext);
        let no_match = decrypt(&keygen(&pk, &msk, &attrs(&["A", "C"])).unwrap(), &ct_cp);
        assert!(no_match.is_err());
    }

    #[test]
    fn test_single_attribute() {
        let (pk, msk) = setup();
        let ct_cp = encrypt(&pk, "A", PolicyLanguage::HumanPolicy, b"x").unwrap();
        assert_eq!(decrypt(&keygen(&pk, &msk, &attrs(&["A"])).unwrap(), &ct_cp).unwrap(), b"x");
    }

    #[test]
    fn test_keys_do_not_combine() {
        // two users holding A and B separately cannot pool their components
        let (pk, msk) = setup();
        let ct_cp = encrypt(&pk, "A and B", PolicyLanguage::HumanPolicy, b"secret").unwrap();
        let sk_a = keygen(&pk, &msk, &attrs(&["A"])).unwrap();
        let sk_b = keygen(&pk, &msk, &attrs(&["B"])).unwrap();
        let mut pooled = sk_a.clone();
        pooled.d_j.extend(sk_b.d_j.clone());
        assert!(decrypt(&pooled, &ct_cp).is_err());
    }

    #[test]
    fn test_rejects_negation_and_empty() {
        let (pk, msk) = setup();
        let err = encrypt(&pk, "A and not B", PolicyLanguage::HumanPolicy, b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPolicy);
        assert!(keygen(&pk, &msk, &[]).is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let (pk, _msk) = setup();
        let bytes = serde_cbor::to_vec(&pk).unwrap();
        let back: CpAbePublicKey = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(pk, back);
    }
}
