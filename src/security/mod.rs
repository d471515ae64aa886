//! Identities, certificates and the trust decisions made about them.
//!
//! Every identity holds an ed25519 signing key and an X25519 key that others
//! can encrypt to. A [`Certificate`] publishes both public halves under the
//! identity's name; a [`TrustSchema`] decides which certificates to believe.
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};
use chrono::Utc;
use curve25519_dalek::{montgomery::MontgomeryPoint, scalar::Scalar};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::RwLock;
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use crate::error::NacAbeError;
use crate::ndn::{Data, Interest, Name, SignatureInfo};
use crate::utils::aes::{decrypt_aead, encrypt_aead};
use crate::utils::hash::sha3_kdf;

const SEAL_LABEL: &str = "nacabe-seal";

/// Public half of an [`Identity`].
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Certificate {
    pub identity: Name,
    pub public_key: [u8; 32],
    pub encryption_key: [u8; 32],
}

impl Certificate {
    /// Checks that `signature` was made by this certificate's identity over `bytes`.
    pub fn verify(&self, bytes: &[u8], signature: &SignatureInfo) -> Result<(), NacAbeError> {
        if signature.key_locator != self.identity {
            return Err(NacAbeError::trust(&format!(
                "signed by {} but certificate names {}",
                signature.key_locator, self.identity
            )));
        }
        let key = VerifyingKey::from_bytes(&self.public_key)?;
        let value = Signature::from_slice(&signature.value)?;
        Ok(key.verify(bytes, &value)?)
    }
}

/// A payload only the holder of one X25519 secret can open.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct SealedBox {
    pub ephemeral_key: [u8; 32],
    pub ciphertext: Vec<u8>,
}

/// Encrypts `plaintext` to the encryption key of `recipient`. `context` is
/// bound as associated data and must be repeated to open the box.
pub fn seal_to(recipient: &Certificate, plaintext: &[u8], context: &[u8]) -> Result<SealedBox, NacAbeError> {
    let ephemeral_scalar = Scalar::from_bytes_mod_order(rand::thread_rng().gen());
    let ephemeral_public = MontgomeryPoint::mul_base(&ephemeral_scalar);
    let shared_secret = ephemeral_scalar * MontgomeryPoint(recipient.encryption_key);
    let key = derive_seal_key(shared_secret.as_bytes(), ephemeral_public.as_bytes(), &recipient.encryption_key);
    Ok(SealedBox {
        ephemeral_key: *ephemeral_public.as_bytes(),
        ciphertext: encrypt_aead(&key, plaintext, context)?,
    })
}

fn derive_seal_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> [u8; 32] {
    let mut material = Vec::with_capacity(96);
    material.extend_from_slice(shared);
    material.extend_from_slice(ephemeral);
    material.extend_from_slice(recipient);
    sha3_kdf(&material, SEAL_LABEL)
}

/// A named key pair owned by one party.
pub struct Identity {
    name: Name,
    signing_key: SigningKey,
    encryption_secret: [u8; 32],
    last_timestamp: AtomicU64,
}

impl Identity {
    pub fn generate(name: Name) -> Identity {
        Identity {
            name,
            signing_key: SigningKey::generate(&mut OsRng),
            encryption_secret: rand::thread_rng().gen(),
            last_timestamp: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    fn encryption_scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(self.encryption_secret)
    }

    pub fn certificate(&self) -> Certificate {
        Certificate {
            identity: self.name.clone(),
            public_key: self.signing_key.verifying_key().to_bytes(),
            encryption_key: *MontgomeryPoint::mul_base(&self.encryption_scalar()).as_bytes(),
        }
    }

    pub fn sign(&self, bytes: &[u8]) -> SignatureInfo {
        SignatureInfo {
            key_locator: self.name.clone(),
            value: self.signing_key.sign(bytes).to_bytes().to_vec(),
        }
    }

    /// Stamps `interest` with a fresh timestamp and nonce and signs it.
    pub fn sign_interest(&self, mut interest: Interest) -> Result<Interest, NacAbeError> {
        interest.timestamp = Some(self.next_timestamp());
        interest.nonce = Some(rand::thread_rng().gen());
        interest.signature = Some(self.sign(&interest.signed_portion()?));
        Ok(interest)
    }

    /// The current time in milliseconds, bumped past the last one handed out.
    fn next_timestamp(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let previous = self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    pub fn sign_data(&self, mut data: Data) -> Result<Data, NacAbeError> {
        data.signature = Some(self.sign(&data.signed_portion()?));
        Ok(data)
    }

    /// Opens a box sealed to this identity's certificate.
    pub fn open(&self, sealed: &SealedBox, context: &[u8]) -> Result<Vec<u8>, NacAbeError> {
        let our_scalar = self.encryption_scalar();
        let shared_secret = our_scalar * MontgomeryPoint(sealed.ephemeral_key);
        let our_public = MontgomeryPoint::mul_base(&our_scalar);
        let key = derive_seal_key(shared_secret.as_bytes(), &sealed.ephemeral_key, our_public.as_bytes());
        decrypt_aead(&key, &sealed.ciphertext, context)
    }
}

/// Decides which certificate speaks for which name.
pub trait TrustSchema: Send + Sync {
    /// The certificate this schema holds for `signer`, if any.
    fn lookup(&self, signer: &Name) -> Option<Certificate>;

    /// Whether `certificate` may sign for `signer`.
    fn verify(&self, certificate: &Certificate, signer: &Name) -> bool;

    /// Finds and checks the certificate for the signer of `bytes`.
    fn verify_signature(&self, bytes: &[u8], signature: &SignatureInfo) -> Result<Certificate, NacAbeError> {
        let signer = &signature.key_locator;
        let certificate = self
            .lookup(signer)
            .ok_or_else(|| NacAbeError::trust(&format!("no certificate for {}", signer)))?;
        if !self.verify(&certificate, signer) {
            return Err(NacAbeError::trust(&format!("certificate of {} is not trusted", signer)));
        }
        certificate.verify(bytes, signature)?;
        Ok(certificate)
    }

    fn verify_interest(&self, interest: &Interest) -> Result<Certificate, NacAbeError> {
        match &interest.signature {
            Some(signature) => self.verify_signature(&interest.signed_portion()?, signature),
            None => Err(NacAbeError::trust(&format!("{} is not signed", interest.name))),
        }
    }

    fn verify_data(&self, data: &Data) -> Result<Certificate, NacAbeError> {
        match &data.signature {
            Some(signature) => self.verify_signature(&data.signed_portion()?, signature),
            None => Err(NacAbeError::trust(&format!("{} is not signed", data.name))),
        }
    }
}

/// A table of trust anchors: exactly the certificates added are trusted.
#[derive(Default)]
pub struct TrustConfig {
    anchors: RwLock<HashMap<Name, Certificate>>,
}

impl TrustConfig {
    pub fn new() -> TrustConfig {
        TrustConfig::default()
    }

    pub fn add_certificate(&self, certificate: Certificate) {
        self.anchors.write().insert(certificate.identity.clone(), certificate);
    }

    pub fn remove_certificate(&self, identity: &Name) -> Option<Certificate> {
        self.anchors.write().remove(identity)
    }

    pub fn contains(&self, identity: &Name) -> bool {
        self.anchors.read().contains_key(identity)
    }
}

impl TrustSchema for TrustConfig {
    fn lookup(&self, signer: &Name) -> Option<Certificate> {
        self.anchors.read().get(signer).cloned()
    }

    fn verify(&self, certificate: &Certificate, signer: &Name) -> bool {
        certificate.identity == *signer
            && self.anchors.read().get(signer).map_or(false, |anchor| anchor == certificate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn identity(name: &str) -> Identity {
        Identity::generate(name.parse().unwrap())
    }

    #[test]
    fn signed_interest_verifies_against_anchor() {
        let alice = identity("/alice");
        let trust = TrustConfig::new();
        let interest = alice.sign_interest(Interest::new("/aa/ATTRKEY/alice".parse().unwrap())).unwrap();
        assert_eq!(trust.verify_interest(&interest).unwrap_err().kind(), ErrorKind::TrustFailure);
        trust.add_certificate(alice.certificate());
        assert_eq!(trust.verify_interest(&interest).unwrap(), alice.certificate());
    }

    #[test]
    fn signed_interests_get_increasing_timestamps() {
        let alice = identity("/alice");
        let trust = TrustConfig::new();
        trust.add_certificate(alice.certificate());
        let first = alice.sign_interest(Interest::new("/p/POLICY/x".parse().unwrap())).unwrap();
        let second = alice.sign_interest(Interest::new("/p/POLICY/x".parse().unwrap())).unwrap();
        assert!(second.timestamp.unwrap() > first.timestamp.unwrap());
        assert!(trust.verify_interest(&second).is_ok());

        let mut moved = first.clone();
        moved.timestamp = second.timestamp;
        assert_eq!(trust.verify_interest(&moved).unwrap_err().kind(), ErrorKind::TrustFailure);
    }

    #[test]
    fn tampered_data_is_rejected() {
        let producer = identity("/producer");
        let trust = TrustConfig::new();
        trust.add_certificate(producer.certificate());
        let mut data = producer.sign_data(Data::new("/producer/x".parse().unwrap(), vec![1])).unwrap();
        assert!(trust.verify_data(&data).is_ok());
        data.content = vec![2];
        assert_eq!(trust.verify_data(&data).unwrap_err().kind(), ErrorKind::TrustFailure);
    }

    #[test]
    fn impostor_key_is_rejected() {
        let real = identity("/alice");
        let impostor = identity("/alice");
        let trust = TrustConfig::new();
        trust.add_certificate(real.certificate());
        let interest = impostor.sign_interest(Interest::new("/x".parse().unwrap())).unwrap();
        assert!(trust.verify_interest(&interest).is_err());
        assert!(!trust.verify(&impostor.certificate(), impostor.name()));
    }

    #[test]
    fn sealed_box_opens_only_for_recipient() {
        let alice = identity("/alice");
        let eve = identity("/eve");
        let sealed = seal_to(&alice.certificate(), b"attribute key", b"/aa/ATTRKEY/alice").unwrap();
        assert_eq!(alice.open(&sealed, b"/aa/ATTRKEY/alice").unwrap(), b"attribute key");
        assert!(eve.open(&sealed, b"/aa/ATTRKEY/alice").is_err());
        assert!(alice.open(&sealed, b"/aa/ATTRKEY/eve").is_err());
    }
}
