//! The key material the roles exchange, wrapping the BSW scheme types.
use std::collections::BTreeSet;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use crate::error::NacAbeError;
use crate::ndn::Name;
use crate::schemes::bsw::{self, CpAbeMasterKey, CpAbePublicKey, CpAbeSecretKey};

/// CBOR encoding used for everything that crosses the wire or hits a file.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, NacAbeError> {
    Ok(serde_cbor::to_vec(value)?)
}

pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, NacAbeError> {
    Ok(serde_cbor::from_slice(bytes)?)
}

/// Public parameters of one attribute authority.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct PublicParameters {
    pub key: CpAbePublicKey,
}

/// Master secret of one attribute authority. Never sent over the network.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct MasterSecret {
    pub key: CpAbeMasterKey,
}

/// A CP-ABE decryption key bound to one subject and exactly one attribute set.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct AttributeDecryptionKey {
    pub subject: Name,
    pub attributes: BTreeSet<String>,
    pub key: CpAbeSecretKey,
}

pub fn setup() -> (PublicParameters, MasterSecret) {
    let (pk, msk) = bsw::setup();
    (PublicParameters { key: pk }, MasterSecret { key: msk })
}

impl MasterSecret {
    /// Derives a fresh key for `subject`; every call draws new randomness.
    pub fn derive_key(
        &self,
        params: &PublicParameters,
        subject: &Name,
        attributes: &BTreeSet<String>,
    ) -> Result<AttributeDecryptionKey, NacAbeError> {
        let list: Vec<String> = attributes.iter().cloned().collect();
        Ok(AttributeDecryptionKey {
            subject: subject.clone(),
            attributes: attributes.clone(),
            key: bsw::keygen(&params.key, &self.key, &list)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::policy::pest::PolicyLanguage;

    #[test]
    fn derived_keys_are_fresh_and_bound() {
        let (params, master) = setup();
        let subject: Name = "/consumer1".parse().unwrap();
        let attributes: BTreeSet<String> = ["attr1", "attr3"].iter().map(|a| a.to_string()).collect();
        let first = master.derive_key(&params, &subject, &attributes).unwrap();
        let second = master.derive_key(&params, &subject, &attributes).unwrap();
        assert_ne!(first.key, second.key);
        assert_eq!(first.key.attributes(), attributes);

        let ct = bsw::encrypt(&params.key, "attr1 and attr3", PolicyLanguage::HumanPolicy, b"k").unwrap();
        assert_eq!(bsw::decrypt(&second.key, &ct).unwrap(), b"k");
    }

    #[test]
    fn public_parameters_survive_cbor() {
        let (params, _) = setup();
        let back: PublicParameters = from_bytes(&to_bytes(&params).unwrap()).unwrap();
        assert_eq!(params, back);
        assert!(from_bytes::<PublicParameters>(b"garbage").is_err());
    }
}
