use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::NacAbeError;
use crate::ndn::Name;

/// A signature value plus the name of the identity that produced it.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct SignatureInfo {
    pub key_locator: Name,
    pub value: Vec<u8>,
}

/// A pull request for the Data packet named `name`.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Interest {
    pub name: Name,
    pub app_parameters: Option<Vec<u8>>,
    pub signature: Option<SignatureInfo>,
    /// Milliseconds since the epoch, set when the interest is signed. Strictly
    /// increasing per signer.
    pub timestamp: Option<u64>,
    pub nonce: Option<u64>,
    /// Falls back to the face's configured lifetime when unset.
    pub lifetime: Option<Duration>,
}

impl Interest {
    pub fn new(name: Name) -> Interest {
        Interest {
            name,
            app_parameters: None,
            signature: None,
            timestamp: None,
            nonce: None,
            lifetime: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<u8>) -> Interest {
        self.app_parameters = Some(parameters);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Interest {
        self.lifetime = Some(lifetime);
        self
    }

    /// Bytes covered by the signature: name, parameters, timestamp and nonce.
    pub fn signed_portion(&self) -> Result<Vec<u8>, NacAbeError> {
        Ok(serde_cbor::to_vec(&(
            "interest",
            &self.name,
            &self.app_parameters,
            self.timestamp,
            self.nonce,
        ))?)
    }
}

/// A named, signed payload answering an [`Interest`].
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Data {
    pub name: Name,
    pub content: Vec<u8>,
    pub signature: Option<SignatureInfo>,
}

impl Data {
    pub fn new(name: Name, content: Vec<u8>) -> Data {
        Data { name, content, signature: None }
    }

    pub fn signed_portion(&self) -> Result<Vec<u8>, NacAbeError> {
        Ok(serde_cbor::to_vec(&("data", &self.name, &self.content))?)
    }

    /// The key locator of the signature, if the packet is signed.
    pub fn signer(&self) -> Option<&Name> {
        self.signature.as_ref().map(|signature| &signature.key_locator)
    }
}
