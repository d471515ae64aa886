//! Fetches and decrypts content.
//!
//! A consumer keeps the authority's public parameters and its own attribute
//! key. `consume` fetches the ciphertext and the wrapped key concurrently,
//! unwraps the content key with the attribute key and opens the ciphertext.
use std::{collections::BTreeSet, sync::Arc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use crate::attribute_authority::{request_public_parameters, AuthorityReply, KeyRequest};
use crate::error::NacAbeError;
use crate::keys::{from_bytes, to_bytes, AttributeDecryptionKey, PublicParameters};
use crate::naming;
use crate::ndn::{cancellable, CancellationToken, Data, Face, Interest, Name};
use crate::schemes::bsw::{self, CpAbeCiphertext};
use crate::security::{Identity, SealedBox, TrustSchema};
use crate::token_issuer::AttributeGrantToken;
use crate::utils::aes::{decrypt_aead, KEY_LEN};
use crate::utils::policy::Policy;

pub struct Consumer {
    identity: Identity,
    face: Arc<dyn Face>,
    trust: Arc<dyn TrustSchema>,
    authority: Name,
    public_params: RwLock<Option<Arc<PublicParameters>>>,
    attribute_key: RwLock<Option<Arc<AttributeDecryptionKey>>>,
}

impl Consumer {
    /// `trust` has to hold the certificates of the authority, of any token
    /// issuer and of every producer this consumer reads from.
    pub fn new(identity: Identity, face: Arc<dyn Face>, authority: Name, trust: Arc<dyn TrustSchema>) -> Consumer {
        Consumer {
            identity,
            face,
            trust,
            authority,
            public_params: RwLock::new(None),
            attribute_key: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &Name {
        self.identity.name()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub async fn fetch_public_parameters(&self) -> Result<Arc<PublicParameters>, NacAbeError> {
        let params = Arc::new(
            request_public_parameters(self.face.as_ref(), self.trust.as_ref(), &self.authority).await?,
        );
        *self.public_params.write() = Some(params.clone());
        Ok(params)
    }

    pub fn public_parameters(&self) -> Option<Arc<PublicParameters>> {
        self.public_params.read().clone()
    }

    pub fn attribute_key(&self) -> Option<Arc<AttributeDecryptionKey>> {
        self.attribute_key.read().clone()
    }

    /// Requests this consumer's attribute key from the authority. The cached
    /// key is only replaced on success.
    pub async fn obtain_attributes(&self) -> Result<Arc<AttributeDecryptionKey>, NacAbeError> {
        self.request_attribute_key(None).await
    }

    /// Like [`obtain_attributes`](Self::obtain_attributes), redeeming `token` first.
    pub async fn obtain_attributes_with_token(
        &self,
        token: AttributeGrantToken,
    ) -> Result<Arc<AttributeDecryptionKey>, NacAbeError> {
        self.request_attribute_key(Some(token)).await
    }

    async fn request_attribute_key(
        &self,
        token: Option<AttributeGrantToken>,
    ) -> Result<Arc<AttributeDecryptionKey>, NacAbeError> {
        let request = KeyRequest {
            encryption_key: self.identity.certificate().encryption_key,
            token,
        };
        let name = naming::attribute_key_name(&self.authority, self.name());
        let interest = self
            .identity
            .sign_interest(Interest::new(name.clone()).with_parameters(to_bytes(&request)?))?;
        let data = self.face.express_interest(interest).await?;
        self.check_signer(&data, &self.authority)?;
        let reply: AuthorityReply<SealedBox> = from_bytes(&data.content)?;
        let sealed = reply.into_result()?;
        let key: AttributeDecryptionKey = from_bytes(&self.identity.open(&sealed, name.to_string().as_bytes())?)?;
        if key.subject != *self.name() {
            return Err(NacAbeError::trust(&format!("received the key of {}", key.subject)));
        }
        let key = Arc::new(key);
        *self.attribute_key.write() = Some(key.clone());
        info!(consumer = %self.name(), attributes = ?key.attributes, "cached attribute key");
        Ok(key)
    }

    /// Asks `issuer` for a token over `attributes`.
    pub async fn obtain_token(
        &self,
        issuer: &Name,
        attributes: &BTreeSet<String>,
    ) -> Result<AttributeGrantToken, NacAbeError> {
        if attributes.is_empty() {
            return Err(NacAbeError::encoding("token request without attributes"));
        }
        let name = naming::token_name(issuer, self.name(), attributes);
        let interest = self.identity.sign_interest(Interest::new(name))?;
        let data = self.face.express_interest(interest).await?;
        self.check_signer(&data, issuer)?;
        let reply: AuthorityReply<AttributeGrantToken> = from_bytes(&data.content)?;
        let token = reply.into_result()?;
        debug!(consumer = %self.name(), %issuer, attributes = ?token.attributes, "received token");
        Ok(token)
    }

    /// Fetches `<producer>/<content>` and its wrapped key and decrypts.
    ///
    /// Needs both the public parameters and an attribute key; without either
    /// the call fails with `NotReady` before anything is sent. BSW decryption
    /// itself only uses the attribute key.
    pub async fn consume(&self, producer: &Name, content: &Name) -> Result<Vec<u8>, NacAbeError> {
        if self.public_parameters().is_none() {
            return Err(NacAbeError::not_ready("public parameters not fetched"));
        }
        let key = self
            .attribute_key()
            .ok_or_else(|| NacAbeError::not_ready("no attribute key obtained"))?;
        let content_name = naming::content_name(producer, content);
        let key_name = naming::content_key_name(producer, content);
        let (ciphertext, wrapped) = tokio::join!(
            self.face.express_interest(Interest::new(content_name.clone())),
            self.face.express_interest(Interest::new(key_name)),
        );
        let (ciphertext, wrapped) = (ciphertext?, wrapped?);
        self.check_signer(&ciphertext, producer)?;
        self.check_signer(&wrapped, producer)?;

        let wrapped: CpAbeCiphertext = from_bytes(&wrapped.content)?;
        let content_key = bsw::decrypt(&key.key, &wrapped).map_err(|e| {
            match Policy::new(&wrapped.policy.0, wrapped.policy.1) {
                Ok(policy) if !policy.is_satisfied_by(&key.attributes) => NacAbeError::insufficient_attributes(
                    &format!("{:?} does not satisfy {}", key.attributes, policy),
                ),
                _ => e,
            }
        })?;
        let content_key: [u8; KEY_LEN] = content_key.as_slice().try_into()?;
        let plaintext = decrypt_aead(&content_key, &ciphertext.content, content_name.to_string().as_bytes())?;
        debug!(name = %content_name, bytes = plaintext.len(), "decrypted content");
        Ok(plaintext)
    }

    /// Callback form of [`consume`](Self::consume).
    pub async fn consume_with<S, F>(&self, producer: &Name, content: &Name, on_success: S, on_failure: F)
    where
        S: FnOnce(Vec<u8>),
        F: FnOnce(NacAbeError),
    {
        match self.consume(producer, content).await {
            Ok(plaintext) => on_success(plaintext),
            Err(e) => {
                warn!(producer = %producer, content = %content, "consume failed: {}", e);
                on_failure(e)
            }
        }
    }

    pub async fn consume_cancellable(
        &self,
        producer: &Name,
        content: &Name,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, NacAbeError> {
        cancellable(token, self.consume(producer, content)).await
    }

    fn check_signer(&self, data: &Data, expected: &Name) -> Result<(), NacAbeError> {
        let certificate = self.trust.verify_data(data)?;
        if certificate.identity != *expected {
            return Err(NacAbeError::trust(&format!(
                "{} signed by {} instead of {}",
                data.name, certificate.identity, expected
            )));
        }
        Ok(())
    }
}
