//! Publishes content under attribute policies.
//!
//! Every publication draws a fresh content key, encrypts the payload with it
//! to `<producer>/<content>` and wraps the key under the policy to
//! `<producer>/<content>/CK`. Both packets are served for exact-name requests
//! until the producer is dropped.
use std::{collections::HashMap, sync::Arc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use crate::attribute_authority::request_public_parameters;
use crate::error::NacAbeError;
use crate::keys::{to_bytes, PublicParameters};
use crate::naming::{self, CONTENT_KEY, POLICY, POLICY_ACCEPTED};
use crate::ndn::{serve, CancellationToken, Data, Face, Interest, Name};
use crate::schemes::bsw;
use crate::security::{Certificate, Identity, TrustSchema};
use crate::utils::aes::{encrypt_aead, generate_key};
use crate::utils::policy::{pest::PolicyLanguage, Policy};

struct ProducerState {
    identity: Identity,
    owners: Arc<dyn TrustSchema>,
    policies: RwLock<HashMap<Name, Policy>>,
    /// Timestamp of the newest push accepted per data owner.
    last_push: Mutex<HashMap<Name, u64>>,
    store: DashMap<Name, Data>,
}

impl ProducerState {
    fn handle(&self, interest: &Interest) -> Option<Data> {
        if let Some(data) = self.store.get(&interest.name) {
            return Some(data.clone());
        }
        let suffix = interest.name.strip_prefix(self.identity.name())?;
        if suffix.get(0) != Some(POLICY) {
            return None;
        }
        let answer = match self.on_policy_push(interest) {
            Ok(()) => POLICY_ACCEPTED.to_string(),
            Err(e) => {
                warn!(name = %interest.name, "rejected policy push: {}", e);
                e.to_string()
            }
        };
        match self.identity.sign_data(Data::new(interest.name.clone(), answer.into_bytes())) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(name = %interest.name, "could not answer: {}", e);
                None
            }
        }
    }

    fn on_policy_push(&self, interest: &Interest) -> Result<(), NacAbeError> {
        let owner = self.owners.verify_interest(interest)?;
        self.check_fresh(&owner.identity, interest)?;
        let content = interest
            .name
            .strip_prefix(&self.identity.name().append(POLICY))
            .unwrap_or_default();
        if content.is_empty() {
            return Err(NacAbeError::malformed_policy("policy push names no content"));
        }
        let parameters = interest
            .app_parameters
            .as_deref()
            .ok_or_else(|| NacAbeError::malformed_policy("policy push without a policy"))?;
        let text = std::str::from_utf8(parameters)
            .map_err(|_| NacAbeError::malformed_policy("policy is not valid UTF-8"))?;
        let policy = Policy::new(text, PolicyLanguage::HumanPolicy)?;
        policy.validate_for_encryption()?;
        info!(owner = %owner.identity, %content, %policy, "policy set");
        self.policies.write().insert(content, policy);
        Ok(())
    }

    /// Rejects pushes that are not newer than the last one seen from `owner`.
    fn check_fresh(&self, owner: &Name, interest: &Interest) -> Result<(), NacAbeError> {
        let timestamp = interest
            .timestamp
            .ok_or_else(|| NacAbeError::trust("policy push carries no timestamp"))?;
        let mut last_push = self.last_push.lock();
        match last_push.get(owner) {
            Some(&last) if timestamp <= last => Err(NacAbeError::trust(&format!(
                "replayed policy push from {} ({} <= {})",
                owner, timestamp, last
            ))),
            _ => {
                last_push.insert(owner.clone(), timestamp);
                Ok(())
            }
        }
    }
}

/// A running producer. Stops serving when dropped.
pub struct Producer {
    state: Arc<ProducerState>,
    face: Arc<dyn Face>,
    trust: Arc<dyn TrustSchema>,
    authority: Name,
    public_params: RwLock<Option<Arc<PublicParameters>>>,
    shutdown: CancellationToken,
}

impl Producer {
    /// Starts serving below the identity's name. `trust` has to hold the
    /// authority's certificate, `owners` the data owners allowed to set
    /// policies. Must be called inside a tokio runtime.
    pub fn new(
        identity: Identity,
        face: Arc<dyn Face>,
        authority: Name,
        trust: Arc<dyn TrustSchema>,
        owners: Arc<dyn TrustSchema>,
    ) -> Result<Producer, NacAbeError> {
        let receiver = face.register_prefix(identity.name())?;
        info!(producer = %identity.name(), %authority, "producer ready");
        let state = Arc::new(ProducerState {
            identity,
            owners,
            policies: RwLock::new(HashMap::new()),
            last_push: Mutex::new(HashMap::new()),
            store: DashMap::new(),
        });
        let shutdown = CancellationToken::new();
        let handler_state = state.clone();
        serve(receiver, shutdown.clone(), move |interest| handler_state.handle(interest));
        Ok(Producer {
            state,
            face,
            trust,
            authority,
            public_params: RwLock::new(None),
            shutdown,
        })
    }

    pub fn name(&self) -> &Name {
        self.state.identity.name()
    }

    pub fn certificate(&self) -> Certificate {
        self.state.identity.certificate()
    }

    /// Fetches the authority's public parameters and caches them.
    pub async fn fetch_public_parameters(&self) -> Result<Arc<PublicParameters>, NacAbeError> {
        let params = Arc::new(
            request_public_parameters(self.face.as_ref(), self.trust.as_ref(), &self.authority).await?,
        );
        *self.public_params.write() = Some(params.clone());
        debug!(producer = %self.name(), "cached public parameters");
        Ok(params)
    }

    pub fn public_parameters(&self) -> Option<Arc<PublicParameters>> {
        self.public_params.read().clone()
    }

    /// The policy last pushed for `content`.
    pub fn policy_for(&self, content: &Name) -> Option<Policy> {
        self.state.policies.read().get(content).cloned()
    }

    /// Handles one policy push without going through the face.
    pub fn on_policy_push(&self, interest: &Interest) -> Result<(), NacAbeError> {
        self.state.on_policy_push(interest)
    }

    /// Encrypts `plaintext` under `policy` and publishes the ciphertext and
    /// the wrapped key. Returns both packets, ciphertext first.
    pub fn produce(&self, content: &Name, policy: &str, plaintext: &[u8]) -> Result<(Data, Data), NacAbeError> {
        let policy = Policy::new(policy, PolicyLanguage::HumanPolicy)?;
        self.publish(content, &policy, plaintext)
    }

    /// Like [`produce`](Self::produce) with the policy a data owner pushed for `content`.
    pub fn produce_with_cached_policy(&self, content: &Name, plaintext: &[u8]) -> Result<(Data, Data), NacAbeError> {
        let policy = self
            .policy_for(content)
            .ok_or_else(|| NacAbeError::not_ready(&format!("no policy set for {}", content)))?;
        self.publish(content, &policy, plaintext)
    }

    fn publish(&self, content: &Name, policy: &Policy, plaintext: &[u8]) -> Result<(Data, Data), NacAbeError> {
        // `POLICY` and `CK` names belong to policy pushes and wrapped keys
        if content.is_empty() || content.get(0) == Some(POLICY) || content.last() == Some(CONTENT_KEY) {
            return Err(NacAbeError::encoding(&format!("{} is a reserved content name", content)));
        }
        let params = self
            .public_parameters()
            .ok_or_else(|| NacAbeError::not_ready("public parameters not fetched"))?;
        policy.validate_for_encryption()?;
        let content_name = naming::content_name(self.name(), content);
        let key_name = naming::content_key_name(self.name(), content);

        let content_key = generate_key();
        let ciphertext = encrypt_aead(&content_key, plaintext, content_name.to_string().as_bytes())?;
        let wrapped = bsw::encrypt(&params.key, &policy.to_string(), PolicyLanguage::HumanPolicy, &content_key)?;

        let content_data = self.state.identity.sign_data(Data::new(content_name.clone(), ciphertext))?;
        let key_data = self.state.identity.sign_data(Data::new(key_name.clone(), to_bytes(&wrapped)?))?;
        self.state.store.insert(content_name.clone(), content_data.clone());
        self.state.store.insert(key_name, key_data.clone());
        info!(name = %content_name, %policy, bytes = plaintext.len(), "published content");
        Ok((content_data, key_data))
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.face.unregister_prefix(self.state.identity.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ndn::DummyNetwork;
    use crate::security::TrustConfig;

    fn producer(owners: Arc<TrustConfig>) -> Producer {
        let network = DummyNetwork::default();
        Producer::new(
            Identity::generate("/producer".parse().unwrap()),
            Arc::new(network.face()),
            "/aa".parse().unwrap(),
            Arc::new(TrustConfig::new()),
            owners,
        )
        .unwrap()
    }

    fn push(owner: &Identity, content: &str, policy: &str) -> Interest {
        let name = naming::policy_name(&"/producer".parse().unwrap(), &content.parse().unwrap());
        owner
            .sign_interest(Interest::new(name).with_parameters(policy.as_bytes().to_vec()))
            .unwrap()
    }

    #[tokio::test]
    async fn produce_needs_public_parameters() {
        let producer = producer(Arc::new(TrustConfig::new()));
        let err = producer.produce(&"/data".parse().unwrap(), "attr1", b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
        let err = producer.produce_with_cached_policy(&"/data".parse().unwrap(), b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
    }

    #[tokio::test]
    async fn policy_push_overwrites() {
        let owners = Arc::new(TrustConfig::new());
        let owner = Identity::generate("/owner".parse().unwrap());
        owners.add_certificate(owner.certificate());
        let producer = producer(owners);
        let content: Name = "/data".parse().unwrap();

        producer.on_policy_push(&push(&owner, "/data", "attr1")).unwrap();
        producer.on_policy_push(&push(&owner, "/data", "attr2 or attr3")).unwrap();
        assert_eq!(producer.policy_for(&content).unwrap().to_string(), "attr2 or attr3");

        let err = producer.on_policy_push(&push(&owner, "/data", "attr1 and")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPolicy);
        let err = producer.on_policy_push(&push(&owner, "/data", "attr1 and not attr2")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPolicy);
        assert_eq!(producer.policy_for(&content).unwrap().to_string(), "attr2 or attr3");
    }

    #[tokio::test]
    async fn replayed_push_is_rejected() {
        let network = DummyNetwork::default();
        let owners = Arc::new(TrustConfig::new());
        let owner = Identity::generate("/owner".parse().unwrap());
        owners.add_certificate(owner.certificate());
        let producer = Producer::new(
            Identity::generate("/producer".parse().unwrap()),
            Arc::new(network.face()),
            "/aa".parse().unwrap(),
            Arc::new(TrustConfig::new()),
            owners,
        )
        .unwrap();
        let content: Name = "/data".parse().unwrap();
        let face = network.face();

        let public = push(&owner, "/data", "public");
        let secret = push(&owner, "/data", "secret and admin");
        assert_eq!(face.express_interest(public.clone()).await.unwrap().content, POLICY_ACCEPTED.as_bytes());
        assert_eq!(face.express_interest(secret).await.unwrap().content, POLICY_ACCEPTED.as_bytes());

        let replayed = network.face().express_interest(public.clone()).await.unwrap();
        assert_ne!(replayed.content, POLICY_ACCEPTED.as_bytes());
        assert_eq!(producer.on_policy_push(&public).unwrap_err().kind(), ErrorKind::TrustFailure);
        assert_eq!(producer.policy_for(&content).unwrap().to_string(), "secret and admin");

        let mut unstamped = Interest::new(naming::policy_name(producer.name(), &content))
            .with_parameters(b"public".to_vec());
        unstamped.signature = Some(owner.sign(&unstamped.signed_portion().unwrap()));
        assert_eq!(producer.on_policy_push(&unstamped).unwrap_err().kind(), ErrorKind::TrustFailure);

        producer.on_policy_push(&push(&owner, "/data", "public")).unwrap();
        assert_eq!(producer.policy_for(&content).unwrap().to_string(), "public");
    }

    #[tokio::test]
    async fn reserved_content_names_are_refused() {
        let producer = producer(Arc::new(TrustConfig::new()));
        for reserved in ["/POLICY/x", "/x/CK"] {
            let err = producer.produce(&reserved.parse().unwrap(), "attr1", b"x").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Encoding, "{}", reserved);
        }
    }

    #[tokio::test]
    async fn unknown_owner_is_rejected() {
        let producer = producer(Arc::new(TrustConfig::new()));
        let stranger = Identity::generate("/stranger".parse().unwrap());
        let err = producer.on_policy_push(&push(&stranger, "/data", "attr1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TrustFailure);
        assert!(producer.policy_for(&"/data".parse().unwrap()).is_none());
    }
}
