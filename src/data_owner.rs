//! Remote administration of producer policies.
use std::sync::Arc;
use tracing::{info, warn};
use crate::error::{ErrorKind, NacAbeError};
use crate::naming::{self, POLICY_ACCEPTED};
use crate::ndn::{Face, Interest, Name};
use crate::security::{Certificate, Identity, TrustSchema};
use crate::utils::policy::{pest::PolicyLanguage, Policy};

pub struct DataOwner {
    identity: Identity,
    face: Arc<dyn Face>,
    trust: Arc<dyn TrustSchema>,
}

impl DataOwner {
    /// `trust` has to hold the certificates of the producers it commands.
    pub fn new(identity: Identity, face: Arc<dyn Face>, trust: Arc<dyn TrustSchema>) -> DataOwner {
        DataOwner { identity, face, trust }
    }

    pub fn name(&self) -> &Name {
        self.identity.name()
    }

    pub fn certificate(&self) -> Certificate {
        self.identity.certificate()
    }

    /// Sets the policy `producer` encrypts `content` under. Malformed policies
    /// are rejected before anything is sent; a refusal by the producer comes
    /// back as [`ErrorKind::Denied`] carrying the producer's reason.
    pub async fn push_policy(&self, producer: &Name, content: &Name, policy: &str) -> Result<(), NacAbeError> {
        let parsed = Policy::new(policy, PolicyLanguage::HumanPolicy)?;
        parsed.validate_for_encryption()?;
        let interest = Interest::new(naming::policy_name(producer, content))
            .with_parameters(parsed.to_string().into_bytes());
        let data = self.face.express_interest(self.identity.sign_interest(interest)?).await?;
        let signer = self.trust.verify_data(&data)?;
        if signer.identity != *producer {
            return Err(NacAbeError::trust(&format!("policy answer signed by {}", signer.identity)));
        }
        if data.content == POLICY_ACCEPTED.as_bytes() {
            info!(%producer, %content, policy = %parsed, "producer accepted policy");
            Ok(())
        } else {
            let reason = String::from_utf8_lossy(&data.content).into_owned();
            Err(NacAbeError::new(ErrorKind::Denied, &reason))
        }
    }

    /// Callback form of [`push_policy`](Self::push_policy).
    pub async fn command_producer_policy<S, F>(
        &self,
        producer: &Name,
        content: &Name,
        policy: &str,
        on_success: S,
        on_failure: F,
    ) where
        S: FnOnce(),
        F: FnOnce(NacAbeError),
    {
        match self.push_policy(producer, content, policy).await {
            Ok(()) => on_success(),
            Err(e) => {
                warn!(%producer, %content, "policy push failed: {}", e);
                on_failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndn::DummyNetwork;
    use crate::security::TrustConfig;

    #[tokio::test]
    async fn malformed_policy_never_reaches_the_network() {
        // no producer is registered, so anything sent would time out instead
        let network = DummyNetwork::default();
        let owner = DataOwner::new(
            Identity::generate("/owner".parse().unwrap()),
            Arc::new(network.face()),
            Arc::new(TrustConfig::new()),
        );
        let producer: Name = "/producer".parse().unwrap();
        let content: Name = "/data".parse().unwrap();
        for policy in ["attr1 and", "(attr1", "", "attr1 and not attr2"] {
            let err = owner.push_policy(&producer, &content, policy).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedPolicy, "{}", policy);
        }
    }
}
