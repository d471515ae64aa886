//! A separate trust root that hands out signed attribute-grant tokens.
//!
//! A consumer asks `<issuer>/TOKEN/<consumer>/<attr,attr,...>`; the issuer
//! authenticates it, lets its [`AuthorizationRule`] pick the attributes it
//! may have and signs a token over them. The consumer then redeems the token
//! at the attribute authority.
use std::{collections::BTreeSet, sync::Arc};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::attribute_authority::{AuthorityReply, GrantTable, InMemoryGrantTable};
use crate::error::{ErrorKind, NacAbeError};
use crate::keys::to_bytes;
use crate::naming::{self, TOKEN};
use crate::ndn::{serve, CancellationToken, Data, Face, Interest, Name, SignatureInfo};
use crate::security::{Certificate, Identity, TrustSchema};

/// A signed statement that `subject` holds `attributes`.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct AttributeGrantToken {
    pub subject: Name,
    pub attributes: BTreeSet<String>,
    pub issuer: Name,
    pub expires: Option<DateTime<Utc>>,
    pub signature: Option<SignatureInfo>,
}

impl AttributeGrantToken {
    pub fn signed_portion(&self) -> Result<Vec<u8>, NacAbeError> {
        to_bytes(&("token", &self.subject, &self.attributes, &self.issuer, &self.expires))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map_or(false, |expires| now >= expires)
    }

    /// Checks signature, issuer and expiry; every failure is a trust failure.
    pub fn verify(&self, issuers: &dyn TrustSchema, now: DateTime<Utc>) -> Result<(), NacAbeError> {
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| NacAbeError::trust("token is not signed"))?;
        if signature.key_locator != self.issuer {
            return Err(NacAbeError::trust(&format!(
                "token of {} signed by {}",
                self.issuer, signature.key_locator
            )));
        }
        issuers.verify_signature(&self.signed_portion()?, signature)?;
        if self.is_expired(now) {
            return Err(NacAbeError::trust(&format!("token for {} has expired", self.subject)));
        }
        Ok(())
    }
}

/// Decides which of the requested attributes a requester may receive.
pub trait AuthorizationRule: Send + Sync {
    fn authorize(&self, requester: &Name, requested: &BTreeSet<String>) -> BTreeSet<String>;
}

/// The issuer's own identity to attributes table: grants the intersection.
impl AuthorizationRule for InMemoryGrantTable {
    fn authorize(&self, requester: &Name, requested: &BTreeSet<String>) -> BTreeSet<String> {
        match self.lookup(requester) {
            Some(granted) => granted.intersection(requested).cloned().collect(),
            None => BTreeSet::new(),
        }
    }
}

struct IssuerState {
    identity: Identity,
    requesters: Arc<dyn TrustSchema>,
    rule: Arc<dyn AuthorizationRule>,
    lifetime: Option<chrono::Duration>,
}

impl IssuerState {
    fn handle(&self, interest: &Interest) -> Option<Data> {
        let suffix = interest.name.strip_prefix(self.identity.name())?;
        if suffix.get(0) != Some(TOKEN) {
            return None;
        }
        let reply: AuthorityReply<AttributeGrantToken> = self.on_token_request(interest).into();
        if let AuthorityReply::Refused(e) = &reply {
            warn!(name = %interest.name, "refused token request: {}", e);
        }
        let data = to_bytes(&reply)
            .map(|content| Data::new(interest.name.clone(), content))
            .and_then(|data| self.identity.sign_data(data));
        match data {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(name = %interest.name, "could not answer: {}", e);
                None
            }
        }
    }

    fn on_token_request(&self, interest: &Interest) -> Result<AttributeGrantToken, NacAbeError> {
        let certificate = self.requesters.verify_interest(interest)?;
        let suffix = interest
            .name
            .strip_prefix(&self.identity.name().append(TOKEN))
            .unwrap_or_default();
        let (requester, requested) = naming::parse_token_request(&suffix)?;
        if requester != certificate.identity {
            return Err(NacAbeError::trust(&format!(
                "token for {} requested by {}",
                requester, certificate.identity
            )));
        }
        let approved = self.rule.authorize(&requester, &requested);
        if approved.is_empty() {
            return Err(NacAbeError::new(
                ErrorKind::Denied,
                &format!("none of {:?} may be granted to {}", requested, requester),
            ));
        }
        let token = self.issue(&requester, approved)?;
        info!(%requester, attributes = ?token.attributes, "issued token");
        Ok(token)
    }

    fn issue(&self, subject: &Name, attributes: BTreeSet<String>) -> Result<AttributeGrantToken, NacAbeError> {
        let mut token = AttributeGrantToken {
            subject: subject.clone(),
            attributes,
            issuer: self.identity.name().clone(),
            expires: self.expiry(Utc::now())?,
            signature: None,
        };
        token.signature = Some(self.identity.sign(&token.signed_portion()?));
        Ok(token)
    }

    fn expiry(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, NacAbeError> {
        match self.lifetime {
            None => Ok(None),
            Some(lifetime) => now
                .checked_add_signed(lifetime)
                .map(Some)
                .ok_or_else(|| NacAbeError::encoding(&format!("token lifetime {} overflows the clock", lifetime))),
        }
    }
}

/// A running token issuer. Stops serving when dropped.
pub struct TokenIssuer {
    state: Arc<IssuerState>,
    face: Arc<dyn Face>,
    shutdown: CancellationToken,
}

impl TokenIssuer {
    /// Starts serving below the identity's name with the configured token
    /// lifetime of `face`, which has to be in range. Must be called inside a
    /// tokio runtime.
    pub fn new(
        identity: Identity,
        face: Arc<dyn Face>,
        requesters: Arc<dyn TrustSchema>,
        rule: Arc<dyn AuthorizationRule>,
    ) -> Result<TokenIssuer, NacAbeError> {
        let lifetime = face.config().token_lifetime()?;
        let receiver = face.register_prefix(identity.name())?;
        info!(issuer = %identity.name(), "token issuer ready");
        let state = Arc::new(IssuerState {
            identity,
            requesters,
            rule,
            lifetime,
        });
        let shutdown = CancellationToken::new();
        let handler_state = state.clone();
        serve(receiver, shutdown.clone(), move |interest| handler_state.handle(interest));
        Ok(TokenIssuer { state, face, shutdown })
    }

    pub fn name(&self) -> &Name {
        self.state.identity.name()
    }

    pub fn certificate(&self) -> Certificate {
        self.state.identity.certificate()
    }

    /// Handles one token request without going through the face.
    pub fn on_token_request(&self, interest: &Interest) -> Result<AttributeGrantToken, NacAbeError> {
        self.state.on_token_request(interest)
    }
}

impl Drop for TokenIssuer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.face.unregister_prefix(self.state.identity.name());
    }
}
