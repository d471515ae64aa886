//! The attribute authority: owner of the master secret.
//!
//! It answers two kinds of requests under its own name:
//!
//! * `<aa>/PUBPARAMS`, the public parameters, to anyone;
//! * `<aa>/ATTRKEY/<requester>`, a signed request for the requester's
//!   attribute key, answered with a fresh key sealed to the requester's
//!   certificate.
//!
//! Grants enter the table either administratively through
//! [`AttributeAuthority::grant_attributes`] or by redeeming a token of a
//! trusted token issuer.
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::error::{ErrorKind, NacAbeError};
use crate::keys::{self, from_bytes, to_bytes, AttributeDecryptionKey, MasterSecret, PublicParameters};
use crate::naming::{self, ATTRIBUTE_KEY, PUBLIC_PARAMS};
use crate::ndn::{serve, CancellationToken, Data, Face, Interest, Name};
use crate::security::{seal_to, Certificate, Identity, SealedBox, TrustConfig, TrustSchema};
use crate::token_issuer::AttributeGrantToken;

/// Who holds which attributes.
pub trait GrantTable: Send + Sync {
    /// Sets the grant of `identity`, replacing any previous one.
    fn upsert(&self, identity: &Name, attributes: BTreeSet<String>);

    fn lookup(&self, identity: &Name) -> Option<BTreeSet<String>>;

    fn revoke(&self, identity: &Name) -> Option<BTreeSet<String>>;
}

#[derive(Default, Debug)]
pub struct InMemoryGrantTable {
    grants: RwLock<HashMap<Name, BTreeSet<String>>>,
}

impl InMemoryGrantTable {
    pub fn new() -> InMemoryGrantTable {
        InMemoryGrantTable::default()
    }
}

impl GrantTable for InMemoryGrantTable {
    fn upsert(&self, identity: &Name, attributes: BTreeSet<String>) {
        self.grants.write().insert(identity.clone(), attributes);
    }

    fn lookup(&self, identity: &Name) -> Option<BTreeSet<String>> {
        self.grants.read().get(identity).cloned()
    }

    fn revoke(&self, identity: &Name) -> Option<BTreeSet<String>> {
        self.grants.write().remove(identity)
    }
}

/// Application parameters of an attribute key request.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct KeyRequest {
    /// Must match the encryption key of the requester's certificate.
    pub encryption_key: [u8; 32],
    pub token: Option<AttributeGrantToken>,
}

/// Content of every authority (and token issuer) response.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub enum AuthorityReply<T> {
    Granted(T),
    Refused(NacAbeError),
}

impl<T> AuthorityReply<T> {
    pub fn into_result(self) -> Result<T, NacAbeError> {
        match self {
            AuthorityReply::Granted(value) => Ok(value),
            AuthorityReply::Refused(error) => Err(error),
        }
    }
}

impl<T> From<Result<T, NacAbeError>> for AuthorityReply<T> {
    fn from(result: Result<T, NacAbeError>) -> Self {
        match result {
            Ok(value) => AuthorityReply::Granted(value),
            Err(error) => AuthorityReply::Refused(error),
        }
    }
}

struct AuthorityState {
    identity: Identity,
    public_params: PublicParameters,
    master: MasterSecret,
    grants: Arc<dyn GrantTable>,
    requesters: Arc<dyn TrustSchema>,
    issuers: TrustConfig,
    /// Expiry of grants that came from a token.
    token_expiry: RwLock<HashMap<Name, DateTime<Utc>>>,
}

impl AuthorityState {
    fn handle(&self, interest: &Interest) -> Option<Data> {
        let suffix = interest.name.strip_prefix(self.identity.name())?;
        let data = match suffix.get(0) {
            Some(PUBLIC_PARAMS) if suffix.len() == 1 => {
                to_bytes(&self.public_params).map(|content| Data::new(interest.name.clone(), content))
            }
            Some(ATTRIBUTE_KEY) => {
                let reply: AuthorityReply<SealedBox> = self.on_attribute_key_request(interest).into();
                if let AuthorityReply::Refused(e) = &reply {
                    warn!(name = %interest.name, "refused attribute key request: {}", e);
                }
                to_bytes(&reply).map(|content| Data::new(interest.name.clone(), content))
            }
            _ => return None,
        };
        match data.and_then(|data| self.identity.sign_data(data)) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(name = %interest.name, "could not answer: {}", e);
                None
            }
        }
    }

    fn on_attribute_key_request(&self, interest: &Interest) -> Result<SealedBox, NacAbeError> {
        let certificate = self.requesters.verify_interest(interest)?;
        let requester = interest
            .name
            .strip_prefix(&self.identity.name().append(ATTRIBUTE_KEY))
            .unwrap_or_default();
        if requester != certificate.identity {
            return Err(NacAbeError::trust(&format!(
                "request for {} signed by {}",
                requester, certificate.identity
            )));
        }
        let parameters = interest
            .app_parameters
            .as_ref()
            .ok_or_else(|| NacAbeError::encoding("key request without parameters"))?;
        let request: KeyRequest = from_bytes(parameters)?;
        if request.encryption_key != certificate.encryption_key {
            return Err(NacAbeError::trust("encryption key does not match the requester certificate"));
        }
        if let Some(token) = &request.token {
            if token.subject != requester {
                return Err(NacAbeError::trust(&format!(
                    "token for {} presented by {}",
                    token.subject, requester
                )));
            }
            self.redeem_token(token, Utc::now())?;
        }
        let key = self.issue_key(&requester, Utc::now())?;
        seal_to(&certificate, &to_bytes(&key)?, interest.name.to_string().as_bytes())
    }

    fn issue_key(&self, requester: &Name, now: DateTime<Utc>) -> Result<AttributeDecryptionKey, NacAbeError> {
        {
            let mut expiries = self.token_expiry.write();
            if let Some(&expires) = expiries.get(requester) {
                if now >= expires {
                    expiries.remove(requester);
                    self.grants.revoke(requester);
                    warn!(%requester, %expires, "token grant expired");
                    return Err(NacAbeError::new(
                        ErrorKind::UnknownIdentity,
                        &format!("the token grant of {} expired at {}", requester, expires),
                    ));
                }
            }
        }
        let attributes = match self.grants.lookup(requester) {
            Some(attributes) if !attributes.is_empty() => attributes,
            _ => {
                return Err(NacAbeError::new(
                    ErrorKind::UnknownIdentity,
                    &format!("no attributes granted to {}", requester),
                ))
            }
        };
        let key = self.master.derive_key(&self.public_params, requester, &attributes)?;
        info!(%requester, ?attributes, "issued attribute key");
        Ok(key)
    }

    /// A token grant lasts as long as the token does.
    fn redeem_token(&self, token: &AttributeGrantToken, now: DateTime<Utc>) -> Result<(), NacAbeError> {
        token.verify(&self.issuers, now)?;
        let mut expiries = self.token_expiry.write();
        self.grants.upsert(&token.subject, token.attributes.clone());
        match token.expires {
            Some(expires) => expiries.insert(token.subject.clone(), expires),
            None => expiries.remove(&token.subject),
        };
        debug!(subject = %token.subject, issuer = %token.issuer, "redeemed token");
        Ok(())
    }
}

/// A running attribute authority. Stops serving when dropped.
pub struct AttributeAuthority {
    state: Arc<AuthorityState>,
    face: Arc<dyn Face>,
    shutdown: CancellationToken,
}

impl AttributeAuthority {
    /// Runs setup and starts serving below the identity's name. Must be
    /// called inside a tokio runtime.
    pub fn new(
        identity: Identity,
        face: Arc<dyn Face>,
        requesters: Arc<dyn TrustSchema>,
    ) -> Result<AttributeAuthority, NacAbeError> {
        AttributeAuthority::with_grant_table(identity, face, requesters, Arc::new(InMemoryGrantTable::new()))
    }

    pub fn with_grant_table(
        identity: Identity,
        face: Arc<dyn Face>,
        requesters: Arc<dyn TrustSchema>,
        grants: Arc<dyn GrantTable>,
    ) -> Result<AttributeAuthority, NacAbeError> {
        let (public_params, master) = keys::setup();
        let receiver = face.register_prefix(identity.name())?;
        info!(authority = %identity.name(), "attribute authority ready");
        let state = Arc::new(AuthorityState {
            identity,
            public_params,
            master,
            grants,
            requesters,
            issuers: TrustConfig::new(),
            token_expiry: RwLock::new(HashMap::new()),
        });
        let shutdown = CancellationToken::new();
        let handler_state = state.clone();
        serve(receiver, shutdown.clone(), move |interest| handler_state.handle(interest));
        Ok(AttributeAuthority { state, face, shutdown })
    }

    pub fn name(&self) -> &Name {
        self.state.identity.name()
    }

    pub fn certificate(&self) -> Certificate {
        self.state.identity.certificate()
    }

    pub fn public_parameters(&self) -> &PublicParameters {
        &self.state.public_params
    }

    /// Replaces the grant of `identity`. Granting the same set twice is a
    /// no-op. Administrative grants do not expire.
    pub fn grant_attributes(&self, identity: &Name, attributes: BTreeSet<String>) {
        info!(%identity, ?attributes, "granting attributes");
        let mut expiries = self.state.token_expiry.write();
        self.state.grants.upsert(identity, attributes);
        expiries.remove(identity);
    }

    pub fn revoke_attributes(&self, identity: &Name) -> Option<BTreeSet<String>> {
        info!(%identity, "revoking attributes");
        let mut expiries = self.state.token_expiry.write();
        expiries.remove(identity);
        self.state.grants.revoke(identity)
    }

    pub fn granted_attributes(&self, identity: &Name) -> Option<BTreeSet<String>> {
        self.state.grants.lookup(identity)
    }

    /// Accepts tokens signed by `issuer` from now on.
    pub fn trust_token_issuer(&self, issuer: Certificate) {
        self.state.issuers.add_certificate(issuer);
    }

    /// Verifies a token against the trusted issuers and stores its grant
    /// until the token expires.
    pub fn redeem_token(&self, token: &AttributeGrantToken) -> Result<(), NacAbeError> {
        self.state.redeem_token(token, Utc::now())
    }

    /// Handles one attribute key request without going through the face.
    pub fn on_attribute_key_request(&self, interest: &Interest) -> Result<SealedBox, NacAbeError> {
        self.state.on_attribute_key_request(interest)
    }
}

impl Drop for AttributeAuthority {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.face.unregister_prefix(self.state.identity.name());
    }
}

/// Fetches and checks the public parameters of `authority`.
pub(crate) async fn request_public_parameters(
    face: &dyn Face,
    trust: &dyn TrustSchema,
    authority: &Name,
) -> Result<PublicParameters, NacAbeError> {
    let data = face
        .express_interest(Interest::new(naming::public_params_name(authority)))
        .await?;
    let signer = trust.verify_data(&data)?;
    if signer.identity != *authority {
        return Err(NacAbeError::trust(&format!("public parameters signed by {}", signer.identity)));
    }
    from_bytes(&data.content)
}
