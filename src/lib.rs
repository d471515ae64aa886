//! This is the documentation for the `nacabe` library.
//!
//! Attribute-based access control for named-data networks: content is
//! encrypted under boolean attribute policies and only consumers holding a
//! satisfying attribute set can read it.
//!
//! The roles:
//! * [`attribute_authority::AttributeAuthority`] owns the CP-ABE master secret and issues attribute keys
//! * [`token_issuer::TokenIssuer`] optionally decides who gets which attributes
//! * [`producer::Producer`] publishes encrypted content and its wrapped content key
//! * [`consumer::Consumer`] obtains an attribute key and decrypts content
//! * [`data_owner::DataOwner`] pushes policies to producers
//!
//! All of them talk through an [`ndn::Face`]; [`ndn::DummyNetwork`] links
//! faces in memory. Trust decisions go through [`security::TrustSchema`].
//!
//! The CP-ABE primitive is BSW over the BN254 pairing of `rabe-bn`, content
//! is sealed with AES-256-GCM.
pub mod attribute_authority;
pub mod config;
pub mod consumer;
pub mod data_owner;
pub mod error;
pub mod keys;
pub mod naming;
pub mod ndn;
pub mod producer;
pub mod schemes;
pub mod security;
pub mod token_issuer;
pub mod utils;

pub use crate::attribute_authority::AttributeAuthority;
pub use crate::config::NacAbeConfig;
pub use crate::consumer::Consumer;
pub use crate::data_owner::DataOwner;
pub use crate::error::{ErrorKind, NacAbeError};
pub use crate::producer::Producer;
pub use crate::token_issuer::TokenIssuer;
