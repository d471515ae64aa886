//! This is the documentation for all nacabe utils
//!
//! Currently those are:
//! aes
//! file
//! hash
//! policy
//! secretsharing
//!
pub mod aes;
pub mod file;
pub mod hash;
pub mod policy;
pub mod secretsharing;
