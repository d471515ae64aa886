//! This is the documentation for the ABE schemes used by nacabe
//!
//! Currently this is:
//! * BSW CP-ABE
//!
pub mod bsw;
