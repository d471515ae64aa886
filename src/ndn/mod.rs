//! Minimal named-data transport: names, packets and an in-memory face.
mod face;
mod name;
mod packet;

pub use self::face::{cancellable, serve, CancellationToken, DummyFace, DummyNetwork, Face, PendingInterest};
pub use self::name::Name;
pub use self::packet::{Data, Interest, SignatureInfo};
