//! Core data models for the mirror network.
//!
//! These entities describe mirrors, the endpoints through which they can be
//! reached, and the transports those endpoints imply. They carry no rule
//! logic of their own; validation lives in `services`.

pub mod endpoint;
pub mod mirror;
pub mod protocol;

pub use endpoint::{MirrorRsync, MirrorRsyncId, MirrorUrl, MirrorUrlId, RsyncAddress};
pub use mirror::{Mirror, MirrorId, MirrorUpdate, NewMirror};
pub use protocol::MirrorProtocol;
