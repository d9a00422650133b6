//! Mirror topology and endpoint validation.
//!
//! Keeps a tiered mirror network consistent:
//!
//! - rsync endpoint addresses are IPv4, optionally with a netmask
//! - URLs are stored with one trailing slash and a protocol from their scheme
//! - only tier 0 and tier 1 mirrors may serve as an upstream
//! - upstream links never form a cycle
//!
//! [`MirrorTopology`] is the entry point; storage is abstracted behind
//! [`MirrorStore`].

pub mod config;
pub mod errors;
pub mod manifest;
pub mod models;
pub mod services;

pub use config::TopologyConfig;
pub use errors::{FieldError, TopologyError, TopologyResult};
pub use services::{
    mirror_store::{InMemoryMirrorStore, MirrorStore, StoreError},
    topology_service::MirrorTopology,
};
