//! Validation rules and the topology aggregate built on them.

pub mod address_validator;
pub mod mirror_store;
pub mod tier_constraint;
pub mod topology_service;
pub mod url_normalizer;
