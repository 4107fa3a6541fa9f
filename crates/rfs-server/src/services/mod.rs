//! Business logic services

pub mod credentials;
pub mod gateway;

pub use credentials::{Argon2Verifier, CredentialVerifier};
pub use gateway::ResourceGateway;
