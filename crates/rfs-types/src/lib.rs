//! rfs Types - Wire types for the remote filesystem API
//!
//! This crate contains only pure data types with no runtime dependencies,
//! so clients can share them with the server.

pub mod message;
pub mod node;

pub use message::*;
pub use node::*;

/// Route prefixes of the externally visible resources.
///
/// Hypermedia links inside node descriptors are built from these, so they
/// must stay in sync with the router.
pub mod routes {
    /// Node metadata resource
    pub const NODE: &str = "/api/v1/node/";
    /// Raw file content resource
    pub const CONTENT: &str = "/api/v1/content/";
    /// Compressed archive resource
    pub const ARCHIVE: &str = "/api/v1/download/";
    /// Session creation resource
    pub const AUTHORITY: &str = "/api/v1/authority/";
}
