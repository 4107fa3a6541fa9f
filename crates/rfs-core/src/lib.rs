//! rfs - Core Library
//!
//! Filesystem primitives behind the rfs HTTP resources: path identifiers,
//! node inspection, chunked content streaming and scratch archive creation.
//! Unix only.

pub mod archive;
pub mod artifact;
pub mod codec;
pub mod error;
pub mod inspector;
pub mod stream;

pub use archive::*;
pub use artifact::*;
pub use error::*;
pub use inspector::*;
pub use stream::*;
