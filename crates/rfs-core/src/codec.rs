//! Resource identifiers
//!
//! An identifier is the URL-safe base64 form of the raw bytes of a path, so
//! any path the OS can hold survives a trip through a URL segment unchanged.

use crate::error::{RfsError, Result};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode a path into an opaque resource identifier.
pub fn encode(path: &Path) -> String {
    ENGINE.encode(path.as_os_str().as_bytes())
}

/// Decode an identifier back into the path it was made from.
///
/// The empty identifier names the filesystem root. The result is not
/// canonicalized and must be treated as untrusted input.
pub fn decode(identifier: &str) -> Result<PathBuf> {
    if identifier.is_empty() {
        return Ok(PathBuf::from(MAIN_SEPARATOR_STR));
    }

    let bytes = ENGINE
        .decode(identifier)
        .map_err(|e| RfsError::Decode(format!("{}: {}", identifier, e)))?;
    Ok(PathBuf::from(OsStr::from_bytes(&bytes)))
}
