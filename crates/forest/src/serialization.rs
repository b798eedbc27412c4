//! Canonical JSON artifacts with BLAKE3 digests
//!
//! Artifacts are written with recursively sorted object keys and a fixed
//! two-space indent, so the same value always produces the same bytes. A
//! sibling `<file>.hash` holds the hex digest and is checked on load.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{ser::PrettyFormatter, Map, Serializer, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{ForestError, Result};

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(elements) => Value::Array(elements.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize a value into canonical JSON
pub fn canonical_json_string<T: Serialize>(value: &T) -> Result<String> {
    let canonical = canonicalize(serde_json::to_value(value)?);

    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    canonical.serialize(&mut serializer)?;

    String::from_utf8(buffer)
        .map_err(|err| ForestError::Serialization(serde::ser::Error::custom(err.to_string())))
}

/// Hex BLAKE3 digest of the canonical JSON form of `value`
pub fn canonical_digest<T: Serialize>(value: &T) -> Result<String> {
    let json = canonical_json_string(value)?;
    Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
}

/// Path of the digest file that accompanies an artifact
pub fn digest_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".hash");
    PathBuf::from(name)
}

/// Write `value` as canonical JSON plus its digest file; returns the digest
pub fn save_with_digest<T: Serialize>(path: &Path, value: &T) -> Result<String> {
    let json = canonical_json_string(value)?;
    let digest = hex::encode(blake3::hash(json.as_bytes()).as_bytes());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &json)?;
    fs::write(digest_path(path), &digest)?;

    debug!(path = %path.display(), %digest, "artifact written");
    Ok(digest)
}

/// Read an artifact, verifying it against its digest file first
pub fn load_verified<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)?;
    let expected = fs::read_to_string(digest_path(path))?.trim().to_string();
    let actual = hex::encode(blake3::hash(json.as_bytes()).as_bytes());

    if expected != actual {
        return Err(ForestError::HashMismatch { expected, actual });
    }

    Ok(serde_json::from_str(&json)?)
}
