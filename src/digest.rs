//! Content digests for project payloads.
//!
//! A digest is the lower-case hex SHA-256 of the payload's canonical JSON:
//! compact, object keys sorted byte-wise at every level, array order kept.
//! Two payloads that differ only in key insertion order hash the same.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const DIGEST_HEX_LEN: usize = 64;

pub fn compute_digest(document: &Value) -> Result<String> {
    if !document.is_object() {
        return Err(Error::InvalidPayload(
            "project document must be a JSON object".to_string(),
        ));
    }
    let bytes = canonical_json_bytes(document)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

pub fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(key.clone()), out)?;
                out.push(b':');
                write_canonical(item, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out)?,
    }
    Ok(())
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    serde_json::to_writer(&mut *out, value).map_err(|e| Error::InvalidPayload(e.to_string()))
}

/// Lower-cases a caller supplied digest and checks that it looks like one.
pub fn normalize_digest(digest: &str) -> Result<String> {
    let digest = digest.trim().to_ascii_lowercase();
    if digest.len() != DIGEST_HEX_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidKey {
            field: "digest",
            reason: format!("expected {DIGEST_HEX_LEN} hex characters"),
        });
    }
    Ok(digest)
}
