//! Version fingerprint of a key/value set.
//!
//! `hex_upper(digest(sorted_keys.join("&") + "&" + sorted_values.join("&")))`
//!
//! Keys and values are sorted independently so the result depends only on the
//! content, not on insertion order or on which server answered.
//!
//! `Md5` reproduces the service's own digest: strings are ordered
//! case-insensitively first (lower case before upper case on ties, ordinal
//! last) and every non-ASCII UTF-16 code unit is hashed as `?`. `Sha256` sorts
//! by bytes and hashes UTF-8.

use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::cmp::Ordering;

const SEPARATOR: &str = "&";

/// Digest used for version fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    /// Matches the version notices sent by the reference service
    #[default]
    Md5,
    Sha256,
}

pub(crate) fn compute(
    algorithm: FingerprintAlgorithm,
    mut keys: Vec<String>,
    mut values: Vec<String>,
) -> String {
    match algorithm {
        FingerprintAlgorithm::Md5 => {
            keys.sort_by(|a, b| service_order(a, b));
            values.sort_by(|a, b| service_order(a, b));
            let text = joined(&keys, &values);
            hex::encode_upper(md5::Md5::digest(ascii_lossy(&text)))
        }
        FingerprintAlgorithm::Sha256 => {
            keys.sort_unstable();
            values.sort_unstable();
            let text = joined(&keys, &values);
            hex::encode_upper(sha2::Sha256::digest(text.as_bytes()))
        }
    }
}

fn joined(keys: &[String], values: &[String]) -> String {
    format!("{}{}{}", keys.join(SEPARATOR), SEPARATOR, values.join(SEPARATOR))
}

/// Case-insensitive order, lower case first on ties, then ordinal.
fn service_order(a: &str, b: &str) -> Ordering {
    let folded = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    folded(a)
        .cmp(&folded(b))
        .then_with(|| a.chars().map(char::is_uppercase).cmp(b.chars().map(char::is_uppercase)))
        .then_with(|| a.cmp(b))
}

/// ASCII bytes with `?` for every non-ASCII UTF-16 code unit.
fn ascii_lossy(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            bytes.push(c as u8);
        } else {
            bytes.resize(bytes.len() + c.len_utf16(), b'?');
        }
    }
    bytes
}
