#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Bencode sanitize and info-hash helpers for re-emitted torrents (§6, §8
//! P5/S7): before a source torrent is re-imported into the local client
//! under the target tracker, its `info.private` flag is forced to `1` and
//! its `announce`/`announce-list` keys are stripped, then the info-hash of
//! the (unchanged) `info` sub-dictionary is computed to identify the
//! re-emitted torrent on the target tracker.

use std::collections::HashMap;

use sha1::{Digest, Sha1};
use thiserror::Error;

use serde_bencode::value::Value;

/// Result alias for bencode operations.
pub type BencodeResult<T> = Result<T, BencodeError>;

/// Errors raised while decoding, sanitizing, or hashing a torrent file.
#[derive(Debug, Error)]
pub enum BencodeError {
    /// The input bytes are not valid bencode.
    #[error("failed to decode bencoded data")]
    Decode(#[source] serde_bencode::Error),
    /// A value failed to re-encode; indicates a logic error, not bad input.
    #[error("failed to encode bencoded data")]
    Encode(#[source] serde_bencode::Error),
    /// A required key was absent from the decoded document.
    #[error("missing required key {0:?}")]
    MissingKey(&'static str),
    /// A value expected to be a dictionary was some other bencode type.
    #[error("{0:?} is not a bencoded dictionary")]
    NotADict(&'static str),
}

fn decode(bytes: &[u8]) -> BencodeResult<Value> {
    serde_bencode::from_bytes(bytes).map_err(BencodeError::Decode)
}

fn encode(value: &Value) -> BencodeResult<Vec<u8>> {
    serde_bencode::to_bytes(value).map_err(BencodeError::Encode)
}

fn as_dict_mut(value: &mut Value, name: &'static str) -> BencodeResult<&mut HashMap<Vec<u8>, Value>> {
    match value {
        Value::Dict(dict) => Ok(dict),
        _ => Err(BencodeError::NotADict(name)),
    }
}

fn as_dict(value: &Value, name: &'static str) -> BencodeResult<&HashMap<Vec<u8>, Value>> {
    match value {
        Value::Dict(dict) => Ok(dict),
        _ => Err(BencodeError::NotADict(name)),
    }
}

/// Sanitize a source torrent's bytes for re-emission: force `info.private`
/// to `1`, and drop the top-level `announce`/`announce-list` keys (the
/// target tracker supplies its own, and a stray original announce URL would
/// leak the source tracker). Every other key, including `info`'s own
/// field order and content, is preserved unchanged.
///
/// # Errors
///
/// Returns [`BencodeError::Decode`] if `torrent_bytes` is not valid bencode,
/// [`BencodeError::NotADict`] if the root or `info` value is not a
/// dictionary, [`BencodeError::MissingKey`] if `info` is absent, or
/// [`BencodeError::Encode`] if re-encoding fails.
pub fn sanitize(torrent_bytes: &[u8]) -> BencodeResult<Vec<u8>> {
    let mut root = decode(torrent_bytes)?;
    {
        let root_dict = as_dict_mut(&mut root, "torrent")?;
        root_dict.remove(b"announce".as_slice());
        root_dict.remove(b"announce-list".as_slice());
        let info = root_dict
            .get_mut(b"info".as_slice())
            .ok_or(BencodeError::MissingKey("info"))?;
        let info_dict = as_dict_mut(info, "info")?;
        info_dict.insert(b"private".to_vec(), Value::Int(1));
    }
    encode(&root)
}

/// Compute the BitTorrent v1 info-hash: the SHA-1 digest of the bencoded
/// `info` sub-dictionary, hex-encoded.
///
/// # Errors
///
/// Returns [`BencodeError::Decode`] if `torrent_bytes` is not valid bencode,
/// [`BencodeError::NotADict`] if the root value is not a dictionary,
/// [`BencodeError::MissingKey`] if `info` is absent, or
/// [`BencodeError::Encode`] if re-encoding the `info` sub-dictionary fails.
pub fn info_hash_v1(torrent_bytes: &[u8]) -> BencodeResult<String> {
    let root = decode(torrent_bytes)?;
    let root_dict = as_dict(&root, "torrent")?;
    let info = root_dict
        .get(b"info".as_slice())
        .ok_or(BencodeError::MissingKey("info"))?;
    let info_bytes = encode(info)?;
    let digest = Sha1::digest(&info_bytes);
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_torrent(private: Option<i64>, announce: bool) -> Value {
        let mut info = HashMap::new();
        info.insert(b"name".to_vec(), Value::Bytes(b"Show.S01E01.mkv".to_vec()));
        info.insert(b"piece length".to_vec(), Value::Int(262_144));
        info.insert(b"pieces".to_vec(), Value::Bytes(vec![0u8; 20]));
        if let Some(private) = private {
            info.insert(b"private".to_vec(), Value::Int(private));
        }

        let mut root = HashMap::new();
        if announce {
            root.insert(
                b"announce".to_vec(),
                Value::Bytes(b"https://source-tracker.example/announce".to_vec()),
            );
            root.insert(
                b"announce-list".to_vec(),
                Value::List(vec![Value::List(vec![Value::Bytes(
                    b"https://source-tracker.example/announce".to_vec(),
                )])]),
            );
        }
        root.insert(b"info".to_vec(), Value::Dict(info));
        Value::Dict(root)
    }

    #[test]
    fn sanitize_forces_private_and_drops_announce() {
        let bytes = encode(&sample_torrent(None, true)).unwrap();
        let sanitized = sanitize(&bytes).unwrap();
        let decoded = decode(&sanitized).unwrap();
        let root = as_dict(&decoded, "torrent").unwrap();
        assert!(!root.contains_key(b"announce".as_slice()));
        assert!(!root.contains_key(b"announce-list".as_slice()));
        let info = as_dict(root.get(b"info".as_slice()).unwrap(), "info").unwrap();
        assert!(matches!(info.get(b"private".as_slice()), Some(Value::Int(1))));
    }

    #[test]
    fn sanitize_overrides_an_existing_private_flag() {
        let bytes = encode(&sample_torrent(Some(0), false)).unwrap();
        let sanitized = sanitize(&bytes).unwrap();
        let decoded = decode(&sanitized).unwrap();
        let root = as_dict(&decoded, "torrent").unwrap();
        let info = as_dict(root.get(b"info".as_slice()).unwrap(), "info").unwrap();
        assert!(matches!(info.get(b"private".as_slice()), Some(Value::Int(1))));
    }

    #[test]
    fn sanitize_rejects_missing_info() {
        let bytes = encode(&Value::Dict(HashMap::new())).unwrap();
        assert!(matches!(sanitize(&bytes), Err(BencodeError::MissingKey("info"))));
    }

    #[test]
    fn info_hash_is_stable_across_announce_differences() {
        let with_announce = encode(&sample_torrent(None, true)).unwrap();
        let without_announce = encode(&sample_torrent(None, false)).unwrap();
        assert_eq!(
            info_hash_v1(&with_announce).unwrap(),
            info_hash_v1(&without_announce).unwrap()
        );
    }

    #[test]
    fn info_hash_changes_with_sanitize_private_flag() {
        let bytes = encode(&sample_torrent(None, false)).unwrap();
        let original_hash = info_hash_v1(&bytes).unwrap();
        let sanitized = sanitize(&bytes).unwrap();
        let sanitized_hash = info_hash_v1(&sanitized).unwrap();
        assert_ne!(original_hash, sanitized_hash);
        assert_eq!(sanitized_hash.len(), 40);
    }
}
