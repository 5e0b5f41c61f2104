use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Handler code staged to the asset bucket as `<source_hash>.zip`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeAsset {
    pub directory: String,
    pub source_hash: String,
}

impl CodeAsset {
    pub fn new(directory: impl Into<String>, source_hash: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            source_hash: source_hash.into(),
        }
    }

    pub fn object_key(&self) -> String {
        format!("{}.zip", self.source_hash)
    }
}

/// Content hash of a code directory given as (relative path, bytes) pairs.
///
/// Entries are sorted by path first, so walk order does not matter. Paths use
/// `/` separators.
pub fn fingerprint<I>(files: I) -> String
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let mut entries: Vec<(String, Vec<u8>)> = files.into_iter().collect();
    entries.sort_by(|left, right| left.0.cmp(&right.0));

    let mut hasher = Sha256::new();
    for (path, contents) in entries {
        hasher.update((path.len() as u64).to_be_bytes());
        hasher.update(path.as_bytes());
        hasher.update((contents.len() as u64).to_be_bytes());
        hasher.update(&contents);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_walk_order() {
        let forward = fingerprint(vec![
            ("index.js".to_string(), b"exports.handler = 1;".to_vec()),
            ("lib/util.js".to_string(), b"module.exports = {};".to_vec()),
        ]);
        let reversed = fingerprint(vec![
            ("lib/util.js".to_string(), b"module.exports = {};".to_vec()),
            ("index.js".to_string(), b"exports.handler = 1;".to_vec()),
        ]);

        assert_eq!(forward, reversed);
        assert_eq!(forward.len(), 64);
    }

    #[test]
    fn fingerprint_tracks_path_boundaries() {
        let joined = fingerprint(vec![("ab".to_string(), b"c".to_vec())]);
        let split = fingerprint(vec![("a".to_string(), b"bc".to_vec())]);
        assert_ne!(joined, split);
    }
}
