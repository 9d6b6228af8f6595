//! Remote key to local path rewriting.

use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// Maps a remote object key under `prefix` to a file path under `local_root`.
///
/// The prefix is matched on `/` segment boundaries: `runs/42/ckpt2/x` is not
/// under `runs/42/ckpt`. A trailing `/` on the prefix is ignored and an empty
/// prefix matches every key. The remainder is joined onto `local_root` one
/// segment at a time, so the platform separator is used on every OS.
///
/// # Arguments
///
/// * `key` - Full remote object key
/// * `prefix` - Remote prefix the key was listed under
/// * `local_root` - Local directory standing in for the prefix
///
/// # Returns
///
/// The local file path, or [`SyncError::InvalidKey`] when the key is not
/// strictly below the prefix, or when the remainder has an empty, `.` or `..`
/// segment.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use artifact_sync::map_remote_key;
///
/// let path = map_remote_key("runs/42/ckpt/sub/b.bin", "runs/42/ckpt", Path::new("./out")).unwrap();
/// assert_eq!(path, Path::new("./out/sub/b.bin"));
/// ```
pub fn map_remote_key(key: &str, prefix: &str, local_root: &Path) -> Result<PathBuf, SyncError> {
    let invalid = || SyncError::InvalidKey {
        key: key.to_string(),
        prefix: prefix.to_string(),
    };

    let prefix_base = prefix.trim_end_matches('/');
    let remainder = if prefix_base.is_empty() {
        key
    } else {
        key.strip_prefix(prefix_base)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(invalid)?
    };

    let remainder = remainder.trim_matches('/');
    if remainder.is_empty() {
        return Err(invalid());
    }

    let mut local_path = local_root.to_path_buf();
    for segment in remainder.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid());
        }
        local_path.push(segment);
    }

    Ok(local_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relative_key(mapped: &Path, root: &Path) -> String {
        mapped
            .strip_prefix(root)
            .unwrap()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    #[test]
    fn test_maps_nested_keys_under_root() {
        let root = Path::new("./out");
        assert_eq!(
            map_remote_key("runs/42/ckpt/a.bin", "runs/42/ckpt", root).unwrap(),
            Path::new("./out/a.bin")
        );
        assert_eq!(
            map_remote_key("runs/42/ckpt/sub/b.bin", "runs/42/ckpt", root).unwrap(),
            Path::new("./out/sub/b.bin")
        );
    }

    #[test]
    fn test_trailing_slash_on_prefix_is_ignored() {
        let root = Path::new("/tmp/models");
        assert_eq!(
            map_remote_key("Flow/7/trained/config.json", "Flow/7/trained/", root).unwrap(),
            Path::new("/tmp/models/config.json")
        );
    }

    #[test]
    fn test_empty_prefix_maps_whole_key() {
        let root = Path::new("cache");
        assert_eq!(
            map_remote_key("Flow/7/model.bin", "", root).unwrap(),
            Path::new("cache/Flow/7/model.bin")
        );
    }

    #[test]
    fn test_rejects_sibling_prefix() {
        let err = map_remote_key("runs/42/ckpt2/a.bin", "runs/42/ckpt", Path::new("out"));
        assert!(matches!(err, Err(SyncError::InvalidKey { .. })));
    }

    #[test]
    fn test_rejects_unrelated_key() {
        let err = map_remote_key("other/a.bin", "runs/42/ckpt", Path::new("out"));
        match err {
            Err(SyncError::InvalidKey { key, prefix }) => {
                assert_eq!(key, "other/a.bin");
                assert_eq!(prefix, "runs/42/ckpt");
            }
            other => panic!("expected InvalidKey, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_key_equal_to_prefix() {
        assert!(map_remote_key("runs/42/ckpt", "runs/42/ckpt", Path::new("out")).is_err());
        assert!(map_remote_key("runs/42/ckpt/", "runs/42/ckpt", Path::new("out")).is_err());
    }

    #[test]
    fn test_rejects_escaping_segments() {
        let root = Path::new("out");
        assert!(map_remote_key("p/../etc/passwd", "p", root).is_err());
        assert!(map_remote_key("p/./a", "p", root).is_err());
        assert!(map_remote_key("p/a//b", "p", root).is_err());
    }

    #[test]
    fn test_strips_separators_left_by_prefix() {
        // Doubled separator right after the prefix and a trailing one on the key.
        assert_eq!(
            map_remote_key("p//a/b/", "p", Path::new("out")).unwrap(),
            Path::new("out/a/b")
        );
    }

    #[test]
    fn test_round_trip_reconstructs_suffix() {
        let root = Path::new("/data/root");
        let prefix = "TrainingFlowBQ/37";
        let suffixes = [
            "adapter_config.json",
            "checkpoint-500/adapter_model.bin",
            "checkpoint-500/tokenizer/vocab.json",
            "a b/c-d_e.f",
        ];

        for suffix in suffixes {
            let key = format!("{}/{}", prefix, suffix);
            let mapped = map_remote_key(&key, prefix, root).unwrap();
            assert!(mapped.starts_with(root));
            assert_eq!(relative_key(&mapped, root), suffix);
        }
    }
}
