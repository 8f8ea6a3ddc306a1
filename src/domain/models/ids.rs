//! Content hashing & path normalization (§2.1).
//!
//! Every identifier in the engine derives from a SHA-256 of a canonical
//! UTF-8 string, so ids are reproducible across runs and across the full vs.
//! incremental indexing paths (§8, *incremental equivalence*).

use sha2::{Digest, Sha256};

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    format!("{:x}", digest)
}

/// Normalizes a filesystem path to the POSIX-form relative path used as a
/// stable identifier component (`/` separators, no leading `./`).
pub fn posix_rel_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    normalized
        .strip_prefix("./")
        .unwrap_or(&normalized)
        .to_string()
}

/// `file_id = sha256("file:" + posix_rel_path)`
pub fn file_id(rel_path: &str) -> String {
    sha256_hex(&format!("file:{}", posix_rel_path(rel_path)))
}

/// `content_hash = sha256("file:<p>\nkind:<k>\nname:<n>\nsignature:<s>")`
pub fn content_hash(rel_path: &str, kind: &str, name: &str, signature: &str) -> String {
    sha256_hex(&format!(
        "file:{}\nkind:{}\nname:{}\nsignature:{}",
        posix_rel_path(rel_path),
        kind,
        name,
        signature
    ))
}

/// `ref_id = sha256("<p>:<n>:<k>:<start>:<end>:<content_hash>")`
pub fn ref_id(
    rel_path: &str,
    name: &str,
    kind: &str,
    start_line: u32,
    end_line: u32,
    content_hash: &str,
) -> String {
    sha256_hex(&format!(
        "{}:{}:{}:{}:{}:{}",
        posix_rel_path(rel_path),
        name,
        kind,
        start_line,
        end_line,
        content_hash
    ))
}

/// SHA-256 of raw file bytes (UTF-8 text), used by the DSR generator to hash
/// a symbol's byte-range content (§4.9 step 3) and by the incremental
/// indexer's Git-diff-driven change detection.
pub fn hash_bytes(content: &str) -> String {
    sha256_hex(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_rel_path_normalizes_separators_and_dot_prefix() {
        assert_eq!(posix_rel_path("./src/main.rs"), "src/main.rs");
        assert_eq!(posix_rel_path("src\\main.rs"), "src/main.rs");
    }

    #[test]
    fn file_id_is_deterministic_and_path_sensitive() {
        let a = file_id("src/main.rs");
        let b = file_id("src/main.rs");
        let c = file_id("src/lib.rs");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn content_hash_changes_with_signature() {
        let a = content_hash("src/lib.rs", "function", "greet", "fn greet(name: &str)");
        let b = content_hash("src/lib.rs", "function", "greet", "fn greet(name: &str, loud: bool)");
        assert_ne!(a, b);
    }

    #[test]
    fn ref_id_is_unique_per_occurrence() {
        let ch = content_hash("a.rs", "function", "f", "fn f()");
        let a = ref_id("a.rs", "f", "function", 1, 3, &ch);
        let b = ref_id("a.rs", "f", "function", 10, 12, &ch);
        assert_ne!(a, b);
    }
}
