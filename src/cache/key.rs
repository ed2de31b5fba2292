//! Cache key derivation.

use sha2::{Digest, Sha256};

/// Suffix of full-page cache keys.
pub const PAGE_SUFFIX: &str = ".url";

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Short deterministic hash: the low 64 bits of SHA-256 in base 36,
/// left-padded to 11 characters.
pub fn hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[digest.len() - 8..]);
    let mut n = u64::from_be_bytes(tail);

    let mut out = Vec::with_capacity(13);
    loop {
        out.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    while out.len() < 11 {
        out.push(b'0');
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

/// Key of a cached page: `hash(VERB + " " + URI) + ".url"`.
pub fn page_key(verb: &str, uri: &str) -> String {
    format!("{}{}", hash(&format!("{} {}", verb, uri)), PAGE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_and_compact() {
        let a = hash("GET /a");
        assert_eq!(a, hash("GET /a"));
        assert_ne!(a, hash("GET /b"));
        assert!(a.len() >= 11 && a.len() <= 13);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_page_key_depends_on_verb() {
        let get = page_key("GET", "/a?x=1");
        assert!(get.ends_with(".url"));
        assert_ne!(get, page_key("HEAD", "/a?x=1"));
    }
}
