//! Random interaction keys for events without a stable conversation identifier.

use rand::distributions::Alphanumeric;
use rand::prelude::*;

/// Length of generated keys.
pub const RANDOM_KEY_LEN: usize = 10;

/// Generate a random alphanumeric key of `len` characters.
pub fn random_key(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_key_length_and_charset() {
        let key = random_key(RANDOM_KEY_LEN);
        assert_eq!(key.len(), RANDOM_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_keys_differ() {
        assert_ne!(random_key(32), random_key(32));
    }

    #[test]
    fn test_random_key_empty() {
        assert!(random_key(0).is_empty());
    }
}
