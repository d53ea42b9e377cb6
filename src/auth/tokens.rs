//! Access token generation and comparison
//!
//! Access tokens are short opaque strings drawn from a letters-only alphabet.
//! They carry no payload: all meaning lives in the session store entry they key.

use rand::Rng;

/// Number of characters in an access token
pub const TOKEN_LENGTH: usize = 10;

/// Characters an access token is drawn from (letters only, no digits)
pub const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Source of fresh access tokens
pub trait TokenSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Tokens drawn uniformly from [`TOKEN_ALPHABET`] using the thread-local CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..TOKEN_LENGTH)
            .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
            .collect()
    }
}

/// Check whether a presented string could have been issued by [`RandomTokens`].
///
/// Lets callers reject junk without touching the session store.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn constant_time_eq(presented: &str, expected: &str) -> bool {
    if presented.len() != expected.len() {
        return false;
    }

    let mut result = 0u8;
    for (a, b) in presented.bytes().zip(expected.bytes()) {
        result |= a ^ b;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_token_shape() {
        let token = RandomTokens.generate();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.bytes().all(|b| TOKEN_ALPHABET.contains(&b)));
        assert!(is_well_formed(&token));
    }

    #[test]
    fn test_generated_tokens_distinct() {
        let tokens: HashSet<String> = (0..1000).map(|_| RandomTokens.generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_alphabet_coverage() {
        // 52 letters over 5000 draws of 10 chars: every letter shows up
        let mut seen = HashSet::new();
        for _ in 0..5000 {
            seen.extend(RandomTokens.generate().into_bytes());
        }
        assert_eq!(seen.len(), TOKEN_ALPHABET.len());
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("abcdeFGHIJ"));
        assert!(!is_well_formed("abcdeFGHI"));
        assert!(!is_well_formed("abcdeFGHI1"));
        assert!(!is_well_formed(""));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("my-secret", "my-secret"));
        assert!(!constant_time_eq("my-secreT", "my-secret"));
        assert!(!constant_time_eq("my-secret-extra", "my-secret"));
        assert!(!constant_time_eq("", "my-secret"));
    }
}
