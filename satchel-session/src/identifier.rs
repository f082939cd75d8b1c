//! Session identifier generation and validation

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

pub const DEFAULT_ID_LENGTH: usize = 40;

/// Random mixed-case alphanumeric string drawn from the operating system RNG
pub fn random_alphanumeric(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Fixed-length alphanumeric identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierPolicy {
    length: usize,
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self {
            length: DEFAULT_ID_LENGTH,
        }
    }
}

impl IdentifierPolicy {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn generate(&self) -> String {
        random_alphanumeric(self.length)
    }

    pub fn is_valid(&self, id: &str) -> bool {
        id.len() == self.length && id.bytes().all(|b| b.is_ascii_alphanumeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid() {
        let policy = IdentifierPolicy::default();
        for _ in 0..32 {
            let id = policy.generate();
            assert_eq!(id.len(), 40);
            assert!(policy.is_valid(&id));
        }
    }

    #[test]
    fn test_generated_ids_differ() {
        let policy = IdentifierPolicy::default();
        assert_ne!(policy.generate(), policy.generate());
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let policy = IdentifierPolicy::default();
        assert!(!policy.is_valid("wrong"));
        assert!(!policy.is_valid(""));
        assert!(!policy.is_valid(&"a".repeat(41)));
        assert!(!policy.is_valid(&format!("{}-", "a".repeat(39))));
        assert!(!policy.is_valid(&format!("{}é", "a".repeat(38))));
        assert!(policy.is_valid(&"a".repeat(40)));
    }

    #[test]
    fn test_custom_length() {
        let policy = IdentifierPolicy::new(16);
        assert_eq!(policy.length(), 16);
        let id = policy.generate();
        assert_eq!(id.len(), 16);
        assert!(policy.is_valid(&id));
        assert!(!IdentifierPolicy::default().is_valid(&id));
    }
}
