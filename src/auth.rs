//! Host credential checks.

use uuid::Uuid;

/// Opaque yes/no check of a host password.
pub trait HostVerifier: Send + Sync {
    fn verify(&self, password: &str) -> bool;
}

/// Compares against a single shared secret.
#[derive(Debug, Clone)]
pub struct SharedSecret {
    secret: String,
}

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl HostVerifier for SharedSecret {
    fn verify(&self, password: &str) -> bool {
        // An unset secret never matches.
        !self.secret.is_empty()
            && self.secret.len() == password.len()
            && self
                .secret
                .bytes()
                .zip(password.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

/// Issue a fresh single-use host capability token.
pub fn issue_host_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_secret() {
        let verifier = SharedSecret::new("hunter2");
        assert!(verifier.verify("hunter2"));
        assert!(!verifier.verify("hunter3"));
        assert!(!verifier.verify("hunter"));
        assert!(!verifier.verify(""));
    }

    #[test]
    fn test_empty_secret_never_matches() {
        let verifier = SharedSecret::new("");
        assert!(!verifier.verify(""));
    }

    #[test]
    fn test_tokens_unique() {
        assert_ne!(issue_host_token(), issue_host_token());
    }
}
