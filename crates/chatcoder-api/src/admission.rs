/// Access token used when none is configured.
pub const DEFAULT_ACCESS_TOKEN: &str = "chat-all-us1";

/// Decides whether a client may register or log in at all, before any
/// credential is looked at.
pub trait AdmissionGate: Send + Sync {
    fn admit(&self, presented: &str) -> bool;
}

/// Admits clients that present the configured shared access token.
pub struct SharedSecretGate {
    secret: String,
}

impl SharedSecretGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl Default for SharedSecretGate {
    fn default() -> Self {
        Self::new(DEFAULT_ACCESS_TOKEN)
    }
}

impl AdmissionGate for SharedSecretGate {
    fn admit(&self, presented: &str) -> bool {
        let (a, b) = (presented.as_bytes(), self.secret.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        // Compare every byte so timing does not leak the matching prefix.
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gate() {
        let gate = SharedSecretGate::default();
        assert!(gate.admit("chat-all-us1"));
        assert!(!gate.admit("chat-all-us2"));
        assert!(!gate.admit(""));
        assert!(!gate.admit("chat-all-us1 "));
    }

    #[test]
    fn custom_secret() {
        let gate = SharedSecretGate::new("letmein");
        assert!(gate.admit("letmein"));
        assert!(!gate.admit(DEFAULT_ACCESS_TOKEN));
    }
}
