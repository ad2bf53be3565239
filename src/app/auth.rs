/// Checks the token a caller presents in the `auth-token` header.
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(&self, token: Option<&str>) -> bool;
}

/// Placeholder verifier that admits every caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllTokens;

impl TokenVerifier for AcceptAllTokens {
    fn verify(&self, _token: Option<&str>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{AcceptAllTokens, TokenVerifier};

    #[test]
    fn accepts_missing_and_present_tokens() {
        assert!(AcceptAllTokens.verify(None));
        assert!(AcceptAllTokens.verify(Some("abc")));
    }
}
