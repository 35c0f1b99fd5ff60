//! Static identity header provider.

use crate::traits::{
    Headers, IdentityProvider, CLIENT_ID_HEADER, GUEST_ID_HEADER, SESSION_ID_HEADER,
};

/// Identity provider backed by fixed identifiers.
///
/// Empty identifiers are skipped rather than sent as blank headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticIdentity {
    pub guest_id: Option<String>,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guest_id(mut self, id: impl Into<String>) -> Self {
        self.guest_id = Some(id.into());
        self
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }
}

impl IdentityProvider for StaticIdentity {
    fn identity_headers(&self) -> Headers {
        let mut headers = Headers::new();
        let pairs = [
            (GUEST_ID_HEADER, &self.guest_id),
            (SESSION_ID_HEADER, &self.session_id),
            (CLIENT_ID_HEADER, &self.client_id),
        ];
        for (name, value) in pairs {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                headers.insert(name.to_string(), value.to_string());
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_identity_headers() {
        let identity = StaticIdentity::new()
            .with_guest_id("guest-1")
            .with_session_id("sess-9");
        let headers = identity.identity_headers();
        assert_eq!(headers.get(GUEST_ID_HEADER), Some(&"guest-1".to_string()));
        assert_eq!(headers.get(SESSION_ID_HEADER), Some(&"sess-9".to_string()));
        assert!(!headers.contains_key(CLIENT_ID_HEADER));
    }

    #[test]
    fn test_blank_identifiers_are_skipped() {
        let identity = StaticIdentity::new().with_client_id("   ");
        assert!(identity.identity_headers().is_empty());
    }
}
