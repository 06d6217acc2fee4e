use std::fmt;

use thiserror::Error;

use crate::adapters::zaptec_http::{TransportError, ZaptecTransport};
use crate::domain::clock::{Clock, TimestampMs};
use crate::domain::zaptec_payload::{PayloadError, parse_token_grant};

/// Tokens are treated as expired this long before their real expiry.
pub const TOKEN_SAFETY_MARGIN_MS: i64 = 2 * 60 * 1000;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity provider rejected the credentials (HTTP {status})")]
    Rejected { status: u16 },
    #[error("token request failed: {0}")]
    Transport(#[source] TransportError),
    #[error("token response is unusable: {0}")]
    InvalidResponse(#[source] PayloadError),
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    bearer: String,
    expires_at: TimestampMs,
}

impl AuthToken {
    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    pub fn expires_at(&self) -> TimestampMs {
        self.expires_at
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("bearer", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Owns the bearer token for one call chain and exchanges credentials for a
/// new one whenever the current token is missing or about to expire.
#[derive(Debug)]
pub struct TokenManager<C> {
    credentials: Credentials,
    clock: C,
    token: Option<AuthToken>,
}

impl<C: Clock> TokenManager<C> {
    pub fn new(credentials: Credentials, clock: C) -> Self {
        Self {
            credentials,
            clock,
            token: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        match &self.token {
            Some(token) => self.clock.now() < token.expires_at.minus_millis(TOKEN_SAFETY_MARGIN_MS),
            None => false,
        }
    }

    pub fn ensure_valid_token<T>(&mut self, transport: &T) -> Result<&AuthToken, AuthError>
    where
        T: ZaptecTransport + ?Sized,
    {
        if !self.is_valid() {
            self.refresh(transport)?;
        }

        self.token
            .as_ref()
            .ok_or(AuthError::InvalidResponse(PayloadError::MissingField("access_token")))
    }

    pub fn refresh<T>(&mut self, transport: &T) -> Result<&AuthToken, AuthError>
    where
        T: ZaptecTransport + ?Sized,
    {
        self.token = None;

        let payload = transport
            .request_token(&self.credentials.username, &self.credentials.password)
            .map_err(|error| match error.status() {
                Some(status @ (400 | 401 | 403)) => AuthError::Rejected { status },
                _ => AuthError::Transport(error),
            })?;
        let grant = parse_token_grant(&payload).map_err(AuthError::InvalidResponse)?;

        let issued_at = self.clock.now();
        let token = AuthToken {
            bearer: grant.access_token,
            expires_at: issued_at.plus_seconds(grant.expires_in_seconds),
        };

        tracing::info!(
            username = %self.credentials.username,
            expires_at = %token.expires_at.to_datetime().to_rfc3339(),
            "obtained zaptec access token"
        );

        Ok(self.token.insert(token))
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AuthError, Credentials, TokenManager};
    use crate::domain::clock::TimestampMs;
    use crate::test_support::{FakeClock, ScriptedTransport, TOKEN_ISSUED_AT};

    fn credentials() -> Credentials {
        Credentials {
            username: "user".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn has_no_valid_token_before_first_exchange() {
        let manager = TokenManager::new(credentials(), FakeClock::new(TOKEN_ISSUED_AT));

        assert!(!manager.is_valid());
        assert!(manager.token().is_none());
    }

    #[test]
    fn exchanges_credentials_on_first_use() {
        let transport = ScriptedTransport::new().with_token("tok-1", 3600);
        let mut manager = TokenManager::new(credentials(), FakeClock::new(TOKEN_ISSUED_AT));

        let token = manager
            .ensure_valid_token(&transport)
            .expect("token should be obtained");

        assert_eq!(token.bearer(), "tok-1");
        assert_eq!(
            token.expires_at(),
            TimestampMs(TOKEN_ISSUED_AT).plus_seconds(3600)
        );
        assert_eq!(
            transport.token_requests(),
            vec![("user".to_string(), "secret".to_string())]
        );
    }

    #[test]
    fn reuses_token_while_outside_safety_margin() {
        let transport = ScriptedTransport::new().with_token("tok-1", 3600);
        let clock = FakeClock::new(TOKEN_ISSUED_AT);
        let mut manager = TokenManager::new(credentials(), clock.clone());

        manager.ensure_valid_token(&transport).expect("first token");
        clock.advance_seconds(3479);
        let token = manager.ensure_valid_token(&transport).expect("cached token");

        assert_eq!(token.bearer(), "tok-1");
        assert_eq!(transport.token_requests().len(), 1);
    }

    #[test]
    fn refreshes_token_inside_safety_margin() {
        let transport = ScriptedTransport::new()
            .with_token("tok-1", 3600)
            .with_token("tok-2", 3600);
        let clock = FakeClock::new(TOKEN_ISSUED_AT);
        let mut manager = TokenManager::new(credentials(), clock.clone());

        manager.ensure_valid_token(&transport).expect("first token");
        clock.advance_seconds(3599);
        assert!(!manager.is_valid());

        let token = manager.ensure_valid_token(&transport).expect("refreshed token");

        assert_eq!(token.bearer(), "tok-2");
        assert_eq!(transport.token_requests().len(), 2);
    }

    #[test]
    fn maps_rejected_credentials() {
        let transport = ScriptedTransport::new().with_token_status(401);
        let mut manager = TokenManager::new(credentials(), FakeClock::new(TOKEN_ISSUED_AT));

        let error = manager
            .ensure_valid_token(&transport)
            .expect_err("401 must fail");

        assert!(matches!(error, AuthError::Rejected { status: 401 }));
        assert!(!manager.is_valid());
    }

    #[test]
    fn fails_when_response_lacks_access_token() {
        let transport =
            ScriptedTransport::new().with_token_payload(json!({"token_type": "bearer"}));
        let mut manager = TokenManager::new(credentials(), FakeClock::new(TOKEN_ISSUED_AT));

        let error = manager
            .ensure_valid_token(&transport)
            .expect_err("missing token must fail");

        assert!(matches!(error, AuthError::InvalidResponse(_)));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let transport = ScriptedTransport::new().with_token("very-secret-token", 3600);
        let mut manager = TokenManager::new(credentials(), FakeClock::new(TOKEN_ISSUED_AT));
        manager.ensure_valid_token(&transport).expect("token");

        let rendered = format!("{manager:?}");

        assert!(!rendered.contains("very-secret-token"));
        assert!(!rendered.contains("secret\""));
    }
}
