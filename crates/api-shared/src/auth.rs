//! Session tokens.
//!
//! A session is `base64url(json claims).base64url(hmac)` signed with the process secret. The
//! token travels in the configured cookie or an `Authorization: Bearer` header and is checked
//! against the session lifetime on every request.

use chrono::{DateTime, Duration, Utc};
use physihome_cipher::TokenSigner;
use physihome_core::{CoreConfig, PortalError, PortalResult};
use physihome_store::{Store, UserId, UserRecord};
use physihome_uuid::CanonicalUuid;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: String,
    pub email: String,
    /// Unix seconds.
    pub issued_at: i64,
}

#[derive(Clone)]
pub struct SessionTokens {
    signer: TokenSigner,
    cookie_name: String,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(cfg: &CoreConfig) -> Self {
        Self {
            signer: TokenSigner::new(cfg.secret_key()),
            cookie_name: cfg.session_cookie_name().to_string(),
            ttl: cfg.session_ttl(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &UserRecord, now: DateTime<Utc>) -> PortalResult<String> {
        let claims = SessionClaims {
            user_id: user.id.to_string(),
            email: user.email.clone(),
            issued_at: now.timestamp(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| PortalError::InvalidInput(format!("session encoding: {}", e)))?;
        Ok(self.signer.sign(&payload)?)
    }

    /// Claims of a well-signed, unexpired token; `None` otherwise.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Option<SessionClaims> {
        let payload = self.signer.verify(token).ok()?;
        let claims: SessionClaims = serde_json::from_slice(&payload).ok()?;
        let issued = DateTime::<Utc>::from_timestamp(claims.issued_at, 0)?;
        if issued > now || now - issued > self.ttl {
            return None;
        }
        Some(claims)
    }

    /// Resolves the signed-in user, if any. A missing or invalid token or a deleted user all
    /// yield `None`.
    pub async fn resolve(
        &self,
        store: &dyn Store,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> PortalResult<Option<UserRecord>> {
        let Some(claims) = token.and_then(|t| self.validate(t, now)) else {
            return Ok(None);
        };
        let Ok(id) = CanonicalUuid::parse(&claims.user_id) else {
            return Ok(None);
        };
        Ok(store.get_user(&UserId(id)).await?)
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.cookie_name,
            token,
            self.ttl.num_seconds()
        )
    }

    /// `Set-Cookie` value that removes the session.
    pub fn clear_cookie(&self) -> String {
        format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", self.cookie_name)
    }
}

/// Picks the session token from a `Cookie` header, falling back to a bearer token.
pub fn token_from_headers<'a>(
    cookie_name: &str,
    cookie_header: Option<&'a str>,
    authorization: Option<&'a str>,
) -> Option<&'a str> {
    let from_cookie = cookie_header.and_then(|header| {
        header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == cookie_name && !value.is_empty()).then_some(value)
        })
    });
    from_cookie.or_else(|| {
        authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use physihome_core::Environment;
    use physihome_store::MemoryStore;

    fn tokens() -> SessionTokens {
        let cfg = CoreConfig::new(Environment::Test, "secret".into(), vec![])
            .unwrap()
            .with_session("sid".into(), 60)
            .unwrap();
        SessionTokens::new(&cfg)
    }

    #[tokio::test]
    async fn issued_token_resolves_user_until_expiry() {
        let store = MemoryStore::new();
        let user = UserRecord::new("a@x.com", Utc::now());
        store.insert_user(&user).await.unwrap();

        let t = tokens();
        let now = Utc::now();
        let token = t.issue(&user, now).unwrap();

        let resolved = t.resolve(&store, Some(&token), now).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));

        let later = now + Duration::minutes(61);
        assert!(t.resolve(&store, Some(&token), later).await.unwrap().is_none());
        assert!(t.resolve(&store, None, now).await.unwrap().is_none());
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let t = tokens();
        let user = UserRecord::new("a@x.com", Utc::now());
        let now = Utc::now();
        let token = t.issue(&user, now).unwrap();

        let mut tampered = token.clone();
        tampered.insert(0, 'x');
        assert!(t.validate(&tampered, now).is_none());

        let other_cfg = CoreConfig::new(Environment::Test, "other".into(), vec![]).unwrap();
        assert!(SessionTokens::new(&other_cfg).validate(&token, now).is_none());
    }

    #[test]
    fn token_is_found_in_cookie_or_bearer_header() {
        assert_eq!(
            token_from_headers("sid", Some("theme=dark; sid=abc.def"), None),
            Some("abc.def")
        );
        assert_eq!(
            token_from_headers("sid", Some("theme=dark"), Some("Bearer tok")),
            Some("tok")
        );
        assert_eq!(token_from_headers("sid", Some("sid="), None), None);
        assert_eq!(token_from_headers("sid", None, Some("Basic zzz")), None);
    }
}
