//! JWT bearer token validation.
//!
//! Tokens are verified either with a shared HMAC secret or against the
//! identity manager's JWKS (`<manager_url>/.well-known/jwks.json`). The
//! whole key set is cached for `jwks_ttl_secs` and replaced on every fetch.
//! An unknown `kid` forces at most one refetch per `jwks_refresh_cooldown_secs`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::auth::identity::Identity;
use crate::auth::validator::ValidatorError;
use crate::config::snapshot::JwtConfig;

const JWKS_PATH: &str = "/.well-known/jwks.json";
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

enum KeySource {
    Secret(DecodingKey),
    Jwks(JwksCache),
}

struct CachedJwks {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// Key set fetched from the identity manager, shared by every request.
struct JwksCache {
    url: String,
    client: reqwest::Client,
    ttl: Duration,
    cooldown: Duration,
    cached: ArcSwapOption<CachedJwks>,
    // Serializes fetches so a burst of misses costs one request.
    refresh: Mutex<()>,
}

impl JwksCache {
    fn new(config: &JwtConfig, client: reqwest::Client) -> Self {
        Self {
            url: format!("{}{}", config.manager_url.trim_end_matches('/'), JWKS_PATH),
            client,
            ttl: Duration::from_secs(config.jwks_ttl_secs),
            cooldown: Duration::from_secs(config.jwks_refresh_cooldown_secs),
            cached: ArcSwapOption::empty(),
            refresh: Mutex::new(()),
        }
    }

    fn is_fresh(&self, set: &CachedJwks) -> bool {
        set.fetched_at.elapsed() < self.ttl
    }

    async fn find(&self, kid: &str) -> Result<DecodingKey, ValidatorError> {
        if let Some(set) = self.cached.load_full() {
            if self.is_fresh(&set) {
                if let Some(key) = set.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        let _guard = self.refresh.lock().await;

        // Another request may have refreshed while we waited for the lock.
        if let Some(set) = self.cached.load_full() {
            if self.is_fresh(&set) {
                if let Some(key) = set.keys.get(kid) {
                    return Ok(key.clone());
                }
                if set.fetched_at.elapsed() < self.cooldown {
                    return Err(ValidatorError::UnknownKey(kid.to_string()));
                }
            }
        }

        tracing::debug!(kid = %kid, url = %self.url, "Fetching JWKS");
        let fetched = self.fetch().await?;
        let key = fetched.keys.get(kid).cloned();
        self.cached.store(Some(Arc::new(fetched)));
        key.ok_or_else(|| ValidatorError::UnknownKey(kid.to_string()))
    }

    async fn fetch(&self) -> Result<CachedJwks, ValidatorError> {
        let set: JwkSet = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut keys = HashMap::with_capacity(set.keys.len());
        for jwk in &set.keys {
            let Some(id) = jwk.common.key_id.as_ref() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(id.clone(), key);
                }
                Err(e) => tracing::warn!(kid = %id, error = %e, "Ignoring unusable JWK"),
            }
        }

        Ok(CachedJwks {
            keys,
            fetched_at: Instant::now(),
        })
    }
}

/// Validates signed JWTs.
pub struct JwtValidator {
    keys: KeySource,
    issuer: Option<String>,
    audience: Option<String>,
    leeway: u64,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig, client: reqwest::Client) -> Self {
        let keys = match config.secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => KeySource::Secret(DecodingKey::from_secret(secret.as_bytes())),
            None => KeySource::Jwks(JwksCache::new(config, client)),
        };

        Self {
            keys,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            leeway: config.leeway_secs,
        }
    }

    pub async fn validate(&self, token: &str) -> Result<Identity, ValidatorError> {
        let header = decode_header(token)?;

        let (key, mut validation) = match &self.keys {
            KeySource::Secret(key) => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.algorithms = HMAC_ALGORITHMS.to_vec();
                (key.clone(), validation)
            }
            KeySource::Jwks(cache) => {
                // A JWKS holds public keys; an HMAC header here is an algorithm confusion attempt.
                if HMAC_ALGORITHMS.contains(&header.alg) {
                    return Err(ValidatorError::Unsupported(format!(
                        "{:?} tokens require a shared secret",
                        header.alg
                    )));
                }
                let kid = header.kid.as_deref().ok_or(ValidatorError::MissingKeyId)?;
                let key = cache.find(kid).await?;
                (key, Validation::new(header.alg))
            }
        };

        validation.leeway = self.leeway;
        match &self.issuer {
            Some(issuer) => validation.set_issuer(&[issuer]),
            None => validation.iss = None,
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<Claims>(token, &key, &validation)?.claims;
        if claims.sub.is_empty() {
            return Err(ValidatorError::MissingSubject);
        }

        let username = claims
            .name
            .or(claims.preferred_username)
            .unwrap_or_else(|| claims.sub.clone());
        Ok(Identity::new(claims.sub, username, claims.permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{routing::get, Json, Router};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "gateway-test-secret";

    fn validator() -> JwtValidator {
        JwtValidator::new(
            &JwtConfig {
                manager_url: "https://manager.internal".into(),
                issuer: Some("https://manager.internal".into()),
                audience: None,
                secret: Some(SECRET.into()),
                leeway_secs: 0,
                jwks_ttl_secs: 3600,
                jwks_refresh_cooldown_secs: 30,
            },
            reqwest::Client::new(),
        )
    }

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn expiry(offset_secs: i64) -> i64 {
        chrono::Utc::now().timestamp() + offset_secs
    }

    #[tokio::test]
    async fn test_valid_token_resolves_identity() {
        let token = token(
            serde_json::json!({
                "sub": "u-123",
                "name": "Ada Lovelace",
                "iss": "https://manager.internal",
                "exp": expiry(3600),
                "permissions": ["read", "write"],
            }),
            SECRET,
        );

        let identity = validator().validate(&token).await.unwrap();
        assert_eq!(identity, Identity::new("u-123", "Ada Lovelace", ["read", "write"]));
    }

    #[tokio::test]
    async fn test_username_falls_back_to_subject() {
        let token = token(
            serde_json::json!({ "sub": "u-7", "iss": "https://manager.internal", "exp": expiry(60) }),
            SECRET,
        );
        let identity = validator().validate(&token).await.unwrap();
        assert_eq!(identity.username, "u-7");
        assert!(identity.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_bad_tokens() {
        let v = validator();

        let expired = token(
            serde_json::json!({ "sub": "u-1", "iss": "https://manager.internal", "exp": expiry(-600) }),
            SECRET,
        );
        assert!(matches!(v.validate(&expired).await, Err(ValidatorError::Jwt(_))));

        let forged = token(
            serde_json::json!({ "sub": "u-1", "iss": "https://manager.internal", "exp": expiry(600) }),
            "someone-else",
        );
        assert!(matches!(v.validate(&forged).await, Err(ValidatorError::Jwt(_))));

        let wrong_issuer = token(
            serde_json::json!({ "sub": "u-1", "iss": "https://evil.example", "exp": expiry(600) }),
            SECRET,
        );
        assert!(matches!(v.validate(&wrong_issuer).await, Err(ValidatorError::Jwt(_))));

        assert!(v.validate("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn test_jwks_mode_refuses_hmac_tokens() {
        let v = JwtValidator::new(
            &JwtConfig {
                manager_url: "https://manager.internal/".into(),
                issuer: None,
                audience: None,
                secret: None,
                leeway_secs: 0,
                jwks_ttl_secs: 3600,
                jwks_refresh_cooldown_secs: 30,
            },
            reqwest::Client::new(),
        );
        let token = token(serde_json::json!({ "sub": "u-1", "exp": expiry(600) }), SECRET);
        assert!(matches!(v.validate(&token).await, Err(ValidatorError::Unsupported(_))));
    }

    /// Serves an empty JWKS and counts how often it is fetched.
    async fn jwks_server() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            JWKS_PATH,
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({ "keys": [] }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (url, hits)
    }

    fn jwks_validator(url: String, ttl_secs: u64, cooldown_secs: u64) -> JwtValidator {
        JwtValidator::new(
            &JwtConfig {
                manager_url: url,
                issuer: None,
                audience: None,
                secret: None,
                leeway_secs: 0,
                jwks_ttl_secs: ttl_secs,
                jwks_refresh_cooldown_secs: cooldown_secs,
            },
            reqwest::Client::new(),
        )
    }

    /// An RS256-headed token whose `kid` the manager never issued.
    fn unsigned_token(kid: &str) -> String {
        let header = serde_json::json!({ "alg": "RS256", "typ": "JWT", "kid": kid });
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(r#"{"sub":"intruder"}"#),
            URL_SAFE_NO_PAD.encode("signature"),
        )
    }

    #[tokio::test]
    async fn test_unknown_key_ids_share_one_jwks_fetch() {
        let (url, hits) = jwks_server().await;
        let v = jwks_validator(url, 3600, 30);

        for i in 0..20 {
            let token = unsigned_token(&format!("forged-{i}"));
            assert!(matches!(v.validate(&token).await, Err(ValidatorError::UnknownKey(_))));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_id_refetches_after_cooldown() {
        let (url, hits) = jwks_server().await;
        let v = jwks_validator(url, 3600, 0);

        for _ in 0..3 {
            let _ = v.validate(&unsigned_token("rotated")).await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_expired_jwks_is_fetched_again() {
        let (url, hits) = jwks_server().await;
        let v = jwks_validator(url, 0, 30);

        let _ = v.validate(&unsigned_token("k1")).await;
        let _ = v.validate(&unsigned_token("k1")).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
