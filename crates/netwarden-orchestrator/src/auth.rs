//! Login, token refresh, and password management.
//!
//! A minimal, self-contained auth policy: no SSO, no MFA, no password-reset
//! email flow. Passwords are hashed with argon2; access/refresh tokens are
//! HMAC-signed JWTs distinguished by a `type` claim.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use netwarden_core::{Config, Error, Result, Role, User};
use netwarden_store::Store;
use serde::{Deserialize, Serialize};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: String,
    #[serde(rename = "type")]
    token_type: String,
    exp: i64,
}

/// Issued on successful login or refresh.
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Full response shape for `POST /api/auth/login`.
pub struct LoginResult {
    pub tokens: TokenPair,
    pub must_change_password: bool,
    pub role: Role,
    pub username: String,
}

pub struct Auth<'a> {
    store: &'a Store,
    config: &'a Config,
}

impl<'a> Auth<'a> {
    pub fn new(store: &'a Store, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Creates the initial admin account from config if no users exist yet.
    /// Idempotent after the first boot.
    pub async fn bootstrap_admin(&self) -> Result<()> {
        if self.store.count_users().await? > 0 {
            return Ok(());
        }
        let hashed = hash_password(&self.config.default_admin_password)?;
        self.store
            .create_user(
                &self.config.default_admin_username,
                None,
                None,
                &hashed,
                Role::Admin,
                true,
            )
            .await?;
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult> {
        let user = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| Error::Auth("invalid username or password".to_string()))?;

        if !user.is_active {
            return Err(Error::Auth("account is disabled".to_string()));
        }
        if !verify_password(password, &user.hashed_password)? {
            return Err(Error::Auth("invalid username or password".to_string()));
        }

        let tokens = self.issue_tokens(&user)?;
        Ok(LoginResult {
            tokens,
            must_change_password: user.must_change_password,
            role: user.role,
            username: user.username,
        })
    }

    /// Rotates a refresh token for a fresh access/refresh pair. Rejects a
    /// token that isn't actually a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.decode_token(refresh_token)?;
        if claims.token_type != "refresh" {
            return Err(Error::Auth(
                "token is not a refresh token".to_string(),
            ));
        }
        let user = self
            .store
            .get_user_by_username(&claims.sub)
            .await?
            .ok_or_else(|| Error::Auth("user no longer exists".to_string()))?;
        if !user.is_active {
            return Err(Error::Auth("account is disabled".to_string()));
        }
        self.issue_tokens(&user)
    }

    /// Validates an access token and returns the authenticated user.
    pub async fn authenticate(&self, access_token: &str) -> Result<User> {
        let claims = self.decode_token(access_token)?;
        if claims.token_type != "access" {
            return Err(Error::Auth("token is not an access token".to_string()));
        }
        self.store
            .get_user_by_username(&claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| Error::Auth("user no longer exists".to_string()))
    }

    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        if !verify_password(current_password, &user.hashed_password)? {
            return Err(Error::Auth("current password is incorrect".to_string()));
        }
        validate_password_strength(new_password)?;
        let hashed = hash_password(new_password)?;
        self.store.update_password(user.id, &hashed, false).await?;
        Ok(())
    }

    /// Admin-initiated reset; skips the current-password check. Sets
    /// `must_change_password` so the user is forced to pick their own on
    /// next login.
    pub async fn reset_password(&self, user_id: i64, new_password: &str) -> Result<()> {
        validate_password_strength(new_password)?;
        let hashed = hash_password(new_password)?;
        self.store.update_password(user_id, &hashed, true).await?;
        Ok(())
    }

    fn issue_tokens(&self, user: &User) -> Result<TokenPair> {
        let access_exp =
            Utc::now() + Duration::minutes(self.config.access_token_expire_minutes);
        let refresh_exp =
            Utc::now() + Duration::days(self.config.refresh_token_expire_days);

        let access_token = self.encode_token(&Claims {
            sub: user.username.clone(),
            role: user.role.to_string(),
            token_type: "access".to_string(),
            exp: access_exp.timestamp(),
        })?;
        let refresh_token = self.encode_token(&Claims {
            sub: user.username.clone(),
            role: user.role.to_string(),
            token_type: "refresh".to_string(),
            exp: refresh_exp.timestamp(),
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    fn encode_token(&self, claims: &Claims) -> Result<String> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.config.secret_key.as_bytes()),
        )
        .map_err(|e| Error::Auth(format!("failed to sign token: {e}")))
    }

    fn decode_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret_key.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| Error::Auth(format!("invalid or expired token: {e}")))
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Auth(format!("failed to hash password: {e}")))
}

fn verify_password(password: &str, hashed: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hashed)
        .map_err(|e| Error::Auth(format!("corrupt password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn validate_password_strength(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut c = Config::default();
        c.secret_key = "test-secret-key-for-unit-tests".to_string();
        c.default_admin_username = "admin".to_string();
        c.default_admin_password = "super-secret-1".to_string();
        c
    }

    #[tokio::test]
    async fn bootstrap_creates_admin_once() {
        let store = Store::connect_memory().await.unwrap();
        let config = test_config();
        let auth = Auth::new(&store, &config);

        auth.bootstrap_admin().await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 1);
        auth.bootstrap_admin().await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn login_then_refresh_round_trip() {
        let store = Store::connect_memory().await.unwrap();
        let config = test_config();
        let auth = Auth::new(&store, &config);
        auth.bootstrap_admin().await.unwrap();

        let result = auth.login("admin", "super-secret-1").await.unwrap();
        assert!(result.must_change_password);
        assert_eq!(result.role, Role::Admin);

        let refreshed = auth.refresh(&result.tokens.refresh_token).await.unwrap();
        let user = auth.authenticate(&refreshed.access_token).await.unwrap();
        assert_eq!(user.username, "admin");
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let store = Store::connect_memory().await.unwrap();
        let config = test_config();
        let auth = Auth::new(&store, &config);
        auth.bootstrap_admin().await.unwrap();

        let result = auth.login("admin", "super-secret-1").await.unwrap();
        let err = auth.refresh(&result.tokens.access_token).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn login_rejects_bad_password() {
        let store = Store::connect_memory().await.unwrap();
        let config = test_config();
        let auth = Auth::new(&store, &config);
        auth.bootstrap_admin().await.unwrap();

        let err = auth.login("admin", "wrong-password").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn change_password_clears_must_change_flag() {
        let store = Store::connect_memory().await.unwrap();
        let config = test_config();
        let auth = Auth::new(&store, &config);
        auth.bootstrap_admin().await.unwrap();

        let user = store.get_user_by_username("admin").await.unwrap().unwrap();
        auth.change_password(&user, "super-secret-1", "a-new-strong-pass")
            .await
            .unwrap();

        let updated = store.get_user_by_username("admin").await.unwrap().unwrap();
        assert_ne!(updated.hashed_password, user.hashed_password);
        auth.login("admin", "a-new-strong-pass").await.unwrap();
    }
}
