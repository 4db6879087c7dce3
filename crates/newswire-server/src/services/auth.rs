//! Authentication service
//!
//! Registration, credential verification and session tokens. A session
//! token is a signed JWT whose `sub` claim carries the user id; resolving
//! it is the gate in front of every protected operation.

use crate::storage::Database;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use newswire_types::{Error, Result, User};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const PASSWORD_MIN_LEN: usize = 6;
const PASSWORD_MAX_LEN: usize = 120;
const SESSION_TTL_DAYS: i64 = 30;

pub struct AuthService {
    db: Arc<Database>,
    session_secret: String,
}

impl AuthService {
    pub fn new(db: Arc<Database>, session_secret: String) -> Self {
        Self { db, session_secret }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        validate_credentials(username, password)?;

        let password_hash = hash_password(password)?;
        let user = self.db.create_user(username, &password_hash).await?;
        info!("Registered user '{}' (id {})", user.username, user.id);

        Ok(user)
    }

    /// Verify credentials and open a session. An unknown username and a
    /// wrong password both come back as `AuthenticationRejected`.
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, String)> {
        match self.db.find_user_by_username(username).await? {
            Some(user) if verify_password(&user.password_hash, password) => {
                let token = self.begin_session(user.id)?;
                info!("User '{}' signed in", user.username);
                Ok((user, token))
            }
            Some(_) => Err(Error::AuthenticationRejected),
            None => {
                // Burn the same hashing cost as the verify path so a
                // missing user is not distinguishable by timing.
                let _ = hash_password(password);
                Err(Error::AuthenticationRejected)
            }
        }
    }

    pub fn begin_session(&self, user_id: i64) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.session_secret.as_bytes()),
        )
        .map_err(|e| Error::StoreUnavailable(format!("session token signing failed: {}", e)))
    }

    /// Resolve a session token to the user id it was issued for. Malformed,
    /// forged and expired tokens are all rejected the same way.
    pub fn resolve_session(&self, token: &str) -> Result<i64> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.session_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| Error::AuthenticationRejected)?;

        data.claims
            .sub
            .parse()
            .map_err(|_| Error::AuthenticationRejected)
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<()> {
    if username.is_empty() {
        return Err(Error::validation("username is required"));
    }
    // Letters only, matching the registration contract.
    if !username.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::validation("username must contain only letters"));
    }
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(Error::validation(format!(
            "password must be between {} and {} characters",
            PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::StoreUnavailable(format!("password hashing failed: {}", e)))
}

fn verify_password(password_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}
