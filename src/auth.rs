use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::schemas::{stored_now, User, UserId, UserNick};
use crate::store::LedgerStore;

type HmacSha256 = Hmac<Sha256>;

const MAX_USERNAME_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;
// bcrypt only reads the first 72 bytes of its input.
const MAX_PASSWORD_BYTES: usize = 72;
const BAD_CREDENTIALS: &str = "Invalid email or password";
const BAD_TOKEN: &str = "Invalid or expired token";

/// Signs and checks stateless session tokens of the form
/// `<user_id>.<expires_at>.<hex hmac-sha256>`.
///
/// There is no revocation list: logging out only drops the token on the
/// client, and the token keeps verifying until it expires.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(key: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            ttl,
        }
    }

    fn mac(&self, claims: &str) -> LedgerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|err| LedgerError::Internal(format!("token key rejected: {err}")))?;
        mac.update(claims.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, user: &UserId, now: DateTime<Utc>) -> LedgerResult<String> {
        let claims = format!("{}.{}", user, (now + self.ttl).timestamp());
        let signature = self.mac(&claims)?.finalize().into_bytes();
        Ok(format!("{claims}.{}", hex::encode(signature)))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> LedgerResult<UserId> {
        let invalid = || LedgerError::unauthenticated(BAD_TOKEN);
        let (claims, signature) = token.rsplit_once('.').ok_or_else(invalid)?;
        let signature = hex::decode(signature).map_err(|_| invalid())?;
        self.mac(claims)?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        let (user, expires_at) = claims.split_once('.').ok_or_else(invalid)?;
        let expires_at: i64 = expires_at.parse().map_err(|_| invalid())?;
        if now.timestamp() >= expires_at {
            return Err(invalid());
        }
        ObjectId::parse_str(user).map_err(|_| invalid())
    }
}

/// The verified caller of a request. Handlers take this as an argument, so
/// every privileged route re-checks the bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
}

fn bearer_token(request: &HttpRequest) -> Option<&str> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = authorization.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

impl FromRequest for Session {
    type Error = LedgerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(request: &HttpRequest, _: &mut Payload) -> Self::Future {
        let session = match request.app_data::<web::Data<AuthService>>() {
            Some(auth) => match bearer_token(request) {
                Some(token) => auth.verify(token),
                None => Err(LedgerError::unauthenticated("Missing bearer token")),
            },
            None => Err(LedgerError::Internal("auth service is not configured".into())),
        };
        ready(session)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserJson {
    pub id: String,
    pub username: UserNick,
    pub email: String,
}

impl From<&User> for UserJson {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserJson,
}

fn validate_username(username: &str) -> LedgerResult<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(LedgerError::validation("Username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(LedgerError::validation(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(LedgerError::validation("Username must not contain spaces"));
    }
    Ok(username)
}

/// Trims and lower-cases the address; emails are unique regardless of case.
pub fn normalize_email(email: &str) -> LedgerResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(LedgerError::validation("Email is required"));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(LedgerError::validation("Email address is not valid"));
    }
    Ok(email)
}

fn validate_password(password: &str) -> LedgerResult<()> {
    if password.is_empty() {
        return Err(LedgerError::validation("Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LedgerError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(LedgerError::validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

pub struct AuthService {
    store: Arc<dyn LedgerStore>,
    tokens: TokenSigner,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<dyn LedgerStore>, tokens: TokenSigner, bcrypt_cost: u32) -> Self {
        Self {
            store,
            tokens,
            bcrypt_cost,
        }
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> LedgerResult<AuthResponse> {
        let username = validate_username(username)?;
        let email = normalize_email(email)?;
        validate_password(password)?;

        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| LedgerError::Internal(err.to_string()))?
            .map_err(|err| LedgerError::Internal(err.to_string()))?;

        let user = User {
            id: ObjectId::new(),
            username: username.to_owned(),
            username_key: User::username_key(username),
            email,
            password_hash,
            created_at: stored_now(),
        };
        // Signed before the insert so nothing can fail once the user exists.
        let token = self.tokens.issue(&user.id, Utc::now())?;
        let profile = UserJson::from(&user);
        self.store.insert_user(user).await?;

        info!(user_id = %profile.id, username = %profile.username, "user registered");
        Ok(AuthResponse {
            token,
            user: profile,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> LedgerResult<AuthResponse> {
        let bad_credentials = || LedgerError::unauthenticated(BAD_CREDENTIALS);
        let email = normalize_email(email).map_err(|_| bad_credentials())?;
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            debug!("login for unknown email");
            return Err(bad_credentials());
        };

        let password = password.to_owned();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|err| LedgerError::Internal(err.to_string()))?
            .map_err(|err| LedgerError::Internal(err.to_string()))?;
        if !matches {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(bad_credentials());
        }

        let token = self.tokens.issue(&user.id, Utc::now())?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthResponse {
            token,
            user: UserJson::from(&user),
        })
    }

    pub fn verify(&self, token: &str) -> LedgerResult<Session> {
        let user_id = self.tokens.verify(token, Utc::now()).inspect_err(|_| {
            debug!("rejected bearer token");
        })?;
        Ok(Session { user_id })
    }

    pub async fn current_user(&self, session: &Session) -> LedgerResult<UserJson> {
        match self.store.find_user_by_id(&session.user_id).await? {
            Some(user) => Ok(UserJson::from(&user)),
            None => Err(LedgerError::unauthenticated(BAD_TOKEN)),
        }
    }
}
