//! HTTP Basic authentication against Argon2 password hashes

use actix_web::{http::header, web, HttpRequest};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use database::{
    database::request_manager::{RequestManager, RequestManagerError},
    model::person::{NewPerson, Person},
};
use thiserror::Error;

use crate::{errors::ApiError, state::AppState};

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("Invalid password hash format: {0}")]
    InvalidHash(argon2::password_hash::Error),
}

impl From<PasswordError> for ApiError {
    fn from(error: PasswordError) -> Self {
        log::error!("{}", error);
        ApiError::Internal
    }
}

/// Hashes a password with Argon2id, the PHC string carries the salt and parameters
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(PasswordError::InvalidHash)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Returns `None` when no Basic credentials were sent at all
fn basic_credentials(req: &HttpRequest) -> Result<Option<(String, String)>, ApiError> {
    let authorization = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => value,
        None => return Ok(None),
    };

    let authorization = authorization.to_str().map_err(|_| {
        ApiError::AuthenticationFailed(
            "Invalid basic header. Credentials string should not contain invalid characters.",
        )
    })?;

    let mut parts = authorization.split_whitespace();

    match parts.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case("basic") => {}
        _ => return Ok(None),
    }

    let encoded = parts.next().ok_or(ApiError::AuthenticationFailed(
        "Invalid basic header. No credentials provided.",
    ))?;

    if parts.next().is_some() {
        return Err(ApiError::AuthenticationFailed(
            "Invalid basic header. Credentials string should not contain spaces.",
        ));
    }

    let not_base64 = || {
        ApiError::AuthenticationFailed(
            "Invalid basic header. Credentials not correctly base64 encoded.",
        )
    };

    let decoded = STANDARD.decode(encoded).map_err(|_| not_base64())?;
    let decoded = String::from_utf8(decoded).map_err(|_| not_base64())?;

    let (username, password) = decoded.split_once(':').ok_or_else(not_base64)?;

    Ok(Some((username.to_string(), password.to_string())))
}

/// Resolves the caller from the Basic credentials, any active account passes
pub async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Person, ApiError> {
    let (username, password) = basic_credentials(req)?.ok_or(ApiError::NotAuthenticated)?;

    let invalid_credentials = ApiError::AuthenticationFailed("Invalid username/password.");

    let person = match state
        .database(move |request_manager| request_manager.send_get_by_username(username))
        .await?
    {
        Some(person) => person,
        None => return Err(invalid_credentials),
    };

    let password_hash = person.password.clone();
    let verified = web::block(move || verify_password(&password, &password_hash)).await?;

    match verified {
        Ok(true) => Ok(person),
        Ok(false) => Err(invalid_credentials),
        Err(e) => {
            log::warn!("Rejected login for [{}]: {}", person.username, e);
            Err(invalid_credentials)
        }
    }
}

/// Same as `authenticate`, additionally requires a staff account
pub async fn authenticate_staff(req: &HttpRequest, state: &AppState) -> Result<Person, ApiError> {
    let person = authenticate(req, state).await?;

    if !person.is_staff {
        return Err(ApiError::PermissionDenied);
    }

    Ok(person)
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Database(#[from] RequestManagerError),
}

/// Creates the staff account used to administer the api, an existing account with that username is left as is
pub fn ensure_admin(
    request_manager: &RequestManager,
    username: &str,
    password: &str,
) -> Result<Person, BootstrapError> {
    if let Some(existing) = request_manager.send_get_by_username(username.to_string())? {
        if !existing.is_staff {
            log::warn!("⚠️  Admin account [{}] exists but is not staff", username);
        }

        return Ok(existing);
    }

    let admin = request_manager.send_add(NewPerson {
        username: username.to_string(),
        password: hash_password(password)?,
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        phone: String::new(),
        date_of_birth: None,
        is_staff: true,
    })?;

    log::info!("👤 Created admin account [{}]", admin.username);

    Ok(admin)
}
