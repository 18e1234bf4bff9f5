use actix_web::{dev::ServiceRequest, web, Error, HttpMessage};
use actix_web_httpauth::extractors::basic::BasicAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

pub const AUTH_REALM: &str = "Turnero";

/// The authenticated administrator, attached to each admin request.
#[derive(Clone, Debug, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct AdminRow {
    id: String,
    username: String,
    display_name: String,
    password_hash: String,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn authenticate_credentials(
    state: &AppState,
    username: &str,
    password: &str,
) -> Option<AuthUser> {
    let lookup = sqlx::query_as::<_, AdminRow>(
        r#"SELECT id, username, display_name, password_hash
           FROM admins
           WHERE username = ? AND active = 1
           LIMIT 1"#,
    )
    .bind(username)
    .fetch_optional(state.store.pool());

    let admin = match state.store.run(lookup).await {
        Ok(Some(admin)) => admin,
        Ok(None) => return None,
        Err(err) => {
            log::warn!("Admin lookup failed: {err}");
            return None;
        }
    };

    if !verify_password(password, &admin.password_hash) {
        return None;
    }

    Some(AuthUser {
        id: admin.id,
        username: admin.username,
        display_name: admin.display_name,
    })
}

pub async fn admin_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        return Err((AppError::Unauthorized.into(), req));
    };
    let username = credentials.user_id();
    let password = credentials.password().unwrap_or_default();

    match authenticate_credentials(&state, username, password).await {
        Some(user) => {
            req.extensions_mut().insert(user);
            Ok(req)
        }
        None => Err((AppError::Unauthorized.into(), req)),
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
