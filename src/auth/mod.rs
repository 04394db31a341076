//! Credentials and session tokens.

pub mod password;
pub mod token;

pub use token::{Claims, TokenError, TokenService};

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::store::Store;
use crate::types::{NewUser, Role, User};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";

/// Looks up a live user and checks the password. Unknown user and wrong password
/// produce the same `Unauthenticated` error.
pub async fn authenticate(store: &dyn Store, username: &str, password: &str) -> AppResult<User> {
    let invalid = || AppError::Unauthenticated("Invalid credentials".to_string());

    let user = store.find_user_by_username(username).await?.ok_or_else(invalid)?;
    if !password::verify_password(password, &user.password_hash).await? {
        return Err(invalid());
    }
    Ok(user)
}

pub fn validate_new_password(field: &str, password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            field,
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Creates the first admin account when none exists and a bootstrap password is configured.
///
/// Returns `true` if an account was created.
pub async fn bootstrap_admin(store: &dyn Store, cfg: &AppConfig) -> anyhow::Result<bool> {
    if store.count_admins().await? > 0 {
        return Ok(false);
    }
    let Some(password) = cfg.auth.bootstrap_admin_password.as_deref() else {
        warn!("No admin account exists and auth.bootstrap_admin_password is not set; admin routes are unreachable");
        return Ok(false);
    };

    let password_hash = password::hash_password(password, cfg.auth.bcrypt_cost).await?;
    store
        .create_user(NewUser {
            username: BOOTSTRAP_ADMIN_USERNAME.to_string(),
            password_hash,
            name: "Administrator".to_string(),
            role: Role::Admin,
        })
        .await?;
    info!("Bootstrap admin account '{}' created", BOOTSTRAP_ADMIN_USERNAME);
    Ok(true)
}
