//! Salted password hashing (bcrypt). Hashing is CPU-bound, so it runs on the
//! blocking pool instead of a runtime worker.

use anyhow::Context;

pub async fn hash_password(password: &str, cost: u32) -> anyhow::Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("password hashing task failed")?
        .context("Failed to hash password")
}

pub async fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("password verification task failed")?
        .context("Failed to verify password")
}
