//! Passphrase loading for SQLCipher: env var → .env in dir → secure prompt.

use anyhow::{Context, Result};
use colored::Colorize;
use log::{info, warn};
use std::path::Path;

use crate::utils::config::PackagePaths;

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn try_env_then_dotenv(dir: &Path) -> Option<String> {
    let key = PackagePaths::get().db_key_env();
    if let Some(s) = non_empty_env(key) {
        return Some(s);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        return non_empty_env(key);
    }
    None
}

/// Read the store passphrase: env (`RANKGRAPH_DB_KEY`) → .env in `dir` → secure prompt.
/// `is_new`: the ranking store does not exist yet; the prompt asks for a new passphrase.
pub fn get_passphrase(dir: &Path, is_new: bool) -> Result<String> {
    info!("Encryption mode: both databases are opened with a SQLCipher key");
    if let Some(s) = try_env_then_dotenv(dir) {
        info!("Passphrase found in environment");
        return Ok(s);
    }
    let label = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    let prompt = if is_new {
        "Create new passphrase: "
    } else {
        "Enter passphrase: "
    };
    let pass =
        rpassword::prompt_password(format!("{} {}", label, prompt)).context("read passphrase")?;
    if is_new {
        warn!("Lost passphrase = lost access to the ranking store");
    }
    Ok(pass.trim().to_string())
}
