use std::env;
use std::path::PathBuf;

const DEFAULT_ADDR: &str = "127.0.0.1:48710";
const DEFAULT_DB_FILE: &str = "brandstudio.sqlite";
const DEFAULT_UPSTREAM_BASE: &str = "https://openrouter.ai/api/v1";

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub db_path: PathBuf,
    /// Hex sha256 digest of the console password.
    pub password_sha256: String,
    pub upstream_api_key: String,
    pub upstream_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let password_sha256 = env::var("BRANDSTUDIO_PASSWORD_SHA256")
            .map_err(|_| "BRANDSTUDIO_PASSWORD_SHA256 is not set".to_string())?;
        validate_password_digest(&password_sha256)?;

        let upstream_api_key = env::var("OPENROUTER_API_KEY")
            .map_err(|_| "OPENROUTER_API_KEY is not set".to_string())?;

        Ok(Self {
            addr: env::var("BRANDSTUDIO_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            db_path: env::var("BRANDSTUDIO_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_FILE)),
            password_sha256: password_sha256.to_lowercase(),
            upstream_api_key,
            upstream_base_url: env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_UPSTREAM_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn validate_password_digest(digest: &str) -> Result<(), String> {
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("BRANDSTUDIO_PASSWORD_SHA256 must be a hex sha256 digest".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_hex_password_digest() {
        assert!(validate_password_digest("not-a-digest").is_err());
        assert!(validate_password_digest(&"g".repeat(64)).is_err());
        assert!(validate_password_digest(&"a".repeat(63)).is_err());
    }

    #[test]
    fn accepts_well_formed_digest() {
        assert!(validate_password_digest(&"0a".repeat(32)).is_ok());
    }
}
