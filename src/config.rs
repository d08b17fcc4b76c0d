use std::env;
use std::path::PathBuf;

use crate::constants::{
    ACCESS_TOKEN_TTL_MINUTES, MAX_UPLOAD_SIZE, REFRESH_TOKEN_TTL_DAYS, RESET_TOKEN_TTL_HOURS,
};

/// Runtime settings for the SDK. Defaults match a local development
/// deployment; `from_env` overrides individual fields from the process
/// environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub secret_key: String,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_size: usize,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub reset_token_ttl_hours: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            secret_key: String::from("change-me-in-production-min-32-chars"),
            data_dir: PathBuf::from("user_data"),
            upload_dir: PathBuf::from("uploads"),
            max_upload_size: MAX_UPLOAD_SIZE,
            access_token_ttl_minutes: ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_days: REFRESH_TOKEN_TTL_DAYS,
            reset_token_ttl_hours: RESET_TOKEN_TTL_HOURS,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(key) = env::var("SECRET_KEY") {
            settings.secret_key = key;
        }
        if let Ok(dir) = env::var("DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("UPLOAD_DIR") {
            settings.upload_dir = PathBuf::from(dir);
        }
        if let Ok(size) = env::var("MAX_UPLOAD_SIZE") {
            if let Ok(size) = size.parse() {
                settings.max_upload_size = size;
            }
        }
        if let Ok(minutes) = env::var("ACCESS_TOKEN_EXPIRE_MINUTES") {
            if let Ok(minutes) = minutes.parse() {
                settings.access_token_ttl_minutes = minutes;
            }
        }
        if let Ok(days) = env::var("REFRESH_TOKEN_EXPIRE_DAYS") {
            if let Ok(days) = days.parse() {
                settings.refresh_token_ttl_days = days;
            }
        }
        if let Ok(hours) = env::var("RESET_TOKEN_EXPIRE_HOURS") {
            if let Ok(hours) = hours.parse() {
                settings.reset_token_ttl_hours = hours;
            }
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_every_token_ttl() {
        env::set_var("ACCESS_TOKEN_EXPIRE_MINUTES", "5");
        env::set_var("REFRESH_TOKEN_EXPIRE_DAYS", "2");
        env::set_var("RESET_TOKEN_EXPIRE_HOURS", "3");

        let settings = Settings::from_env();
        assert_eq!(settings.access_token_ttl_minutes, 5);
        assert_eq!(settings.refresh_token_ttl_days, 2);
        assert_eq!(settings.reset_token_ttl_hours, 3);

        env::remove_var("ACCESS_TOKEN_EXPIRE_MINUTES");
        env::remove_var("REFRESH_TOKEN_EXPIRE_DAYS");
        env::remove_var("RESET_TOKEN_EXPIRE_HOURS");
    }

    // Only checks variables no other test touches; tests share the
    // process environment.
    #[test]
    fn unset_environment_keeps_defaults() {
        let settings = Settings::from_env();
        assert_eq!(settings.max_upload_size, MAX_UPLOAD_SIZE);
        assert_eq!(settings.data_dir, PathBuf::from("user_data"));
    }
}
