//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `MAX_BATCH_SIZE` (optional): maximum records per ingestion request, defaults to 1000
/// - `RATE_LIMIT_REQUESTS` / `RATE_LIMIT_WINDOW_SECONDS` (optional): fixed-window
///   limiter thresholds, default 300 requests per 60 seconds
/// - `API_KEY_RESET_COOLDOWN_MINUTES` (optional): lockout after a key rotation, defaults to 30
/// - `RESET_TOKEN_DEBUG` (optional): when true, password-reset responses include the raw token
/// - `EMAIL_PROVIDER` / `RESEND_API_KEY` / `EMAIL_FROM` (optional): reset email delivery
/// - `DETECTION_API_KEY` / `DETECTION_MODEL` / `DETECTION_ENDPOINT` (optional): the
///   external field-detection collaborator; unset means detection is skipped
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    #[serde(default = "default_api_key_prefix")]
    pub api_key_prefix: String,

    #[serde(default = "default_api_key_length")]
    pub api_key_length: usize,

    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    #[serde(default = "default_rate_limit_window_seconds")]
    pub rate_limit_window_seconds: u64,

    #[serde(default = "default_api_key_reset_cooldown_minutes")]
    pub api_key_reset_cooldown_minutes: i64,

    #[serde(default)]
    pub reset_token_debug: bool,

    #[serde(default = "default_email_provider")]
    pub email_provider: String,

    #[serde(default)]
    pub resend_api_key: Option<String>,

    #[serde(default)]
    pub email_from: Option<String>,

    #[serde(default)]
    pub detection_api_key: Option<String>,

    #[serde(default = "default_detection_model")]
    pub detection_model: String,

    #[serde(default = "default_detection_endpoint")]
    pub detection_endpoint: String,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_batch_size() -> usize {
    1000
}

fn default_api_key_prefix() -> String {
    "sk_".to_string()
}

fn default_api_key_length() -> usize {
    48
}

fn default_rate_limit_requests() -> u32 {
    300
}

fn default_rate_limit_window_seconds() -> u64 {
    60
}

fn default_api_key_reset_cooldown_minutes() -> i64 {
    30
}

fn default_email_provider() -> String {
    "console".to_string()
}

fn default_detection_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_detection_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }
}
