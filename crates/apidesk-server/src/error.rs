use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid value for {env_var}: {reason}")]
    InvalidValue { env_var: String, reason: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets the given settings path, e.g. `provider.api_key`
/// becomes `APIDESK_PROVIDER__API_KEY`
pub fn to_env_var(field_path: &str) -> String {
    format!("APIDESK_{}", field_path.replace('.', "__").to_uppercase())
}
