//! Sanity checks run on a loaded configuration.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, HooklineConfig, HttpConfig, LogOutput, ServerConfig};

/// Validates the entire configuration.
///
/// Absent credentials are not an error here; the runtime asks for a token
/// when it builds the client.
pub fn validate_config(config: &HooklineConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_server_config(&config.server)?;
    validate_http_config(&config.http)?;

    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if let Some(key) = &bot.public_key {
        validate_public_key(key)?;
    }

    if bot.sync_commands && bot.application_id.is_none() {
        return Err(ConfigError::missing_field("bot.application_id"));
    }

    Ok(())
}

/// A public key is 32 bytes written as 64 hex digits.
fn validate_public_key(key: &str) -> ConfigResult<()> {
    let key = key.trim();
    if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::InvalidPublicKey(key.len()));
    }
    Ok(())
}

fn validate_server_config(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.is_empty() {
        return Err(ConfigError::missing_field("server.host"));
    }
    if server.port == 0 {
        return Err(ConfigError::InvalidPort(server.port));
    }
    if !server.path.starts_with('/') {
        return Err(ConfigError::validation(format!(
            "server.path must start with '/', got {:?}",
            server.path
        )));
    }
    Ok(())
}

fn validate_http_config(http: &HttpConfig) -> ConfigResult<()> {
    if http.base_url.is_empty() {
        return Err(ConfigError::missing_field("http.base_url"));
    }
    if !["http://", "https://"]
        .iter()
        .any(|scheme| http.base_url.starts_with(scheme))
    {
        return Err(ConfigError::invalid_url(
            &http.base_url,
            "the API root must be an http:// or https:// URL",
        ));
    }

    if http.timeout_secs == 0 {
        return Err(ConfigError::validation("http.timeout_secs must be greater than 0"));
    }
    if http.max_attempts == 0 {
        return Err(ConfigError::validation("http.max_attempts must be at least 1"));
    }

    Ok(())
}
