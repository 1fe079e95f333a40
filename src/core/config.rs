use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::fmt;

pub const PRODUCTION_BASE_URL: &str = "https://api.pro.coinbase.com";
pub const PRODUCTION_FEED_URL: &str = "wss://ws-feed.pro.coinbase.com";
pub const SANDBOX_BASE_URL: &str = "https://api-public.sandbox.pro.coinbase.com";
pub const SANDBOX_FEED_URL: &str = "wss://ws-feed-public.sandbox.pro.coinbase.com";

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: Secret<String>,
    pub passphrase: Secret<String>,
    pub secret_key: Secret<String>,
    pub sandbox: bool,
    pub base_url: Option<String>,
    pub feed_url: Option<String>,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for ExchangeConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ExchangeConfig", 6)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("passphrase", "[REDACTED]")?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.serialize_field("sandbox", &self.sandbox)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("feed_url", &self.feed_url)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ExchangeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ExchangeConfigHelper {
            api_key: String,
            passphrase: String,
            secret_key: String,
            #[serde(default)]
            sandbox: bool,
            base_url: Option<String>,
            feed_url: Option<String>,
        }

        let helper = ExchangeConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            api_key: Secret::new(helper.api_key),
            passphrase: Secret::new(helper.passphrase),
            secret_key: Secret::new(helper.secret_key),
            sandbox: helper.sandbox,
            base_url: helper.base_url,
            feed_url: helper.feed_url,
        })
    }
}

impl ExchangeConfig {
    /// Create a new configuration with API credentials
    #[must_use]
    pub fn new(api_key: String, passphrase: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            passphrase: Secret::new(passphrase),
            secret_key: Secret::new(secret_key),
            sandbox: false,
            base_url: None,
            feed_url: None,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_KEY`
    /// - `{PREFIX}_PASSPHRASE`
    /// - `{PREFIX}_SECRET_KEY` (base64, as issued by the exchange)
    /// - `{PREFIX}_SANDBOX` (optional, defaults to false)
    /// - `{PREFIX}_BASE_URL` / `{PREFIX}_FEED_URL` (optional overrides)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let required = |name: &str| {
            let var = format!("{}_{}", prefix, name);
            env::var(&var).map_err(|_| ConfigError::MissingEnvironmentVariable(var))
        };

        let api_key = required("API_KEY")?;
        let passphrase = required("PASSPHRASE")?;
        let secret_key = required("SECRET_KEY")?;

        let sandbox = env::var(format!("{}_SANDBOX", prefix))
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Ok(Self {
            api_key: Secret::new(api_key),
            passphrase: Secret::new(passphrase),
            secret_key: Secret::new(secret_key),
            sandbox,
            base_url: env::var(format!("{}_BASE_URL", prefix)).ok(),
            feed_url: env::var(format!("{}_FEED_URL", prefix)).ok(),
        })
    }

    /// Create configuration from a .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    ///
    /// A missing file is fine; the system environment is used as-is.
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Configuration without credentials, usable for market data only
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new(), String::new(), String::new())
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
            && !self.passphrase.expose_secret().is_empty()
            && !self.secret_key.expose_secret().is_empty()
    }

    /// Use the public sandbox endpoints unless explicit URLs are set
    #[must_use]
    pub const fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    #[must_use]
    pub fn feed_url(mut self, feed_url: String) -> Self {
        self.feed_url = Some(feed_url);
        self
    }

    pub fn rest_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            if self.sandbox {
                SANDBOX_BASE_URL.to_string()
            } else {
                PRODUCTION_BASE_URL.to_string()
            }
        })
    }

    pub fn websocket_url(&self) -> String {
        self.feed_url.clone().unwrap_or_else(|| {
            if self.sandbox {
                SANDBOX_FEED_URL.to_string()
            } else {
                PRODUCTION_FEED_URL.to_string()
            }
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            key: self.api_key.clone(),
            passphrase: self.passphrase.clone(),
            secret: self.secret_key.clone(),
        }
    }
}

/// The three pieces the exchange requires to authenticate a request.
///
/// Values are only reachable through [`ExposeSecret`] and are never formatted.
#[derive(Clone)]
pub struct Credentials {
    pub key: Secret<String>,
    pub passphrase: Secret<String>,
    pub secret: Secret<String>,
}

impl Credentials {
    pub fn new(key: String, passphrase: String, secret: String) -> Self {
        Self {
            key: Secret::new(key),
            passphrase: Secret::new(passphrase),
            secret: Secret::new(secret),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
