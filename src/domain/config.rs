use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CALLBACK_URL: &str = "/kcejenga/callback";
pub const DEFAULT_SUCCESS_URL: &str = "/payment/success";
pub const DEFAULT_FAILURE_URL: &str = "/payment/failed";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

const PRIVATE_KEY_MASK: &str = "***PRIVATE_KEY_SET***";

/// Selects which pair of gateway endpoints a configuration talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl FromStr for Environment {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Environment::Sandbox),
            "production" => Ok(Environment::Production),
            _ => Err(GatewayError::ConfigurationError(
                "Environment must be either \"sandbox\" or \"production\"".to_string(),
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Sandbox => f.write_str("sandbox"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Token and payment endpoints for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub token: String,
    pub payment: String,
}

/// Endpoint pairs for both environments.
///
/// The defaults are the gateway's published URLs; either pair can be replaced
/// (a staging proxy, or a mock server in tests).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTable {
    pub sandbox: Endpoints,
    pub production: Endpoints,
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self {
            sandbox: Endpoints {
                token: "https://uat.finserve.africa/authentication/api/v3/authenticate/merchant"
                    .to_string(),
                payment: "https://v3-uat.jengapgw.io/processPayment".to_string(),
            },
            production: Endpoints {
                token: "https://api.finserve.africa/authentication/api/v3/authenticate/merchant"
                    .to_string(),
                payment: "https://v3.jengapgw.io/processPayment".to_string(),
            },
        }
    }
}

impl EndpointTable {
    pub fn for_environment(&self, environment: Environment) -> &Endpoints {
        match environment {
            Environment::Sandbox => &self.sandbox,
            Environment::Production => &self.production,
        }
    }
}

/// A finalized configuration snapshot.
///
/// Values are never mutated once built. Runtime changes go through
/// [`GatewayConfig::apply`], which returns a new snapshot, so a request that
/// captured a snapshot keeps seeing one consistent set of credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub merchant_code: String,
    pub consumer_secret: String,
    pub api_key: String,
    pub private_key: Option<String>,
    pub callback_url: String,
    pub success_url: String,
    pub failure_url: String,
    pub verify_hash: bool,
    pub timeout: Duration,
    pub verify_ssl: bool,
    pub endpoints: EndpointTable,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}

impl GatewayConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Endpoint pair for the configured environment.
    pub fn active_endpoints(&self) -> &Endpoints {
        self.endpoints.for_environment(self.environment)
    }

    /// Names of the credential settings that are still empty.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        [
            ("merchant_code", &self.merchant_code),
            ("consumer_secret", &self.consumer_secret),
            ("api_key", &self.api_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Fails with a `ConfigurationError` listing every missing credential.
    pub fn validate_credentials(&self) -> Result<()> {
        let missing = self.missing_credentials();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::ConfigurationError(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// Returns a new snapshot with the fields present in `update` replaced.
    pub fn apply(&self, update: &ConfigUpdate) -> GatewayConfig {
        let mut next = self.clone();
        if let Some(code) = &update.merchant_code {
            next.merchant_code = code.clone();
        }
        if let Some(secret) = &update.consumer_secret {
            next.consumer_secret = secret.clone();
        }
        if let Some(key) = &update.api_key {
            next.api_key = key.clone();
        }
        if let Some(key) = &update.private_key {
            next.private_key = Some(key.clone()).filter(|k| !k.is_empty());
        }
        if let Some(environment) = update.environment {
            next.environment = environment;
        }
        if let Some(url) = &update.callback_url {
            next.callback_url = url.clone();
        }
        next
    }

    pub fn masked(&self) -> MaskedSettings {
        MaskedSettings {
            merchant_code: self.merchant_code.clone(),
            consumer_secret: mask_secret(&self.consumer_secret),
            api_key: mask_api_key(&self.api_key),
            private_key: self
                .private_key
                .as_ref()
                .filter(|key| !key.is_empty())
                .map(|_| PRIVATE_KEY_MASK.to_string()),
            environment: self.environment,
            callback_url: self.callback_url.clone(),
        }
    }
}

/// Builds a [`GatewayConfig`].
///
/// Setters consume the builder and return it, so a partially configured
/// builder can never be observed through a shared reference.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    environment: Environment,
    merchant_code: String,
    consumer_secret: String,
    api_key: String,
    private_key: Option<String>,
    callback_url: Option<String>,
    success_url: Option<String>,
    failure_url: Option<String>,
    verify_hash: bool,
    timeout: Option<Duration>,
    verify_ssl: Option<bool>,
    endpoints: EndpointTable,
}

impl ConfigBuilder {
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn merchant_code(mut self, code: impl Into<String>) -> Self {
        self.merchant_code = code.into();
        self
    }

    pub fn consumer_secret(mut self, secret: impl Into<String>) -> Self {
        self.consumer_secret = secret.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn private_key(mut self, pem: impl Into<String>) -> Self {
        self.private_key = Some(pem.into()).filter(|k| !k.is_empty());
        self
    }

    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn success_url(mut self, url: impl Into<String>) -> Self {
        self.success_url = Some(url.into());
        self
    }

    pub fn failure_url(mut self, url: impl Into<String>) -> Self {
        self.failure_url = Some(url.into());
        self
    }

    pub fn verify_hash(mut self, enabled: bool) -> Self {
        self.verify_hash = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verify_ssl(mut self, enabled: bool) -> Self {
        self.verify_ssl = Some(enabled);
        self
    }

    pub fn endpoints(mut self, environment: Environment, endpoints: Endpoints) -> Self {
        match environment {
            Environment::Sandbox => self.endpoints.sandbox = endpoints,
            Environment::Production => self.endpoints.production = endpoints,
        }
        self
    }

    pub fn build(self) -> GatewayConfig {
        GatewayConfig {
            verify_ssl: self
                .verify_ssl
                .unwrap_or(self.environment == Environment::Production),
            environment: self.environment,
            merchant_code: self.merchant_code,
            consumer_secret: self.consumer_secret,
            api_key: self.api_key,
            private_key: self.private_key,
            callback_url: self
                .callback_url
                .unwrap_or_else(|| DEFAULT_CALLBACK_URL.to_string()),
            success_url: self
                .success_url
                .unwrap_or_else(|| DEFAULT_SUCCESS_URL.to_string()),
            failure_url: self
                .failure_url
                .unwrap_or_else(|| DEFAULT_FAILURE_URL.to_string()),
            verify_hash: self.verify_hash,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            endpoints: self.endpoints,
        }
    }

    /// Like [`ConfigBuilder::build`], but rejects a configuration without credentials.
    pub fn save(self) -> Result<GatewayConfig> {
        let config = self.build();
        config.validate_credentials()?;
        Ok(config)
    }
}

/// A partial credential update, as submitted through the settings surface.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigUpdate {
    pub merchant_code: Option<String>,
    pub consumer_secret: Option<String>,
    pub api_key: Option<String>,
    pub private_key: Option<String>,
    pub environment: Option<Environment>,
    pub callback_url: Option<String>,
}

/// Settings as they may be shown to an operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedSettings {
    pub merchant_code: String,
    pub consumer_secret: String,
    pub api_key: String,
    pub private_key: Option<String>,
    pub environment: Environment,
    pub callback_url: String,
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let visible = chars.len().min(4);
    let hidden = chars.len() - visible;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
    } else {
        "*".repeat(chars.len())
    }
}
