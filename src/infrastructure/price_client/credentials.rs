//! Credentials providers for the price history service

use std::env;
use std::fmt;

use crate::shared::errors::PriceClientError;

/// Bearer credentials presented to the price history service
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_key: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials").field("api_key", &"<redacted>").finish()
    }
}

/// Source of credentials, consulted each time a client is built
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Result<ApiCredentials, PriceClientError>;
}

/// Fixed credentials
pub struct StaticCredentials {
    credentials: ApiCredentials,
}

impl StaticCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credentials: ApiCredentials {
                api_key: api_key.into(),
            },
        }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Result<ApiCredentials, PriceClientError> {
        Ok(self.credentials.clone())
    }
}

/// Reads the API key from an environment variable on every build
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub const DEFAULT_VAR: &'static str = "SPOTWATCH_API_KEY";

    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

impl CredentialsProvider for EnvCredentials {
    fn credentials(&self) -> Result<ApiCredentials, PriceClientError> {
        match env::var(&self.var) {
            Ok(api_key) if !api_key.trim().is_empty() => Ok(ApiCredentials { api_key }),
            Ok(_) => Err(PriceClientError::Credentials(format!("{} is empty", self.var))),
            Err(e) => Err(PriceClientError::Credentials(format!("{}: {}", self.var, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_credentials() {
        let provider = StaticCredentials::new("key-123");
        assert_eq!(provider.credentials().unwrap().api_key, "key-123");
    }

    #[test]
    fn test_missing_env_var_is_credentials_error() {
        let provider = EnvCredentials::new("SPOTWATCH_TEST_UNSET_VARIABLE_7f3a");
        assert!(matches!(provider.credentials(), Err(PriceClientError::Credentials(_))));
    }

    #[test]
    fn test_debug_output_hides_key() {
        let credentials = ApiCredentials { api_key: "secret".to_string() };
        assert!(!format!("{:?}", credentials).contains("secret"));
    }
}
