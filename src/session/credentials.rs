//! API credentials and the "configured" gate in front of the rest of the session.

use thiserror::Error;

/// Validation failure raised before any external call is attempted.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Please enter both API keys (missing: {})", .missing.join(", "))]
pub struct CredentialsError {
    /// Names of the keys that were empty.
    pub missing: Vec<&'static str>,
}

/// The two keys needed by the pipeline. Never logged and never written to disk.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    gemini_api_key: String,
    llama_cloud_api_key: String,
}

impl Credentials {
    /// Validate and build a credential pair.
    ///
    /// Both keys must contain something other than whitespace; accepted keys are kept
    /// exactly as entered.
    pub fn new(
        gemini_api_key: impl Into<String>,
        llama_cloud_api_key: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let gemini_api_key = gemini_api_key.into();
        let llama_cloud_api_key = llama_cloud_api_key.into();

        let mut missing = Vec::new();
        if gemini_api_key.trim().is_empty() {
            missing.push("gemini_api_key");
        }
        if llama_cloud_api_key.trim().is_empty() {
            missing.push("llama_cloud_api_key");
        }
        if !missing.is_empty() {
            return Err(CredentialsError { missing });
        }

        Ok(Self {
            gemini_api_key,
            llama_cloud_api_key,
        })
    }

    /// Key for the Gemini model and embedding APIs.
    pub fn gemini_api_key(&self) -> &str {
        &self.gemini_api_key
    }

    /// Key for the LlamaParse API.
    pub fn llama_cloud_api_key(&self) -> &str {
        &self.llama_cloud_api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &"<redacted>")
            .field("llama_cloud_api_key", &"<redacted>")
            .finish()
    }
}

/// Credential state of one session.
///
/// Keys survive [`SessionConfig::reset`]; only the configured flag drops, so the user is
/// asked for keys again while the old ones stay in memory until overwritten.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    credentials: Option<Credentials>,
    configured: bool,
}

impl SessionConfig {
    /// A configuration already holding valid credentials.
    pub fn configured_with(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            configured: true,
        }
    }

    /// Whether both keys are set and accepted.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Store a new key pair and flip the configured flag.
    ///
    /// On validation failure nothing changes.
    pub fn set_credentials(
        &mut self,
        gemini_api_key: &str,
        llama_cloud_api_key: &str,
    ) -> Result<(), CredentialsError> {
        let credentials = Credentials::new(gemini_api_key, llama_cloud_api_key)?;
        self.credentials = Some(credentials);
        self.configured = true;
        Ok(())
    }

    /// Drop the configured flag so new keys can be entered.
    pub fn reset(&mut self) {
        self.configured = false;
    }

    /// Active credentials, available only while configured.
    pub fn credentials(&self) -> Option<&Credentials> {
        if self.configured {
            self.credentials.as_ref()
        } else {
            None
        }
    }
}
