//! Per-call provider credentials

/// Credential used to build a provider client for a single call
///
/// Every [`crate::ComputeProvider`] operation takes an
/// `Option<&ProviderCredential>`; `None` selects the adapter's globally
/// configured default client.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredential {
    /// Plaintext API token
    pub token: String,

    /// API endpoint override
    pub endpoint: Option<String>,

    /// Provider-side project reference
    pub project: Option<String>,
}

impl ProviderCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: None,
            project: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

impl std::fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("project", &self.project)
            .finish()
    }
}
