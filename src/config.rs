use std::env;
use std::fmt;
use std::time::Duration;

use crate::retry::RetryConfig;

/// Default E-utilities base URL
pub const DEFAULT_EUTILS_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
/// Default iCite base URL
pub const DEFAULT_ICITE_URL: &str = "https://icite.od.nih.gov";
/// Default PubTator3 API base URL
pub const DEFAULT_PUBTATOR_URL: &str = "https://www.ncbi.nlm.nih.gov/research/pubtator3-api";
/// Default PMC ID converter URL
pub const DEFAULT_IDCONV_URL: &str = "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/";
/// Default PMC Open Access service URL
pub const DEFAULT_OA_URL: &str = "https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi";

const DEFAULT_TOOL: &str = "pubmed-batch";

/// NCBI API key
///
/// Passed explicitly to every adapter for the duration of a call. `Debug`
/// never prints the key itself.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Base URLs of the upstream services
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceUrls {
    pub eutils: String,
    pub icite: String,
    pub pubtator: String,
    pub idconv: String,
    pub oa: String,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            eutils: DEFAULT_EUTILS_URL.to_string(),
            icite: DEFAULT_ICITE_URL.to_string(),
            pubtator: DEFAULT_PUBTATOR_URL.to_string(),
            idconv: DEFAULT_IDCONV_URL.to_string(),
            oa: DEFAULT_OA_URL.to_string(),
        }
    }
}

impl ServiceUrls {
    /// Point every service at one host, as used with a local mock server.
    ///
    /// Paths mirror the production layout under `base`.
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            eutils: format!("{base}/entrez/eutils"),
            icite: base.to_string(),
            pubtator: format!("{base}/research/pubtator3-api"),
            idconv: format!("{base}/pmc/utils/idconv/v1.0/"),
            oa: format!("{base}/pmc/utils/oa/oa.fcgi"),
        }
    }
}

/// Configuration shared by every retrieval call made through one `Retriever`
///
/// # Example
///
/// ```
/// use pubmed_batch::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_api_key("your_api_key_here")
///     .with_email("researcher@university.edu")
///     .with_timeout_seconds(60);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// NCBI API key, raises the permitted request rate from 3 to 10 per second
    pub api_key: Option<ApiKey>,
    /// Contact email sent with NCBI requests
    pub email: Option<String>,
    /// Tool name sent with NCBI requests
    pub tool: Option<String>,
    /// Custom user agent string
    pub user_agent: Option<String>,
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// Retry policy for the identifier-record fetch
    pub retry_config: RetryConfig,
    /// Upstream service locations
    pub urls: ServiceUrls,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            email: None,
            tool: None,
            user_agent: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
            urls: ServiceUrls::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `NCBI_API_KEY`, `NCBI_EMAIL` and `NCBI_TOOL`
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(key) = non_blank_var("NCBI_API_KEY") {
            config = config.with_api_key(key);
        }
        if let Some(email) = non_blank_var("NCBI_EMAIL") {
            config = config.with_email(email);
        }
        if let Some(tool) = non_blank_var("NCBI_TOOL") {
            config = config.with_tool(tool);
        }
        config
    }

    pub fn with_api_key(mut self, api_key: impl Into<ApiKey>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout_seconds(self, seconds: u64) -> Self {
        self.with_timeout(Duration::from_secs(seconds))
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn with_urls(mut self, urls: ServiceUrls) -> Self {
        self.urls = urls;
        self
    }

    /// Route every upstream service to `base`
    pub fn with_base_url(self, base: &str) -> Self {
        self.with_urls(ServiceUrls::all_at(base))
    }

    pub fn effective_user_agent(&self) -> String {
        match &self.user_agent {
            Some(agent) => agent.clone(),
            None => format!(
                "{}/{}",
                self.effective_tool(),
                env!("CARGO_PKG_VERSION")
            ),
        }
    }

    pub fn effective_tool(&self) -> &str {
        self.tool.as_deref().unwrap_or(DEFAULT_TOOL)
    }

    /// Query parameters identifying the caller to NCBI services
    ///
    /// `api_key` is the key in force for the current call, which may differ
    /// from the configured one.
    pub fn build_api_params(&self, api_key: Option<&ApiKey>) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(key) = api_key {
            params.push(("api_key".to_string(), key.as_str().to_string()));
        }
        if let Some(email) = &self.email {
            params.push(("email".to_string(), email.clone()));
        }
        params.push(("tool".to_string(), self.effective_tool().to_string()));

        params
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Append URL-encoded query parameters to `url`
pub(crate) fn append_params(url: &mut String, params: &[(String, String)]) {
    for (key, value) in params {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
}
