//! client config

use std::time::Duration;

/// Management API client config.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// base url, e.g. `https://cluster1.example.com/`
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// HTTP request timeout, applied per request
    pub request_timeout: Duration,
    /// skip TLS certificate verification
    pub insecure: bool,
    /// records requested per page
    pub page_size: usize,
    /// log request urls and response sizes at debug level
    pub debug: bool,
}

impl ClientConfig {
    /// create new client config for a target host with default parameters.
    pub fn for_host(host: &str) -> Self {
        Self {
            base_url: format!("https://{host}/"),
            username: String::new(),
            password: String::new(),
            request_timeout: Duration::from_secs(30),
            insecure: true,
            page_size: 500,
            debug: false,
        }
    }

    /// set basic auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// set whether invalid certificates are accepted.
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
