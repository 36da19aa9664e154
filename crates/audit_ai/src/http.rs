use std::time::Duration;

use audit_core::error::AppError;
use serde_json::Value;

use crate::retry::RetryPolicy;

/// Blocking JSON-over-HTTP client shared by the OpenAI and Qdrant adapters.
///
/// Status 429, any 5xx and transport failures come back as `retryable`
/// errors and are retried by the configured [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;
        Ok(Self {
            base_url,
            headers: Vec::new(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", &format!("Bearer {token}"))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base_url}{path}` and decode the JSON reply.
    /// `code` prefixes every error this call can raise.
    pub fn post_json(&self, code: &str, path: &str, body: &Value) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, path);
        self.retry.run(code, || self.post_once(code, &url, body))
    }

    fn post_once(&self, code: &str, url: &str, body: &Value) -> Result<Value, AppError> {
        let mut req = ureq::post(url).timeout(self.timeout);
        for (name, value) in &self.headers {
            req = req.set(name, value);
        }

        match req.send_json(body.clone()) {
            Ok(resp) => resp.into_json::<Value>().map_err(|e| {
                AppError::new(code, "Failed to decode response body")
                    .with_details(format!("url={url}; err={e}"))
            }),
            Err(ureq::Error::Status(status, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                Err(AppError::new(code, "Request failed")
                    .with_details(format!("url={url}; status={status}; body={}", truncate(&text, 300)))
                    .with_retryable(is_transient_status(status)))
            }
            Err(ureq::Error::Transport(t)) => Err(AppError::new(code, "Failed to reach endpoint")
                .with_details(format!("url={url}; err={t}"))
                .with_retryable(true)),
        }
    }
}

pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn validate_base_url(base_url: &str) -> Result<(), AppError> {
    let invalid = |why: &str| {
        AppError::new("AI_ENDPOINT_INVALID", "Endpoint base URL is not usable")
            .with_details(format!("base_url={base_url}; reason={why}"))
    };

    let rest = base_url
        .strip_prefix("https://")
        .or_else(|| base_url.strip_prefix("http://"))
        .ok_or_else(|| invalid("scheme must be http or https"))?;

    let authority = rest.split('/').next().unwrap_or_default();
    if authority.contains('@') {
        return Err(invalid("credentials must not be embedded in the URL"));
    }

    let (host, port) = match authority.rsplit_once(':') {
        // Bracketed IPv6 without a port, e.g. `[::1]`.
        Some((h, p)) if !p.ends_with(']') => (h, Some(p)),
        _ => (authority, None),
    };
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    if let Some(port) = port {
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => return Err(invalid("port must be 1-65535")),
        }
    }
    Ok(())
}
