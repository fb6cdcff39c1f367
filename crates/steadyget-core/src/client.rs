//! Connection context for one worker
//!
//! Each worker owns its own `reqwest::Client` so connection pools are never
//! shared between workers. Headers, cookies and proxy settings come from
//! the run's [`EngineConfig`].

use crate::error::SteadygetError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::{Client, ClientBuilder, NoProxy, Proxy};
use steadyget_types::{EngineConfig, ProxySettings};

/// Build a client from the run configuration
pub fn build_client(config: &EngineConfig) -> Result<Client, SteadygetError> {
    let builder = Client::builder()
        .connect_timeout(config.connect_timeout())
        .default_headers(default_headers(config)?);

    apply_proxy(builder, &config.proxy)?
        .build()
        .map_err(|e| SteadygetError::InvalidConfig(e.to_string()))
}

/// Configured headers plus a `Cookie` header assembled from `cookies`
pub fn default_headers(config: &EngineConfig) -> Result<HeaderMap, SteadygetError> {
    let mut headers = HeaderMap::new();

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| SteadygetError::InvalidConfig(format!("invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| SteadygetError::InvalidConfig(format!("invalid value for header {}", name)))?;
        headers.insert(name, value);
    }

    if !config.cookies.is_empty() {
        let cookie = config
            .cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ");
        let value = HeaderValue::from_str(&cookie)
            .map_err(|_| SteadygetError::InvalidConfig("invalid cookie value".to_string()))?;
        headers.insert(COOKIE, value);
    }

    Ok(headers)
}

fn apply_proxy(builder: ClientBuilder, settings: &ProxySettings) -> Result<ClientBuilder, SteadygetError> {
    match settings.mode.as_str() {
        "none" => Ok(builder.no_proxy()),
        // reqwest picks up the environment on its own
        "system" => Ok(builder),
        "manual" => {
            let mut builder = builder;
            if let Some(url) = &settings.http_proxy {
                builder = builder.proxy(configure_proxy(Proxy::http(url), settings)?);
            }
            if let Some(url) = &settings.https_proxy {
                builder = builder.proxy(configure_proxy(Proxy::https(url), settings)?);
            }
            Ok(builder)
        }
        other => Err(SteadygetError::InvalidConfig(format!(
            "unknown proxy mode: {}",
            other
        ))),
    }
}

fn configure_proxy(
    proxy: Result<Proxy, reqwest::Error>,
    settings: &ProxySettings,
) -> Result<Proxy, SteadygetError> {
    let proxy = proxy.map_err(|e| SteadygetError::InvalidConfig(format!("invalid proxy: {}", e)))?;

    let proxy = match &settings.username {
        Some(username) => proxy.basic_auth(username, settings.password.as_deref().unwrap_or("")),
        None => proxy,
    };

    let no_proxy = settings.no_proxy.as_deref().and_then(NoProxy::from_string);
    Ok(proxy.no_proxy(no_proxy))
}
