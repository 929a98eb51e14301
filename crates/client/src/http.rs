//! Shared reqwest client construction.
//!
//! One client is built per account so every request made on its behalf
//! (API calls and segment downloads) carries the same session cookies,
//! proxy and user agent.

use crate::error::{CloudError, CloudResult};
use cirrus_core::config::ClientConfig;
use reqwest::cookie::Jar;
use std::sync::Arc;
use url::{Host, Url};

/// Build the HTTP client for one account.
///
/// `session_cookie` is a raw `Cookie` header value (`a=1; b=2`). Each pair
/// is stored for `cookie_domain`, or for the parent domain of the API host
/// when none is given, so segment requests to shard hosts carry the session
/// too. No client-wide total timeout is set: long segment bodies are bounded
/// per chunk by the caller instead.
pub fn build_http_client(
    config: &ClientConfig,
    session_cookie: Option<&str>,
    cookie_domain: Option<&str>,
) -> CloudResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .connect_timeout(config.request_timeout());

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(
            reqwest::Proxy::all(proxy)
                .map_err(|e| CloudError::Configuration(format!("invalid proxy {proxy}: {e}")))?,
        );
    }

    if let Some(cookie) = session_cookie {
        let base = Url::parse(&config.api_base_url)?;
        builder = builder.cookie_provider(session_jar(cookie, &base, cookie_domain)?);
    }

    builder.build().map_err(CloudError::from)
}

fn session_jar(cookie: &str, url: &Url, domain: Option<&str>) -> CloudResult<Arc<Jar>> {
    let domain = match domain {
        Some(domain) => Some(checked_domain(domain, url)?),
        None => parent_domain(url),
    };
    let jar = Jar::default();
    for pair in cookie.split(';').map(str::trim).filter(|p| p.contains('=')) {
        match &domain {
            Some(domain) => jar.add_cookie_str(&format!("{pair}; Domain={domain}; Path=/"), url),
            None => jar.add_cookie_str(pair, url),
        }
    }
    Ok(Arc::new(jar))
}

/// Parent of the API host (`cloud.example.com` -> `example.com`), the host
/// itself for two-label names, `None` (host-only) for IPs and single labels.
fn parent_domain(url: &Url) -> Option<String> {
    let Some(Host::Domain(host)) = url.host() else {
        return None;
    };
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    match labels.len() {
        0 | 1 => None,
        2 => Some(labels.join(".")),
        _ => Some(labels[1..].join(".")),
    }
}

fn checked_domain(domain: &str, url: &Url) -> CloudResult<String> {
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if domain.is_empty() || !(host == domain || host.ends_with(&format!(".{domain}"))) {
        return Err(CloudError::Configuration(format!(
            "cookie domain {domain:?} does not cover API host {host:?}"
        )));
    }
    Ok(domain)
}
