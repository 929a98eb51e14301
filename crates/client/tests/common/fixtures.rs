use cirrus_core::config::AppConfig;
use cirrus_core::{ShardCategory, ShardEndpoint};
use std::net::TcpListener;

#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Configuration with a complete account and default policies.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.account.login = Some("user@example.com".to_string());
    config.account.session_cookie = Some("Mpop=session".to_string());
    config
}

#[allow(dead_code)]
pub fn get_shard(url: &str) -> ShardEndpoint {
    ShardEndpoint::new(ShardCategory::Get, url).expect("valid shard url")
}
