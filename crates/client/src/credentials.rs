//! Auth and download token caches.

use crate::api::CloudApi;
use crate::cache::ExpiringValue;
use crate::error::CloudResult;
use async_trait::async_trait;
use cirrus_core::config::CacheConfig;
use std::sync::{Arc, Weak};

/// Download token provider used when building public-link URLs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn download_token(&self) -> CloudResult<String>;

    /// Force the next [`download_token`](Self::download_token) to fetch anew.
    fn invalidate_download_token(&self);
}

/// Per-account token caches.
///
/// The download token is derived from the auth token, so refreshing or
/// invalidating the auth token also drops the cached download token.
pub struct Credentials {
    auth: Arc<ExpiringValue<String>>,
    download: ExpiringValue<String>,
}

impl Credentials {
    pub fn new(api: Arc<dyn CloudApi>, config: &CacheConfig) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Credentials>| {
            let auth = {
                let api = api.clone();
                let this = this.clone();
                Arc::new(ExpiringValue::new("auth_token", config.auth_token_ttl(), move || {
                    let api = api.clone();
                    let this = this.clone();
                    async move {
                        let token = api.fetch_auth_token().await?;
                        if let Some(credentials) = this.upgrade() {
                            credentials.download.clear();
                        }
                        Ok(token)
                    }
                }))
            };

            let download = {
                let auth = auth.clone();
                ExpiringValue::new("download_token", config.download_token_ttl(), move || {
                    let api = api.clone();
                    let auth = auth.clone();
                    async move {
                        let auth_token = auth.get().await?;
                        api.fetch_download_token(&auth_token).await
                    }
                })
            };

            Self { auth, download }
        })
    }

    pub async fn auth_token(&self) -> CloudResult<String> {
        self.auth.get().await
    }

    pub async fn download_token(&self) -> CloudResult<String> {
        self.download.get().await
    }

    pub fn invalidate_auth_token(&self) {
        self.auth.expire();
        self.download.expire();
    }

    pub fn invalidate_download_token(&self) {
        self.download.expire();
    }

    /// Cached tokens, without fetching: `(auth, download)`.
    pub fn peek(&self) -> (Option<String>, Option<String>) {
        (self.auth.peek(), self.download.peek())
    }
}

#[async_trait]
impl TokenSource for Credentials {
    async fn download_token(&self) -> CloudResult<String> {
        Credentials::download_token(self).await
    }

    fn invalidate_download_token(&self) {
        Credentials::invalidate_download_token(self);
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (auth, download) = self.peek();
        f.debug_struct("Credentials")
            .field("auth_cached", &auth.is_some())
            .field("download_cached", &download.is_some())
            .finish()
    }
}
