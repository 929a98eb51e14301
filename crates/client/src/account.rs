//! Account context and the process-wide account registry.

use crate::api::{CloudApi, HttpCloudApi};
use crate::blacklist::ShardBlacklist;
use crate::credentials::{Credentials, TokenSource};
use crate::directory::ShardDirectory;
use crate::error::{CloudError, CloudResult};
use crate::http::build_http_client;
use crate::resolver::{ShardResolver, ShardSource};
use cirrus_core::config::AppConfig;
use cirrus_core::{ShardCategory, ShardEndpoint};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::info;

/// One authenticated session with its token caches, shard directory and
/// blacklist, shared by every stream opened under it.
pub struct Account {
    login: String,
    http: reqwest::Client,
    credentials: Arc<Credentials>,
    directory: Arc<ShardDirectory>,
    blacklist: Arc<ShardBlacklist>,
    resolver: Arc<ShardResolver>,
    config: AppConfig,
}

impl Account {
    /// Build an account from configuration using the HTTP cloud API.
    pub fn connect(config: &AppConfig) -> CloudResult<Arc<Self>> {
        config.validate()?;
        let (login, cookie) = config
            .account
            .credentials()
            .map_err(CloudError::Configuration)?;
        let http = build_http_client(
            &config.client,
            Some(cookie),
            config.account.cookie_domain.as_deref(),
        )?;
        let api = HttpCloudApi::new(
            http.clone(),
            &config.client.api_base_url,
            config.client.request_timeout(),
        )?;
        info!(login, api = %config.client.api_base_url, "account context created");
        Ok(Self::with_api(login, http, Arc::new(api), config))
    }

    /// Build an account over any [`CloudApi`].
    pub fn with_api(
        login: impl Into<String>,
        http: reqwest::Client,
        api: Arc<dyn CloudApi>,
        config: &AppConfig,
    ) -> Arc<Self> {
        let credentials = Credentials::new(api.clone(), &config.cache);
        let directory = Arc::new(ShardDirectory::new(
            api,
            credentials.clone(),
            config.cache.shard_directory_ttl(),
        ));
        let blacklist = Arc::new(ShardBlacklist::new(config.shards.ban_window()));
        let resolver = Arc::new(ShardResolver::new(
            directory.clone(),
            blacklist.clone(),
            credentials.clone(),
            &config.shards,
        ));
        Arc::new(Self {
            login: login.into(),
            http,
            credentials,
            directory,
            blacklist,
            resolver,
            config: config.clone(),
        })
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    /// Client carrying the session cookies, proxy and user agent.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    pub fn directory(&self) -> &Arc<ShardDirectory> {
        &self.directory
    }

    pub fn blacklist(&self) -> &Arc<ShardBlacklist> {
        &self.blacklist
    }

    pub fn shard_source(&self) -> Arc<dyn ShardSource> {
        self.resolver.clone()
    }

    pub fn token_source(&self) -> Arc<dyn TokenSource> {
        self.credentials.clone()
    }

    /// Resolve a healthy shard for `category`, with failover.
    pub async fn resolve_shard(&self, category: ShardCategory) -> CloudResult<ShardEndpoint> {
        self.resolver.resolve(category).await
    }

    pub fn ban_shard(&self, endpoint: &ShardEndpoint) {
        self.resolver.report_failure(endpoint);
    }

    pub async fn download_token(&self) -> CloudResult<String> {
        self.credentials.download_token().await
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("login", &self.login)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Live accounts keyed by login.
///
/// Opening several streams for the same login shares one context, and with
/// it the caches and blacklist.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: DashMap<String, Arc<Account>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The account configured in `config`, connecting it on first use.
    pub fn get_or_connect(&self, config: &AppConfig) -> CloudResult<Arc<Account>> {
        let (login, _) = config
            .account
            .credentials()
            .map_err(CloudError::Configuration)?;
        self.get_or_try_create(login, || Account::connect(config))
    }

    /// The account for `login`, creating it with `create` if absent.
    ///
    /// `create` runs at most once per login even under concurrent callers.
    pub fn get_or_try_create<F>(&self, login: &str, create: F) -> CloudResult<Arc<Account>>
    where
        F: FnOnce() -> CloudResult<Arc<Account>>,
    {
        match self.accounts.entry(login.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let account = create()?;
                entry.insert(account.clone());
                Ok(account)
            }
        }
    }

    pub fn get(&self, login: &str) -> Option<Arc<Account>> {
        self.accounts.get(login).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, login: &str) -> Option<Arc<Account>> {
        self.accounts.remove(login).map(|(_, account)| account)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
