use async_trait::async_trait;
use bytes::Bytes;
use cirrus_client::{CloudApi, CloudError, CloudResult, ShardMap, ShardSource, TokenSource};
use cirrus_core::{ByteRange, ShardCategory, ShardEndpoint};
use cirrus_stream::{RangeBody, RangeTransport};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// Scripted misbehaviour for the next request.
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub enum Fault {
    /// Fail before any response.
    Refuse,
    /// Answer with an error status.
    Status(u16),
    /// Deliver this many bytes, then break the connection.
    Truncate(usize),
    /// Answer `200 OK` with the whole object.
    IgnoreRange,
    /// Never answer.
    Hang,
    /// Panic inside the transport.
    Panic,
}

/// In-memory shard storage keyed by the last URL path segment.
#[allow(dead_code)]
pub struct MemoryTransport {
    objects: HashMap<String, Bytes>,
    chunk_size: usize,
    faults: Mutex<VecDeque<Fault>>,
    failing_hosts: Mutex<HashSet<String>>,
    requests: Mutex<Vec<(Url, ByteRange)>>,
}

#[allow(dead_code)]
impl MemoryTransport {
    pub fn new(parts: &[(String, Vec<u8>)]) -> Self {
        Self {
            objects: parts
                .iter()
                .map(|(name, bytes)| (name.clone(), Bytes::from(bytes.clone())))
                .collect(),
            chunk_size: 7,
            faults: Mutex::new(VecDeque::new()),
            failing_hosts: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_fault(&self, fault: Fault) {
        self.faults.lock().unwrap().push_back(fault);
    }

    /// Every request to `host` fails to connect.
    pub fn fail_host(&self, host: &str) {
        self.failing_hosts.lock().unwrap().insert(host.to_string());
    }

    pub fn requests(&self) -> Vec<(Url, ByteRange)> {
        self.requests.lock().unwrap().clone()
    }

    /// Requested ranges as `(start, end)` pairs.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.requests()
            .iter()
            .map(|(_, r)| (r.start(), r.end()))
            .collect()
    }

    fn chunked(&self, data: Bytes, fail_after: Option<usize>) -> cirrus_stream::ByteStream {
        let mut items: Vec<CloudResult<Bytes>> = Vec::new();
        let limit = fail_after.unwrap_or(data.len()).min(data.len());
        let mut offset = 0;
        while offset < limit {
            let end = (offset + self.chunk_size).min(limit);
            items.push(Ok(data.slice(offset..end)));
            offset = end;
        }
        if fail_after.is_some() {
            items.push(Err(CloudError::Connection("connection reset".to_string())));
        }
        Box::pin(futures::stream::iter(items))
    }
}

#[async_trait]
impl RangeTransport for MemoryTransport {
    async fn open(&self, url: Url, range: ByteRange) -> CloudResult<RangeBody> {
        self.requests.lock().unwrap().push((url.clone(), range));

        let host = url.host_str().unwrap_or_default().to_string();
        if self.failing_hosts.lock().unwrap().contains(&host) {
            return Err(CloudError::Connection(format!("{host} unreachable")));
        }

        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
        let object = self
            .objects
            .get(&name)
            .cloned()
            .ok_or_else(|| CloudError::Http {
                status: 404,
                message: format!("no object {name}"),
            })?;

        let fault = self.faults.lock().unwrap().pop_front();
        let slice = object.slice(range.start() as usize..=range.end() as usize);
        match fault {
            None => Ok(RangeBody {
                partial: true,
                body: self.chunked(slice, None),
            }),
            Some(Fault::Refuse) => Err(CloudError::Connection("refused".to_string())),
            Some(Fault::Status(status)) => Err(CloudError::Http {
                status,
                message: "scripted".to_string(),
            }),
            Some(Fault::Truncate(n)) => Ok(RangeBody {
                partial: true,
                body: self.chunked(slice, Some(n)),
            }),
            Some(Fault::IgnoreRange) => Ok(RangeBody {
                partial: false,
                body: self.chunked(object, None),
            }),
            Some(Fault::Panic) => panic!("transport bug"),
            Some(Fault::Hang) => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// Shard source cycling through fixed endpoints, skipping reported ones.
#[allow(dead_code)]
pub struct MockShards {
    endpoints: Vec<ShardEndpoint>,
    pub failures: Mutex<Vec<ShardEndpoint>>,
    resolves: AtomicUsize,
}

#[allow(dead_code)]
impl MockShards {
    pub fn new(urls: &[(ShardCategory, &str)]) -> Self {
        Self {
            endpoints: urls
                .iter()
                .map(|(category, url)| ShardEndpoint::new(*category, *url).unwrap())
                .collect(),
            failures: Mutex::new(Vec::new()),
            resolves: AtomicUsize::new(0),
        }
    }

    pub fn default_hosts() -> Self {
        Self::new(&[
            (ShardCategory::Get, "https://s1.example/get/"),
            (ShardCategory::Get, "https://s2.example/get/"),
            (ShardCategory::WeblinkGet, "https://w1.example/weblink/get/"),
        ])
    }

    pub fn reported(&self) -> Vec<ShardEndpoint> {
        self.failures.lock().unwrap().clone()
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShardSource for MockShards {
    async fn resolve(&self, category: ShardCategory) -> CloudResult<ShardEndpoint> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let failures = self.failures.lock().unwrap();
        let candidates: Vec<&ShardEndpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.category() == category)
            .collect();
        candidates
            .iter()
            .find(|e| !failures.contains(**e))
            .or_else(|| candidates.first())
            .map(|e| (*e).clone())
            .ok_or(CloudError::ShardUnavailable(category))
    }

    fn report_failure(&self, endpoint: &ShardEndpoint) {
        self.failures.lock().unwrap().push(endpoint.clone());
    }
}

/// Token source handing out a fixed token.
#[allow(dead_code)]
pub struct StaticTokens(pub &'static str);

#[async_trait]
impl TokenSource for StaticTokens {
    async fn download_token(&self) -> CloudResult<String> {
        Ok(self.0.to_string())
    }

    fn invalidate_download_token(&self) {}
}

/// Cloud API whose dispatcher rotates through `get` shards.
#[allow(dead_code)]
pub struct RotatingCloudApi {
    pub get_urls: Vec<&'static str>,
    directory_calls: AtomicUsize,
}

#[allow(dead_code)]
impl RotatingCloudApi {
    pub fn new(get_urls: Vec<&'static str>) -> Self {
        Self {
            get_urls,
            directory_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CloudApi for RotatingCloudApi {
    async fn fetch_auth_token(&self) -> CloudResult<String> {
        Ok("auth".to_string())
    }

    async fn fetch_download_token(&self, auth_token: &str) -> CloudResult<String> {
        Ok(format!("dl-{auth_token}"))
    }

    async fn fetch_shard_directory(&self, _auth_token: &str) -> CloudResult<ShardMap> {
        let n = self.directory_calls.fetch_add(1, Ordering::SeqCst);
        let url = self.get_urls[n % self.get_urls.len()];
        let mut shards = ShardMap::new();
        shards.insert(ShardCategory::Get, ShardEndpoint::new(ShardCategory::Get, url)?);
        Ok(shards)
    }
}
