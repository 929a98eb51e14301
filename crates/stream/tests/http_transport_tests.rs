mod common;

use cirrus_client::CloudError;
use cirrus_core::config::StreamConfig;
use cirrus_core::{ByteRange, ShardCategory};
use cirrus_stream::{DownloadStream, HttpRangeTransport, RangeTransport};
use common::*;
use futures::StreamExt;
use httpmock::Method::GET;
use httpmock::MockServer;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

fn transport(timeout: Duration) -> HttpRangeTransport {
    HttpRangeTransport::new(reqwest::Client::new(), timeout)
}

#[tokio::test]
async fn range_request_carries_headers_and_streams_body() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let data = pattern(64, 5);
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/get/video")
            .header("range", "bytes=10-19")
            .header("accept-ranges", "bytes")
            .header("accept", "*/*")
            .header("content-type", "application/octet-stream");
        then.status(206).body(data[10..20].to_vec());
    });

    let url = Url::parse(&server.url("/get/video")).unwrap();
    let response = transport(Duration::from_secs(5))
        .open(url, ByteRange::new(10, 19).unwrap())
        .await
        .unwrap();
    assert!(response.partial);

    let mut body = Vec::new();
    let mut chunks = response.body;
    while let Some(chunk) = chunks.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(body, data[10..20]);
    mock.assert();
}

#[tokio::test]
async fn error_status_is_an_http_error() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/get/missing");
        then.status(404).body("not found");
    });

    let url = Url::parse(&server.url("/get/missing")).unwrap();
    let err = transport(Duration::from_secs(5))
        .open(url, ByteRange::new(0, 9).unwrap())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CloudError::Http {
            status: 404,
            message: "not found".to_string()
        }
    );
}

#[tokio::test]
async fn slow_response_head_times_out() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/get/slow");
        then.status(206).delay(Duration::from_secs(2)).body("late");
    });

    let url = Url::parse(&server.url("/get/slow")).unwrap();
    let err = transport(Duration::from_millis(200))
        .open(url, ByteRange::new(0, 3).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::Timeout(_)));
}

#[tokio::test]
async fn split_file_streams_over_http() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let split = split_file(&[100, 50, 200]);
    let expected = [("part0", 90usize, 99usize), ("part1", 0, 49), ("part2", 0, 10)];
    let mocks: Vec<_> = expected
        .iter()
        .enumerate()
        .map(|(i, (name, start, end))| {
            let body = split.parts[i].1[*start..=*end].to_vec();
            server.mock(|when, then| {
                when.method(GET)
                    .path(format!("/get/{name}"))
                    .header("range", format!("bytes={start}-{end}"));
                then.status(206).body(body);
            })
        })
        .collect();

    let shards = MockShards::new(&[(ShardCategory::Get, server.url("/get/").as_str())]);
    let mut stream = DownloadStream::open_with(
        split.file.clone(),
        Some(90),
        Some(160),
        Arc::new(shards),
        Arc::new(StaticTokens("dl-token")),
        Arc::new(transport(Duration::from_secs(5))),
        &StreamConfig::default(),
    )
    .unwrap();

    assert_eq!(read_all(&mut stream).await.unwrap(), split.data[90..=160]);
    for mock in mocks {
        mock.assert();
    }
}

#[tokio::test]
async fn public_link_request_carries_download_token() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let data = pattern(32, 1);
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/weblink/get/AbCd/clip.mp4")
            .query_param("key", "dl-token")
            .header("range", "bytes=0-31");
        then.status(206).body(data.clone());
    });

    let part = cirrus_core::PhysicalPart::public("https://cloud.example/public/AbCd/clip.mp4", 32)
        .unwrap();
    let shards = MockShards::new(&[(
        ShardCategory::WeblinkGet,
        server.url("/weblink/get/").as_str(),
    )]);
    let mut stream = DownloadStream::open_with(
        cirrus_core::LogicalFile::single(part),
        None,
        None,
        Arc::new(shards),
        Arc::new(StaticTokens("dl-token")),
        Arc::new(transport(Duration::from_secs(5))),
        &StreamConfig::default(),
    )
    .unwrap();

    assert_eq!(read_all(&mut stream).await.unwrap(), data);
    mock.assert();
}

#[tokio::test]
async fn private_part_request_carries_session_cookie() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let data = pattern(16, 3);
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/get/part0")
            .header("cookie", "Mpop=abc");
        then.status(206).body(data.clone());
    });

    let config = cirrus_core::config::ClientConfig {
        api_base_url: server.url("/api/v2"),
        ..Default::default()
    };
    let http = cirrus_client::http::build_http_client(&config, Some("Mpop=abc"), None).unwrap();
    let split = split_file(&[16]);
    let shards = MockShards::new(&[(ShardCategory::Get, server.url("/get/").as_str())]);
    let mut stream = DownloadStream::open_with(
        split.file.clone(),
        None,
        None,
        Arc::new(shards),
        Arc::new(StaticTokens("dl-token")),
        Arc::new(HttpRangeTransport::new(http, Duration::from_secs(5))),
        &StreamConfig::default(),
    )
    .unwrap();

    assert_eq!(read_all(&mut stream).await.unwrap(), split.data);
    mock.assert();
}
