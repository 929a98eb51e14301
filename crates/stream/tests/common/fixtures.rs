use cirrus_core::config::StreamConfig;
use cirrus_core::{LogicalFile, PhysicalPart};
use std::net::TcpListener;
use tokio::io::{AsyncRead, AsyncReadExt};

#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Deterministic, position-dependent test bytes.
#[allow(dead_code)]
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// A split file of private parts named `part0`, `part1`, ...
pub struct SplitFile {
    pub file: LogicalFile,
    pub parts: Vec<(String, Vec<u8>)>,
    pub data: Vec<u8>,
}

#[allow(dead_code)]
pub fn split_file(sizes: &[usize]) -> SplitFile {
    let parts: Vec<(String, Vec<u8>)> = sizes
        .iter()
        .enumerate()
        .map(|(i, size)| (format!("part{i}"), pattern(*size, i as u8 * 17 + 1)))
        .collect();
    let file = LogicalFile::new(
        "movie.mkv",
        parts
            .iter()
            .map(|(name, bytes)| PhysicalPart::private(name.clone(), bytes.len() as u64))
            .collect(),
    )
    .expect("non-empty part list");
    let data = parts.iter().flat_map(|(_, bytes)| bytes.clone()).collect();
    SplitFile { file, parts, data }
}

/// Small buffer so tests exercise wraparound and backpressure.
#[allow(dead_code)]
pub fn small_buffer() -> StreamConfig {
    StreamConfig {
        buffer_capacity: 16,
        segment_retries: 3,
    }
}

#[allow(dead_code)]
pub async fn read_all<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await?;
    Ok(out)
}
