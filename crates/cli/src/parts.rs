//! Parsing of command-line part and range arguments.

use anyhow::{Context, Result, bail};
use cirrus_core::{LogicalFile, PhysicalPart};

/// Parse `PATH=SIZE` (private file) or `LINK=SIZE` (public link, any
/// `http://` or `https://` URL) into a part.
pub fn parse_part(arg: &str) -> Result<PhysicalPart> {
    let (source, size) = arg
        .rsplit_once('=')
        .with_context(|| format!("part {arg:?} must look like PATH=SIZE"))?;
    let size: u64 = size
        .trim()
        .parse()
        .with_context(|| format!("part {arg:?} has an invalid size"))?;
    if source.is_empty() {
        bail!("part {arg:?} has an empty path");
    }

    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(PhysicalPart::public(source, size)?)
    } else {
        Ok(PhysicalPart::private(source, size))
    }
}

/// Build the logical file from parts given in order.
pub fn logical_file(name: Option<String>, args: &[String]) -> Result<LogicalFile> {
    let parts = args
        .iter()
        .map(|arg| parse_part(arg))
        .collect::<Result<Vec<_>>>()?;
    match (name, parts.len()) {
        (None, 1) => Ok(LogicalFile::single(parts.into_iter().next().context("no parts")?)),
        (name, _) => {
            let name = name.unwrap_or_else(|| "file".to_string());
            Ok(LogicalFile::new(name, parts)?)
        }
    }
}

/// Parse `START-END`, `START-` or `-` into optional inclusive bounds.
pub fn parse_range(arg: &str) -> Result<(Option<u64>, Option<u64>)> {
    let (start, end) = arg
        .split_once('-')
        .with_context(|| format!("range {arg:?} must look like START-END"))?;
    let parse = |s: &str| -> Result<Option<u64>> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        s.parse()
            .map(Some)
            .with_context(|| format!("range {arg:?} has an invalid bound {s:?}"))
    };
    Ok((parse(start)?, parse(end)?))
}
