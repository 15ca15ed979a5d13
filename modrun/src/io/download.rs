//! HTTPS download of single prebuilt files.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

pub trait Fetcher {
    /// Download `url` to `dest`, replacing any existing file.
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking `reqwest` fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("build http client")?;
        let mut response = client.get(url).send().with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            );
        }

        let written = write_atomically(&mut response, dest)?;
        debug!(bytes = written, "download complete");
        Ok(())
    }
}

/// Stream `reader` into `dest` so that `dest` is either untouched or
/// complete. The temporary file lives next to `dest` and is removed when any
/// step fails.
pub fn write_atomically(reader: &mut impl Read, dest: &Path) -> Result<u64> {
    let parent = dest
        .parent()
        .ok_or_else(|| anyhow!("destination has no parent: {}", dest.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("create directory {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temporary file in {}", parent.display()))?;
    let written = io::copy(reader, &mut tmp)
        .with_context(|| format!("write {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync {}", tmp.path().display()))?;
    tmp.persist(dest)
        .map_err(|err| err.error)
        .with_context(|| format!("replace {}", dest.display()))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStream {
        sent: bool,
    }

    impl Read for BrokenStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            self.sent = true;
            let chunk = b"partial syso";
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn replaces_destination_with_complete_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("race").join("race_linux_arm64.syso");
        fs::create_dir_all(dest.parent().expect("parent")).expect("mkdir");
        fs::write(&dest, "stale").expect("seed");

        let written = write_atomically(&mut &b"fresh runtime"[..], &dest).expect("write");

        assert_eq!(written, 13);
        assert_eq!(fs::read_to_string(&dest).expect("read"), "fresh runtime");
        assert_eq!(entries(dest.parent().expect("parent")), vec!["race_linux_arm64.syso"]);
    }

    #[test]
    fn failed_stream_leaves_no_trace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("race_linux_s390x.syso");

        let err = write_atomically(&mut BrokenStream { sent: false }, &dest)
            .expect_err("stream fails midway");

        assert!(format!("{err:#}").contains("connection reset"), "{err:#}");
        assert!(!dest.exists());
        assert!(entries(dir.path()).is_empty(), "{:?}", entries(dir.path()));
    }

    #[test]
    fn failed_stream_keeps_previous_destination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("race_linux_ppc64le.syso");
        fs::write(&dest, "previous").expect("seed");

        write_atomically(&mut BrokenStream { sent: false }, &dest).expect_err("stream fails");

        assert_eq!(fs::read_to_string(&dest).expect("read"), "previous");
        assert_eq!(entries(dir.path()), vec!["race_linux_ppc64le.syso"]);
    }
}
