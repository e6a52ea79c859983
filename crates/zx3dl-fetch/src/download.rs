//! Resumable HTTP transfers with verification
//!
//! A transfer streams into `<dest>.part` and is renamed onto `<dest>` only
//! after the size and digest checks pass. When a partial file is already
//! present the engine asks for the missing tail with a `Range` header; a
//! `200` answer means the server ignored the range and the file is rewritten
//! from the first byte.
//!
//! Each transfer runs under the configured `download` retry policy:
//! connection failures, timeouts, 408/425/429 and 5xx answers are retried
//! with exponential backoff, other 4xx answers and integrity failures are not.

use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;
use zx3dl_core::retry::{HttpStatusPredicate, RetryExecutor, TracingObserver};
use zx3dl_core::types::{file_checksum, Checksum, RetryPolicy, RuntimeConfig};

use crate::error::{FetchError, Result};

/// What to fetch and what the bytes must look like
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub url: &'a str,
    /// Human readable name for logs and progress bars
    pub label: &'a str,
    pub expected_size: Option<u64>,
    pub expected_hash: Option<&'a Checksum>,
    /// Total announced by the server during an earlier, interrupted transfer
    pub known_total: Option<u64>,
}

impl<'a> TransferRequest<'a> {
    pub fn new(url: &'a str, label: &'a str) -> Self {
        Self {
            url,
            label,
            expected_size: None,
            expected_hash: None,
            known_total: None,
        }
    }

    pub fn with_expected(mut self, size: Option<u64>, hash: Option<&'a Checksum>) -> Self {
        self.expected_size = size;
        self.expected_hash = hash;
        self
    }

    pub fn known_total(mut self, total: Option<u64>) -> Self {
        self.known_total = total;
        self
    }
}

/// A finished transfer
#[derive(Debug, Clone)]
pub struct Transfer {
    pub path: PathBuf,
    pub size: u64,
    /// Whether the final attempt continued an existing partial file
    pub resumed: bool,
    /// Number of attempts the retry policy used
    pub attempts: u32,
}

/// HTTP download engine shared by catalog documents and artifacts
#[derive(Clone)]
pub struct DownloadEngine {
    client: reqwest::Client,
    retry_policy: RetryPolicy,
    progress: Option<MultiProgress>,
}

impl DownloadEngine {
    /// Build an engine from the runtime configuration
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.network.user_agent)
            .connect_timeout(Duration::from_secs(config.network.connect_timeout_secs))
            .timeout(Duration::from_secs(config.network.download_timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self::with_client(client, config.retry_policy("download")))
    }

    pub fn with_client(client: reqwest::Client, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            retry_policy,
            progress: None,
        }
    }

    /// Draw one progress bar per transfer inside `progress`
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Where an interrupted transfer to `dest` keeps its bytes
    pub fn partial_path(dest: &Path) -> PathBuf {
        let mut name = dest.as_os_str().to_os_string();
        name.push(".part");
        PathBuf::from(name)
    }

    /// Fetch `request.url` into `dest`, retrying transient failures
    pub async fn fetch(&self, request: &TransferRequest<'_>, dest: &Path) -> Result<Transfer> {
        let executor = RetryExecutor::<FetchError, _, _>::new(self.retry_policy.clone())
            .with_predicate(HttpStatusPredicate::default_http())
            .with_observer(TracingObserver::new(format!("download {}", request.label)));

        let attempts = AtomicU32::new(0);
        executor
            .execute(|| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                self.fetch_once(request, dest, attempt)
            })
            .await
            .map_err(|err| {
                debug!("Giving up on {} after {} attempt(s)", request.label, err.attempts());
                err.into_source()
            })
    }

    async fn fetch_once(
        &self,
        request: &TransferRequest<'_>,
        dest: &Path,
        attempt: u32,
    ) -> Result<Transfer> {
        let url = request.url;
        let part = Self::partial_path(dest);
        let total_hint = request.expected_size.or(request.known_total);

        let mut start_pos = fs::metadata(&part).map(|m| m.len()).unwrap_or(0);
        if start_pos > 0 && total_hint.is_some_and(|total| start_pos >= total) {
            debug!("Discarding oversized partial file {}", part.display());
            remove_if_exists(&part)?;
            start_pos = 0;
        }

        let mut builder = self.client.get(url);
        if start_pos > 0 {
            debug!("Resuming {} from byte {}", request.label, start_pos);
            builder = builder.header(RANGE, format!("bytes={}-", start_pos));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;
        let status = response.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE && start_pos > 0 {
            remove_if_exists(&part)?;
            return Err(FetchError::RangeRejected {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let (resumed, total) = if status == StatusCode::PARTIAL_CONTENT && start_pos > 0 {
            match parse_content_range(response.headers().get(CONTENT_RANGE)) {
                Some((range_start, total)) if range_start == start_pos => {
                    (true, total.or(total_hint))
                }
                _ => {
                    remove_if_exists(&part)?;
                    return Err(FetchError::RangeRejected {
                        url: url.to_string(),
                    });
                }
            }
        } else {
            if start_pos > 0 {
                debug!("Server ignored range for {}, restarting", request.label);
            }
            start_pos = 0;
            (false, response.content_length().or(total_hint))
        };

        let progress = self.progress_bar(request.label, total, start_pos, attempt);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(resumed)
            .truncate(!resumed)
            .open(&part)
            .map_err(|e| FetchError::filesystem(&part, e))?;

        let mut downloaded = start_pos;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
            file.write_all(&chunk)
                .map_err(|e| FetchError::filesystem(&part, e))?;
            downloaded += chunk.len() as u64;

            if let Some(pb) = &progress {
                pb.set_position(downloaded);
            }
        }
        file.sync_all()
            .map_err(|e| FetchError::filesystem(&part, e))?;
        drop(file);

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let size = fs::metadata(&part)
            .map_err(|e| FetchError::filesystem(&part, e))?
            .len();
        match self.verify(request, &part, size, total) {
            // The stored prefix was bad; the partial file is gone, so the
            // next attempt starts from the first byte
            Err(FetchError::Integrity { .. }) if resumed => {
                return Err(FetchError::RangeRejected {
                    url: url.to_string(),
                })
            }
            other => other?,
        }

        remove_if_exists(dest)?;
        fs::rename(&part, dest).map_err(|e| FetchError::filesystem(dest, e))?;

        Ok(Transfer {
            path: dest.to_path_buf(),
            size,
            resumed,
            attempts: attempt,
        })
    }

    /// Size first, then digest. Fewer bytes than the server announced is a
    /// broken transfer and keeps its bytes for the next attempt; any other
    /// mismatch is an integrity failure and the partial file is removed.
    fn verify(
        &self,
        request: &TransferRequest<'_>,
        part: &Path,
        size: u64,
        total: Option<u64>,
    ) -> Result<()> {
        if let Some(total) = total {
            if size < total {
                return Err(FetchError::network(
                    request.url,
                    format!("transfer ended after {} of {} bytes", size, total),
                ));
            }
        }

        if let Some(expected) = request.expected_size.or(total) {
            if size != expected {
                remove_if_exists(part)?;
                return Err(FetchError::integrity(
                    request.label,
                    format!("size mismatch: expected {}, got {}", expected, size),
                ));
            }
        }

        if let Some(hash) = request.expected_hash {
            let actual =
                file_checksum(part, hash.algorithm).map_err(|e| FetchError::filesystem(part, e))?;
            if !hash.matches(&actual) {
                remove_if_exists(part)?;
                return Err(FetchError::integrity(
                    request.label,
                    format!("{} mismatch: expected {}, got {}", hash.algorithm, hash.value, actual),
                ));
            }
        }

        Ok(())
    }

    fn progress_bar(
        &self,
        label: &str,
        total: Option<u64>,
        position: u64,
        attempt: u32,
    ) -> Option<ProgressBar> {
        let multi = self.progress.as_ref()?;
        let pb = multi.add(ProgressBar::new(total.unwrap_or(0)));
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{msg:30!} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        if attempt > 1 {
            pb.set_message(format!("{} (attempt {})", label, attempt));
        } else {
            pb.set_message(label.to_string());
        }
        pb.set_position(position);
        Some(pb)
    }
}

/// Parse `bytes <start>-<end>/<total>` into `(start, total)`
fn parse_content_range(value: Option<&reqwest::header::HeaderValue>) -> Option<(u64, Option<u64>)> {
    let value = value?.to_str().ok()?;
    let content_range = value.trim().strip_prefix("bytes")?.trim();
    let (range, total) = content_range.split_once('/')?;
    let (start, _end) = range.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let total = total.trim().parse().ok();
    Some((start, total))
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FetchError::filesystem(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_content_range() {
        let value = HeaderValue::from_static("bytes 100-199/200");
        assert_eq!(parse_content_range(Some(&value)), Some((100, Some(200))));

        let unknown_total = HeaderValue::from_static("bytes 5-9/*");
        assert_eq!(parse_content_range(Some(&unknown_total)), Some((5, None)));

        let garbage = HeaderValue::from_static("items 1-2/3");
        assert_eq!(parse_content_range(Some(&garbage)), None);
        assert_eq!(parse_content_range(None), None);
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        let part = DownloadEngine::partial_path(Path::new("/cache/items/x/core.zx3"));
        assert_eq!(part, PathBuf::from("/cache/items/x/core.zx3.part"));
    }
}
