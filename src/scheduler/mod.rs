//! Download scheduler: bounded-concurrency artifact fetcher with progress
//! events, retries and checksum verification, per spec §4.6.
//!
//! Grounded in the teacher's `PackageInstaller`/`utils_ext::performance`
//! (a `Semaphore`-bounded `JoinSet` of download tasks, a `sha2::Sha256`
//! integrity check), generalized per the §9 redesign flags: multiple digest
//! algorithms, an explicit bounded progress channel rather than a direct
//! callback, exponential backoff with full jitter on `Transient` failures,
//! and cooperative cancellation via `CancellationToken`.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::http::{HttpError, SharedClients};
use crate::models::artifact::{Checksum, DigestAlgo};
use crate::models::ecosystem::EcosystemKind;
use crate::models::failure::FailureRecord;
use crate::models::resolved_package::ResolvedPackage;
use crate::util::backoff::jittered_delay;
use crate::util::fs::sanitize_filename;

const MAX_RETRIES: u32 = 3;
/// Progress events are emitted at this cadence at minimum, per spec §4.6.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(300);
/// Terminal events are never dropped; progress events are, so a slow
/// consumer never backpressures the scheduler (spec §9: "never blocks on a
/// slow consumer ... bounded channel with drop-oldest semantics for
/// progress, never for terminal events").
const PROGRESS_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Progress {
        item_id: String,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        percent: Option<f64>,
        bytes_per_second: f64,
    },
    Completed { item_id: String },
    Failed { item_id: String, kind: String, message: String },
    Cancelled { item_id: String },
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub succeeded: Vec<ResolvedPackage>,
    pub failed: Vec<FailureRecord>,
    pub total_bytes: u64,
}

/// `download(artifacts, outputDir, onProgress) -> {success[], failed[], totalBytes}`,
/// per spec §4.6. `concurrency` is the counting-semaphore width (default
/// 4-8 per spec; callers pass `EngineOptions.common.concurrency`).
pub async fn download(
    packages: Vec<ResolvedPackage>,
    output_dir: &Path,
    concurrency: usize,
    http: &SharedClients,
    progress: Option<mpsc::Sender<ProgressEvent>>,
    cancellation: CancellationToken,
) -> std::io::Result<DownloadOutcome> {
    tokio::fs::create_dir_all(output_dir).await?;

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = tokio::task::JoinSet::new();

    for package in packages {
        let semaphore = semaphore.clone();
        let http = http.clone();
        let output_dir = output_dir.to_path_buf();
        let progress = progress.clone();
        let cancellation = cancellation.clone();

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
            download_one(package, &output_dir, &http, progress, cancellation).await
        });
    }

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    let mut total_bytes = 0u64;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(ItemResult::Success(package, bytes)) => {
                total_bytes += bytes;
                succeeded.push(package);
            }
            Ok(ItemResult::Failure(record)) => failed.push(record),
            Err(join_err) => {
                failed.push(FailureRecord::new("unknown", EcosystemKind::Pypi, "Cancelled", join_err.to_string()));
            }
        }
    }

    Ok(DownloadOutcome { succeeded, failed, total_bytes })
}

enum ItemResult {
    Success(ResolvedPackage, u64),
    Failure(FailureRecord),
}

async fn download_one(
    mut package: ResolvedPackage,
    output_dir: &Path,
    http: &SharedClients,
    progress: Option<mpsc::Sender<ProgressEvent>>,
    cancellation: CancellationToken,
) -> ItemResult {
    let item_id = package.identifier();
    let package_key = package.package_key();

    let Some(artifact) = package.artifact.clone() else {
        return ItemResult::Failure(FailureRecord::new(package_key, package.kind, "ConfigError", "resolved package has no artifact to download"));
    };

    if cancellation.is_cancelled() {
        emit(&progress, ProgressEvent::Cancelled { item_id }).await;
        return ItemResult::Failure(FailureRecord::new(package_key, package.kind, "Cancelled", "download cancelled before starting"));
    }

    let filename = sanitize_filename(&artifact.filename);
    let final_path = output_dir.join(&filename);
    let temp_path = output_dir.join(format!("{filename}.partial"));

    let mut attempt = 0;
    let result = loop {
        match stream_to_disk(&artifact.url, &temp_path, http, &progress, &item_id, artifact.size_bytes, &cancellation).await {
            Ok(bytes_written) => break Ok(bytes_written),
            Err(DownloadError::Cancelled) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                emit(&progress, ProgressEvent::Cancelled { item_id: item_id.clone() }).await;
                return ItemResult::Failure(FailureRecord::new(package_key, package.kind, "Cancelled", "download cancelled"));
            }
            Err(DownloadError::Transient(detail)) if attempt < MAX_RETRIES => {
                attempt += 1;
                let jitter_seed = (attempt as f64 * 0.61) % 1.0;
                let delay = jittered_delay(attempt - 1, jitter_seed);
                tracing::warn!(item = %item_id, attempt, detail, ?delay, "retrying transient download failure");
                tokio::time::sleep(delay).await;
            }
            Err(DownloadError::Transient(detail)) => {
                break Err(FailureRecord::new(package_key.clone(), package.kind, "NetworkFailure", format!("failed after {} attempts: {detail}", MAX_RETRIES + 1)));
            }
            Err(DownloadError::Fatal(detail)) => {
                break Err(FailureRecord::new(package_key.clone(), package.kind, "ProtocolError", detail));
            }
        }
    };

    let (joined_digests, bytes_written) = match result {
        Ok(written) => written,
        Err(record) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
            emit(&progress, ProgressEvent::Failed { item_id: item_id.clone(), kind: record.kind.clone(), message: record.message.clone() }).await;
            return ItemResult::Failure(record);
        }
    };

    if let Some(checksum) = &artifact.checksum {
        if !verify_checksum(&joined_digests, checksum) {
            let _ = tokio::fs::remove_file(&temp_path).await;
            let actual = find_digest(&joined_digests, checksum.algo).unwrap_or_default();
            let record = FailureRecord::new(
                package_key.clone(),
                package.kind,
                "ChecksumMismatch",
                format!("expected {} got {actual}", checksum.hex),
            );
            emit(&progress, ProgressEvent::Failed { item_id: item_id.clone(), kind: record.kind.clone(), message: record.message.clone() }).await;
            return ItemResult::Failure(record);
        }
    }

    if let Err(err) = tokio::fs::rename(&temp_path, &final_path).await {
        return ItemResult::Failure(FailureRecord::new(package_key, package.kind, "Io", err.to_string()));
    }

    package.file_path = Some(final_path);
    emit(&progress, ProgressEvent::Completed { item_id }).await;
    ItemResult::Success(package, bytes_written)
}

enum DownloadError {
    Transient(String),
    Fatal(String),
    Cancelled,
}

/// Streams a GET response to `temp_path`, hashing every algorithm the
/// caller might need to verify in-stream (spec §4.6: "compute the declared
/// digest in-stream"), and emitting `ProgressEvent::Progress` at >= 300ms
/// intervals. Returns the hex digest matching whichever algorithm the
/// artifact declared, plus the total bytes written.
async fn stream_to_disk(
    url: &str,
    temp_path: &Path,
    http: &SharedClients,
    progress: &Option<mpsc::Sender<ProgressEvent>>,
    item_id: &str,
    declared_size: Option<u64>,
    cancellation: &CancellationToken,
) -> Result<(String, u64), DownloadError> {
    let response = tokio::select! {
        biased;
        _ = cancellation.cancelled() => return Err(DownloadError::Cancelled),
        result = http.get_blob(url) => result.map_err(classify_http_error)?,
    };

    let total_bytes = response.content_length().or(declared_size);

    let mut file = tokio::fs::File::create(temp_path)
        .await
        .map_err(|e| DownloadError::Fatal(e.to_string()))?;

    let mut sha256 = Sha256::new();
    let mut sha512 = Sha512::new();
    let mut sha1 = Sha1::new();
    let mut md5 = Md5::new();

    let mut downloaded: u64 = 0;
    let mut last_emit = Instant::now();
    let started_at = Instant::now();
    let mut stream = response.bytes_stream();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(DownloadError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| DownloadError::Transient(e.to_string()))?;

        sha256.update(&chunk);
        sha512.update(&chunk);
        sha1.update(&chunk);
        md5.update(&chunk);
        downloaded += chunk.len() as u64;

        file.write_all(&chunk).await.map_err(|e| DownloadError::Fatal(e.to_string()))?;

        if last_emit.elapsed() >= PROGRESS_INTERVAL {
            let elapsed = started_at.elapsed().as_secs_f64().max(0.001);
            emit(
                progress,
                ProgressEvent::Progress {
                    item_id: item_id.to_string(),
                    downloaded_bytes: downloaded,
                    total_bytes,
                    percent: total_bytes.map(|t| (downloaded as f64 / t as f64) * 100.0),
                    bytes_per_second: downloaded as f64 / elapsed,
                },
            )
            .await;
            last_emit = Instant::now();
        }
    }

    file.flush().await.map_err(|e| DownloadError::Fatal(e.to_string()))?;

    // Every digest is computed in-stream (spec §4.6); the caller looks up
    // whichever one the artifact actually declared via `find_digest`.
    let digests = [
        (DigestAlgo::Sha256, hex_of(sha256.finalize())),
        (DigestAlgo::Sha512, hex_of(sha512.finalize())),
        (DigestAlgo::Sha1, hex_of(sha1.finalize())),
        (DigestAlgo::Md5, hex_of(md5.finalize())),
    ];
    Ok((encode_all(&digests), downloaded))
}

fn hex_of(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

/// Encodes all four computed digests as `algo:hex` pairs joined by `;` so
/// the single return value from [`stream_to_disk`] can be checked against
/// whichever algorithm the artifact declared without re-reading the file.
fn encode_all(digests: &[(DigestAlgo, String)]) -> String {
    digests.iter().map(|(algo, hex)| format!("{algo:?}:{hex}")).collect::<Vec<_>>().join(";")
}

/// Looks up the digest matching `checksum.algo` out of the joined
/// `encode_all` string produced during streaming.
fn find_digest(joined: &str, algo: DigestAlgo) -> Option<String> {
    joined.split(';').find_map(|pair| {
        let (name, hex) = pair.split_once(':')?;
        if name == format!("{algo:?}") {
            Some(hex.to_string())
        } else {
            None
        }
    })
}

fn classify_http_error(err: HttpError) -> DownloadError {
    match err {
        HttpError::NotFound(url) => DownloadError::Fatal(format!("404: {url}")),
        HttpError::UnexpectedStatus { status, url } if status.is_client_error() => {
            DownloadError::Fatal(format!("{status}: {url}"))
        }
        HttpError::UnexpectedStatus { status, url } => DownloadError::Transient(format!("{status}: {url}")),
        HttpError::NetworkFailure { attempts, detail } => DownloadError::Transient(format!("after {attempts} attempts: {detail}")),
        HttpError::Transport(e) => DownloadError::Transient(e.to_string()),
    }
}

async fn emit(progress: &Option<mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        // Terminal events (Completed/Failed/Cancelled) are sent with
        // `send`, which can briefly await; progress ticks use `try_send`
        // and are dropped on a full channel rather than block the
        // downloader, per spec §9's drop-oldest-for-progress rule.
        match &event {
            ProgressEvent::Progress { .. } => {
                let _ = tx.try_send(event);
            }
            _ => {
                let _ = tx.send(event).await;
            }
        }
    }
}

/// Re-checks a verified digest against the artifact's declared checksum
/// (see [`find_digest`]); split out so unit tests can exercise the lookup
/// without a real network stream.
pub fn verify_checksum(joined_digests: &str, checksum: &Checksum) -> bool {
    find_digest(joined_digests, checksum.algo)
        .map(|hex| hex.eq_ignore_ascii_case(&checksum.hex))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_all_round_trips_through_find_digest() {
        let digests = [
            (DigestAlgo::Sha256, "aa".to_string()),
            (DigestAlgo::Sha512, "bb".to_string()),
            (DigestAlgo::Sha1, "cc".to_string()),
            (DigestAlgo::Md5, "dd".to_string()),
        ];
        let joined = encode_all(&digests);
        assert_eq!(find_digest(&joined, DigestAlgo::Sha256).as_deref(), Some("aa"));
        assert_eq!(find_digest(&joined, DigestAlgo::Md5).as_deref(), Some("dd"));
    }

    #[test]
    fn verify_checksum_matches_case_insensitively() {
        let digests = [(DigestAlgo::Sha256, "ABCDEF".to_string())];
        let joined = encode_all(&digests);
        let checksum = Checksum::new(DigestAlgo::Sha256, "abcdef");
        assert!(verify_checksum(&joined, &checksum));
    }
}
