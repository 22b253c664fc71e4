//! Resolve → Download → Extract → Merge → Manifest, per the Template
//! Overlay Engine contract.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{DomainError, Finding};

use super::manifest::{CompatibilityDocument, InstallManifest, SourceRecord, COMPATIBILITY_FILENAME, MANIFEST_PATH};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_REDIRECTS: usize = 5;
const RETRY_BACKOFF: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(3)];

/// A release source: an owner/repo pair plus a pinned tag, or `None` for
/// "latest".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
    pub owner: String,
    pub repo: String,
    pub version: Option<String>,
}

impl ArchiveSource {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, version: Option<String>) -> Self {
        ArchiveSource {
            owner: owner.into(),
            repo: repo.into(),
            version,
        }
    }
}

#[derive(Debug)]
pub enum OverlayError {
    DownloadFailed(String),
    ExtractFailed(String),
    ManifestMissing(PathBuf),
    Conflict(String),
    RateLimited(String),
    Io(std::io::Error),
}

impl From<std::io::Error> for OverlayError {
    fn from(e: std::io::Error) -> Self {
        OverlayError::Io(e)
    }
}

impl std::fmt::Display for OverlayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayError::DownloadFailed(msg) => write!(f, "archive download failed: {msg}"),
            OverlayError::ExtractFailed(msg) => write!(f, "archive extraction failed: {msg}"),
            OverlayError::ManifestMissing(p) => write!(f, "install manifest not found at {}", p.display()),
            OverlayError::Conflict(msg) => write!(f, "conflicting install state: {msg}"),
            OverlayError::RateLimited(msg) => write!(f, "rate limited: {msg}"),
            OverlayError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for OverlayError {}

impl DomainError for OverlayError {
    fn rule_id(&self) -> &'static str {
        match self {
            OverlayError::DownloadFailed(_) => "E400_DOWNLOAD_FAILED",
            OverlayError::RateLimited(_) => "E401_RATE_LIMITED",
            OverlayError::ExtractFailed(_) => "E402_EXTRACT_FAILED",
            OverlayError::ManifestMissing(_) => "E403_MANIFEST_MISSING",
            OverlayError::Conflict(_) => "E404_CONFLICT",
            OverlayError::Io(_) => "E405_OVERLAY_IO",
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            OverlayError::ManifestMissing(_) => 1,
            OverlayError::Conflict(_) => 3,
            _ => 1,
        }
    }

    fn remediation(&self) -> Option<String> {
        match self {
            OverlayError::ManifestMissing(_) => Some("run `flow init` before `flow upgrade`".to_string()),
            OverlayError::RateLimited(_) => Some("set $GITHUB_TOKEN to raise the rate limit".to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: String,
    assets: Vec<ReleaseAsset>,
}

struct ResolvedRelease {
    tag: String,
    asset_url: String,
}

/// Global best-effort interrupt flag, set by a SIGINT handler installed once
/// per process. Checked between the Resolve/Download/Extract/Merge step
/// boundaries (the only cancellation granularity the engine promises).
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Installs a process-wide SIGINT handler that flips [`INTERRUPTED`].
/// Idempotent; safe to call from `flow init`/`flow upgrade` entry points.
#[cfg(unix)]
pub fn install_sigint_handler() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let flag = Arc::new(AtomicBool::new(false));
        if signal_hook::flag::register(signal_hook::consts::SIGINT, flag.clone()).is_ok() {
            std::thread::spawn(move || loop {
                if flag.load(Ordering::SeqCst) {
                    INTERRUPTED.store(true, Ordering::SeqCst);
                    break;
                }
                std::thread::sleep(Duration::from_millis(50));
            });
        }
    });
}

#[cfg(not(unix))]
pub fn install_sigint_handler() {}

fn check_interrupted() -> Result<(), OverlayError> {
    if INTERRUPTED.swap(false, Ordering::SeqCst) {
        return Err(OverlayError::DownloadFailed("interrupted by SIGINT".to_string()));
    }
    Ok(())
}

pub struct OverlayEngine {
    client: reqwest::blocking::Client,
    github_token: Option<String>,
    engine_version: String,
}

/// Outcome of a single `install` or `upgrade` call: resolved tags, digests,
/// and any compatibility-range warning.
pub struct UpgradeReport {
    pub manifest: InstallManifest,
    pub findings: Vec<Finding>,
    pub dry_run: bool,
    pub would_change: bool,
}

impl OverlayEngine {
    pub fn new(engine_version: impl Into<String>) -> Self {
        let github_token = std::env::var("GITHUB_TOKEN").ok();
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent("flowspec")
            .build()
            .expect("reqwest client builder with static config never fails");
        OverlayEngine {
            client,
            github_token,
            engine_version: engine_version.into(),
        }
    }

    fn authorized(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.github_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn resolve(&self, source: &ArchiveSource) -> Result<ResolvedRelease, OverlayError> {
        let url = match &source.version {
            Some(tag) if tag != "latest" => {
                format!("https://api.github.com/repos/{}/{}/releases/tags/{tag}", source.owner, source.repo)
            }
            _ => format!("https://api.github.com/repos/{}/{}/releases/latest", source.owner, source.repo),
        };

        let response = self.get_with_retry(&url)?;
        if response.status() == reqwest::StatusCode::FORBIDDEN || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OverlayError::RateLimited(format!("{} returned {}", url, response.status())));
        }
        if !response.status().is_success() {
            return Err(OverlayError::DownloadFailed(format!("{} returned {}", url, response.status())));
        }
        let release: ReleaseResponse = response
            .json()
            .map_err(|e| OverlayError::DownloadFailed(format!("invalid release JSON from {url}: {e}")))?;

        let asset = release
            .assets
            .iter()
            .find(|a| a.name.ends_with(".zip"))
            .ok_or_else(|| OverlayError::DownloadFailed(format!("release {} has no .zip asset", release.tag_name)))?;

        Ok(ResolvedRelease {
            tag: release.tag_name,
            asset_url: asset.browser_download_url.clone(),
        })
    }

    fn get_with_retry(&self, url: &str) -> Result<reqwest::blocking::Response, OverlayError> {
        let mut last_err = None;
        for backoff in [Duration::ZERO].iter().chain(RETRY_BACKOFF.iter()) {
            if !backoff.is_zero() {
                std::thread::sleep(*backoff);
            }
            match self.authorized(self.client.get(url)).send() {
                Ok(resp) => return Ok(resp),
                Err(e) => last_err = Some(e),
            }
        }
        Err(OverlayError::DownloadFailed(format!(
            "{url} unreachable after retries: {}",
            last_err.expect("loop ran at least once")
        )))
    }

    /// Downloads the archive bytes, verifying the byte count against
    /// `Content-Length` when the server sends one.
    fn download_archive(&self, url: &str) -> Result<Vec<u8>, OverlayError> {
        let response = self.get_with_retry(url)?;
        if !response.status().is_success() {
            return Err(OverlayError::DownloadFailed(format!("{url} returned {}", response.status())));
        }
        let expected_len = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let bytes = response
            .bytes()
            .map_err(|e| OverlayError::DownloadFailed(format!("failed reading body of {url}: {e}")))?
            .to_vec();

        if let Some(expected) = expected_len {
            if bytes.len() as u64 != expected {
                return Err(OverlayError::DownloadFailed(format!(
                    "{url}: downloaded {} bytes, expected {expected} from Content-Length",
                    bytes.len()
                )));
            }
        }
        Ok(bytes)
    }

    fn digest(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    fn extract_zip(bytes: &[u8], dest: &Path) -> Result<(), OverlayError> {
        let reader = std::io::Cursor::new(bytes);
        let mut archive = zip::ZipArchive::new(reader)
            .map_err(|e| OverlayError::ExtractFailed(format!("not a valid zip archive: {e}")))?;
        archive
            .extract(dest)
            .map_err(|e| OverlayError::ExtractFailed(format!("extraction into {} failed: {e}", dest.display())))?;
        Ok(())
    }

    /// Resolve + download + extract one source into a fresh staging
    /// directory, returning its resolved tag, digest, and the staging dir
    /// (kept alive by the caller for the duration of the merge).
    fn fetch_and_stage(&self, source: &ArchiveSource) -> Result<(ResolvedRelease, String, tempfile::TempDir), OverlayError> {
        let resolved = self.resolve(source)?;
        check_interrupted()?;
        let bytes = self.download_archive(&resolved.asset_url)?;
        check_interrupted()?;
        let digest = Self::digest(&bytes);
        let staging = tempfile::TempDir::new()?;
        Self::extract_zip(&bytes, staging.path())?;
        Ok((resolved, digest, staging))
    }

    /// Recursively copies `src` onto `dest`, creating directories as
    /// needed. Files that already exist at the destination are
    /// overwritten, which is what gives the caller extension-wins
    /// precedence when this runs a second time with the extension
    /// staging directory as `src`. Exposed as a public associated function
    /// (not just an internal step of [`OverlayEngine::install`]) so the
    /// merge/precedence behavior (§8.2's "two-stage merge" law) is testable
    /// without a network round-trip to resolve and download a release.
    pub fn merge_into(src: &Path, dest: &Path) -> std::io::Result<()> {
        if !src.exists() {
            return Ok(());
        }
        fs::create_dir_all(dest)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            let from = entry.path();
            let to = dest.join(entry.file_name());
            if from.is_dir() {
                Self::merge_into(&from, &to)?;
            } else {
                if let Some(parent) = to.parent() {
                    fs::create_dir_all(parent)?;
                }
                reflink_copy::reflink_or_copy(&from, &to)?;
            }
        }
        Ok(())
    }

    /// Recursive copy used for the pre-write snapshot and restore paths.
    fn snapshot_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
        if !src.exists() {
            return Ok(());
        }
        fs::create_dir_all(dest)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            let from = entry.path();
            let to = dest.join(entry.file_name());
            if from.is_dir() {
                Self::snapshot_dir(&from, &to)?;
            } else {
                reflink_copy::reflink_or_copy(&from, &to)?;
            }
        }
        Ok(())
    }

    fn check_compatibility(ext_staging: &Path, base_tag: &str) -> Vec<Finding> {
        let compat_path = ext_staging.join(COMPATIBILITY_FILENAME);
        let Ok(raw) = fs::read_to_string(&compat_path) else {
            return Vec::new();
        };
        let Ok(doc) = serde_yaml::from_str::<CompatibilityDocument>(&raw) else {
            return Vec::new();
        };
        let range = &doc.extension.compatible_with.base;
        if base_tag < range.min.as_str() || base_tag > range.max.as_str() {
            vec![Finding::warning(
                "/extension/compatible_with/base",
                "W400_COMPATIBILITY_RANGE",
                format!(
                    "resolved base tag `{base_tag}` falls outside the extension's declared compatible range [{}, {}]",
                    range.min, range.max
                ),
            )]
        } else {
            Vec::new()
        }
    }

    /// Installs into `target`: base then extension, extension-wins on
    /// conflicts, writing `.specify/install-manifest.json`. `target` is
    /// left untouched on any failure before the merge step begins; a
    /// pre-write snapshot guards failures once merging has started.
    pub fn install(&self, target: &Path, base: &ArchiveSource, extension: &ArchiveSource) -> Result<UpgradeReport, OverlayError> {
        let (base_result, ext_result) = rayon::join(|| self.fetch_and_stage(base), || self.fetch_and_stage(extension));
        let (base_release, base_digest, base_staging) = base_result?;
        let (ext_release, ext_digest, ext_staging) = ext_result?;
        check_interrupted()?;

        let findings = Self::check_compatibility(ext_staging.path(), &base_release.tag);

        let snapshot = tempfile::TempDir::new()?;
        Self::snapshot_dir(target, snapshot.path())?;

        let merge_result = (|| -> Result<(), OverlayError> {
            Self::merge_into(base_staging.path(), target)?;
            check_interrupted()?;
            Self::merge_into(ext_staging.path(), target)?;
            Ok(())
        })();

        if let Err(e) = merge_result {
            // restore from snapshot on any failure once merging began
            let _ = fs::remove_dir_all(target);
            let _ = Self::snapshot_dir(snapshot.path(), target);
            return Err(e);
        }

        let manifest = InstallManifest {
            base: SourceRecord {
                owner: base.owner.clone(),
                repo: base.repo.clone(),
                tag: base_release.tag,
                digest_sha256: base_digest,
            },
            extension: SourceRecord {
                owner: extension.owner.clone(),
                repo: extension.repo.clone(),
                tag: ext_release.tag,
                digest_sha256: ext_digest,
            },
            installed_at_utc: Utc::now(),
            engine_version: self.engine_version.clone(),
        };
        manifest.write(&target.join(MANIFEST_PATH))?;

        Ok(UpgradeReport {
            manifest,
            findings,
            dry_run: false,
            would_change: true,
        })
    }

    /// Reads the existing manifest, snapshots `target` to
    /// `.specify-backup/<timestamp>/`, and re-runs the two-stage merge
    /// with (optionally new) versions. `dry_run` performs resolve/download/
    /// extract only and reports whether the resolved tags differ from the
    /// manifest without writing anything.
    pub fn upgrade(
        &self,
        target: &Path,
        base_version: Option<String>,
        extension_version: Option<String>,
        dry_run: bool,
    ) -> Result<UpgradeReport, OverlayError> {
        let manifest_path = target.join(MANIFEST_PATH);
        let existing = InstallManifest::load(&manifest_path).map_err(|_| OverlayError::ManifestMissing(manifest_path.clone()))?;

        let base = ArchiveSource::new(existing.base.owner.clone(), existing.base.repo.clone(), base_version);
        let extension = ArchiveSource::new(existing.extension.owner.clone(), existing.extension.repo.clone(), extension_version);

        if dry_run {
            let (base_result, ext_result) = rayon::join(|| self.fetch_and_stage(&base), || self.fetch_and_stage(&extension));
            let (base_release, _, _) = base_result?;
            let (ext_release, _, _) = ext_result?;
            let would_change = base_release.tag != existing.base.tag || ext_release.tag != existing.extension.tag;
            return Ok(UpgradeReport {
                manifest: existing,
                findings: Vec::new(),
                dry_run: true,
                would_change,
            });
        }

        let backup_dir = target.join(".specify-backup").join(Utc::now().format("%Y%m%dT%H%M%SZ").to_string());
        Self::snapshot_dir(target, &backup_dir)?;

        self.install(target, &base, &extension)
    }
}
