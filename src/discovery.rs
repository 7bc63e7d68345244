//! Finding application bundles.
//!
//! The scanner only needs `(bundle, manifest)` pairs and does not care where
//! they come from. On macOS they come from Spotlight.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::ScanError;
use crate::model::BundleCandidate;

/// Bundles under these directories are never reported.
pub const DENYLIST: &[&str] = &["/System/Applications/Utilities"];

const BUNDLE_QUERY: &str = r#"kMDItemContentType == "com.apple.application-bundle""#;

/// Source of application bundles to scan.
///
/// Implementations only ever return bundles whose manifest exists. The
/// scanner applies the timeout, so implementations need not.
pub trait Discover: Send + Sync + 'static {
    fn discover(
        &self,
        roots: &[PathBuf],
    ) -> impl Future<Output = Result<Vec<BundleCandidate>, ScanError>> + Send;
}

/// Discovery through `mdfind`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spotlight;

impl Discover for Spotlight {
    async fn discover(&self, roots: &[PathBuf]) -> Result<Vec<BundleCandidate>, ScanError> {
        let roots = roots.to_vec();
        let roots: Vec<PathBuf> = tokio::task::spawn_blocking(move || {
            roots.into_iter().filter(|root| root.is_dir()).collect()
        })
        .await?;
        if roots.is_empty() {
            return Ok(Vec::new());
        }

        let mut command = Command::new("mdfind");
        command.arg("-0");
        for root in &roots {
            command.arg("-onlyin").arg(root);
        }

        let output = command
            .arg(BUNDLE_QUERY)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ScanError::Discovery)?;

        if !output.status.success() {
            return Err(ScanError::Discovery(std::io::Error::other(format!(
                "mdfind exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))));
        }

        Ok(tokio::task::spawn_blocking(move || candidates_from_listing(&output.stdout)).await?)
    }
}

/// Turns NUL separated bundle paths into candidates, in listing order.
pub fn candidates_from_listing(listing: &[u8]) -> Vec<BundleCandidate> {
    listing
        .split(|&byte| byte == b'\0')
        .filter(|entry| !entry.is_empty())
        .map(|entry| PathBuf::from(String::from_utf8_lossy(entry).into_owned()))
        .filter(|path| !is_denied(path))
        .filter_map(|path| BundleCandidate::existing(&path))
        .collect()
}

pub fn is_denied(path: &Path) -> bool {
    DENYLIST.iter().any(|denied| path.starts_with(denied))
}
