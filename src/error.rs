use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong while scanning bundles.
///
/// Only discovery and top-level failures ever escape [`crate::apps::AppScanner::scan`].
/// The per-item kinds are swallowed by the scanner and logged as warnings.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("application discovery failed: {0}")]
    Discovery(#[source] std::io::Error),

    #[error("application discovery timed out after {0:?}")]
    DiscoveryTimeout(Duration),

    #[error("failed to read manifest at {}: {source}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },

    #[error("manifest at {} is not a dictionary", path.display())]
    MalformedManifest { path: PathBuf },

    #[error("failed to resolve icon at {}: {reason}", path.display())]
    IconResolution { path: PathBuf, reason: String },

    #[error("failed to encode icon at {}: {source}", path.display())]
    IconEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no Info.plist found in {}", bundle.display())]
    MissingManifest { bundle: PathBuf },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ScanError {
    /// True for failures that only concern a single application.
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            ScanError::ManifestRead { .. }
                | ScanError::MalformedManifest { .. }
                | ScanError::IconResolution { .. }
                | ScanError::IconEncode { .. }
        )
    }

    pub(crate) fn icon_resolution(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ScanError::IconResolution {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
