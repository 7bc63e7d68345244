use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ScanError;
use crate::iconset::Extractor;

// Standard application locations, `~` is the current user's home
const MACOS_APP_PATHS: &[&str] = &["/Applications", "~/Applications", "/System/Applications"];

const PRIMARY_APP_ROOT: &str = "/Applications";
const DEFAULT_ICON_SIZE: u32 = 256;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const BUNDLE_EXTENSION: &str = "app";

/// One application found during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    /// Human readable name, never empty
    pub display_name: String,
    /// Location of the `.app` bundle
    pub bundle_path: PathBuf,
    /// Reverse-domain identifier or `"Unknown"`
    pub bundle_id: String,
    /// Icon name as declared in Info.plist
    pub icon_reference: Option<String>,
    /// Icon file inside the bundle, if one was found
    pub icon_path: Option<PathBuf>,
    /// `data:image/png;base64,...` payload, only when requested
    pub icon_image: Option<String>,
}

/// A bundle reported by discovery together with its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleCandidate {
    pub bundle_path: PathBuf,
    pub manifest_path: PathBuf,
}

impl BundleCandidate {
    /// Candidate for `bundle` if it carries `Contents/Info.plist`.
    pub fn existing(bundle: &Path) -> Option<Self> {
        let manifest_path = manifest_path(bundle);
        manifest_path.is_file().then(|| BundleCandidate {
            bundle_path: bundle.to_path_buf(),
            manifest_path,
        })
    }

    /// Validates an explicitly supplied bundle path.
    ///
    /// The `.app` suffix is checked before touching the filesystem.
    pub fn from_bundle(bundle: impl AsRef<Path>) -> Result<Self, ScanError> {
        let bundle = bundle.as_ref();
        if !is_app_bundle(bundle) {
            return Err(ScanError::InvalidInput(format!(
                "{} is not an application bundle",
                bundle.display()
            )));
        }

        Self::existing(bundle).ok_or_else(|| ScanError::MissingManifest {
            bundle: bundle.to_path_buf(),
        })
    }
}

pub fn is_app_bundle(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(BUNDLE_EXTENSION))
        .unwrap_or(false)
}

pub fn manifest_path(bundle: &Path) -> PathBuf {
    bundle.join("Contents").join("Info.plist")
}

/// Options for a scan. Built once and shared read-only by every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub include_icon_image: bool,
    pub icon_size: u32,
    pub search_roots: Vec<PathBuf>,
    /// Bundles under this root win name collisions
    pub primary_root: PathBuf,
    pub timeout: Duration,
    pub extractor: Extractor,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_icon_image: false,
            icon_size: DEFAULT_ICON_SIZE,
            search_roots: default_search_roots(),
            primary_root: PathBuf::from(PRIMARY_APP_ROOT),
            timeout: DEFAULT_TIMEOUT,
            extractor: Extractor::default(),
        }
    }
}

impl ScanConfig {
    pub fn with_icon_image(mut self, include: bool) -> Self {
        self.include_icon_image = include;
        self
    }

    pub fn with_icon_size(mut self, size: u32) -> Self {
        self.icon_size = size.max(1);
        self
    }

    pub fn with_search_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_primary_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.primary_root = root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }
}

pub fn default_search_roots() -> Vec<PathBuf> {
    let home = dirs::home_dir();

    MACOS_APP_PATHS
        .iter()
        .filter_map(|path| match path.strip_prefix("~/") {
            Some(rest) => home.as_ref().map(|home| home.join(rest)),
            None => Some(PathBuf::from(path)),
        })
        .collect()
}
