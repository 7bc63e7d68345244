//! appscan: installed application scanner for macOS.
//!
//! Finds `.app` bundles through Spotlight, reads name, identifier and icon
//! from each `Info.plist`, and can render the icon as an embeddable PNG
//! data URI.

pub mod apps;
pub mod discovery;
pub mod error;
pub mod icons;
pub mod iconset;
pub mod logs;
pub mod manifest;
pub mod model;

pub use apps::AppScanner;
pub use discovery::{Discover, Spotlight};
pub use error::ScanError;
pub use iconset::Extractor;
pub use model::{ApplicationRecord, BundleCandidate, ScanConfig};

pub const APP_NAME: &str = "appscan";

/// Scans every application with the given options.
pub async fn scan_applications(config: ScanConfig) -> Result<Vec<ApplicationRecord>, ScanError> {
    AppScanner::new(config).scan().await
}

/// Looks up one application by bundle identifier.
pub async fn find_application(
    bundle_id: &str,
    config: ScanConfig,
) -> Result<Option<ApplicationRecord>, ScanError> {
    AppScanner::new(config).find_by_bundle_id(bundle_id).await
}
