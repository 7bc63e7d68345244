use regex::RegexBuilder;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::discovery::{Discover, Spotlight};
use crate::error::ScanError;
use crate::icons;
use crate::logs;
use crate::manifest::{self, IconDeclaration};
use crate::model::{ApplicationRecord, BundleCandidate, ScanConfig};

/// Scans installed applications.
///
/// Discovery runs first, then every bundle is processed on its own blocking
/// task. A bundle that fails is left out of the result, it never fails the
/// whole scan.
pub struct AppScanner<D = Spotlight> {
    config: Arc<ScanConfig>,
    discovery: D,
}

impl AppScanner<Spotlight> {
    pub fn new(config: ScanConfig) -> Self {
        Self::with_discovery(config, Spotlight)
    }
}

impl Default for AppScanner<Spotlight> {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl<D: Discover> AppScanner<D> {
    pub fn with_discovery(config: ScanConfig, discovery: D) -> Self {
        Self {
            config: Arc::new(config),
            discovery,
        }
    }

    /// Every application under the configured roots, one per display name.
    pub async fn scan(&self) -> Result<Vec<ApplicationRecord>, ScanError> {
        let candidates = tokio::time::timeout(
            self.config.timeout,
            self.discovery.discover(&self.config.search_roots),
        )
        .await
        .map_err(|_| ScanError::DiscoveryTimeout(self.config.timeout))
        .and_then(|discovered| discovered)
        .inspect_err(|e| logs::log_error(&format!("Discovery failed: {}", e)))?;

        logs::log_info(&format!("Discovered {} application bundles", candidates.len()));

        let tasks: Vec<_> = candidates
            .into_iter()
            .map(|candidate| {
                let config = Arc::clone(&self.config);
                let bundle = candidate.bundle_path.clone();
                let task = tokio::task::spawn_blocking(move || process_bundle(&config, &candidate));
                (bundle, task)
            })
            .collect();

        // awaited in discovery order so deduplication stays deterministic
        let mut records = Vec::with_capacity(tasks.len());
        for (bundle, task) in tasks {
            match task.await {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(e)) if e.is_item_scoped() => {
                    logs::log_warn(&format!("Skipping {}: {}", bundle.display(), e));
                }
                Ok(Err(e)) => {
                    logs::log_error(&format!("Failed to process {}: {}", bundle.display(), e));
                }
                Err(e) => {
                    logs::log_warn(&format!("Processing {} aborted: {}", bundle.display(), e));
                }
            }
        }

        let apps = deduplicate(records, &self.config.primary_root);
        logs::log_info(&format!("Found {} applications", apps.len()));
        Ok(apps)
    }

    /// First application with exactly this bundle identifier.
    pub async fn find_by_bundle_id(
        &self,
        bundle_id: &str,
    ) -> Result<Option<ApplicationRecord>, ScanError> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .find(|app| app.bundle_id == bundle_id))
    }

    /// Applications whose display name matches `pattern`, a case-insensitive
    /// regular expression.
    pub async fn find_by_name(&self, pattern: &str) -> Result<Vec<ApplicationRecord>, ScanError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ScanError::InvalidInput(format!("invalid name pattern: {}", e)))?;

        Ok(self
            .scan()
            .await?
            .into_iter()
            .filter(|app| pattern.is_match(&app.display_name))
            .collect())
    }

    /// Reads a single bundle without going through discovery.
    pub async fn inspect_bundle(
        &self,
        bundle: impl AsRef<Path>,
    ) -> Result<ApplicationRecord, ScanError> {
        let candidate = BundleCandidate::from_bundle(bundle)?;
        let config = Arc::clone(&self.config);

        tokio::task::spawn_blocking(move || process_bundle(&config, &candidate)).await?
    }
}

/// Manifest, then icon lookup, then the optional icon render.
///
/// Only a manifest failure is an error. A missing icon or one that cannot be
/// rendered leaves the icon fields empty.
pub fn process_bundle(
    config: &ScanConfig,
    candidate: &BundleCandidate,
) -> Result<ApplicationRecord, ScanError> {
    let identity = manifest::read_manifest(&candidate.manifest_path)?;
    let icon_reference = identity.icon.map(IconDeclaration::into_reference);

    let icon_path = icon_reference
        .as_deref()
        .and_then(|reference| icons::find_icon_file(&candidate.bundle_path, reference));

    let icon_image = icon_path
        .as_deref()
        .filter(|_| config.include_icon_image)
        .and_then(|path| {
            icons::encode_data_uri(path, config.icon_size, config.extractor)
                .inspect_err(|e| {
                    logs::log_warn(&format!(
                        "Failed to convert icon for {}: {}",
                        identity.display_name, e
                    ))
                })
                .ok()
        });

    Ok(ApplicationRecord {
        display_name: identity.display_name,
        bundle_path: candidate.bundle_path.clone(),
        bundle_id: identity.bundle_id,
        icon_reference,
        icon_path,
        icon_image,
    })
}

/// Keeps one record per display name.
///
/// A record under `primary_root` wins, otherwise the first one seen. Groups
/// come out in the order their first member came in.
pub fn deduplicate(records: Vec<ApplicationRecord>, primary_root: &Path) -> Vec<ApplicationRecord> {
    let mut groups: Vec<Vec<ApplicationRecord>> = Vec::new();
    let mut group_by_name: HashMap<String, usize> = HashMap::new();

    for record in records {
        match group_by_name.get(&record.display_name) {
            Some(&index) => groups[index].push(record),
            None => {
                group_by_name.insert(record.display_name.clone(), groups.len());
                groups.push(vec![record]);
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|group| {
            let keep = group
                .iter()
                .position(|app| app.bundle_path.starts_with(primary_root))
                .unwrap_or(0);
            group.into_iter().nth(keep)
        })
        .collect()
}
