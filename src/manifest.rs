//! Info.plist reading.
//!
//! Only the identity and icon keys are looked at, everything else in the
//! manifest is ignored.

use plist::{Dictionary, Value};
use std::path::Path;

use crate::error::ScanError;

pub const UNKNOWN: &str = "Unknown";

const DISPLAY_NAME_KEYS: [&str; 3] = ["CFBundleDisplayName", "CFBundleName", "CFBundleExecutable"];
const BUNDLE_ID_KEY: &str = "CFBundleIdentifier";

/// The shapes an icon can be declared in, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconDeclaration {
    /// `CFBundleIconFile`
    IconFile(String),
    /// First entry of `CFBundleIcons.CFBundlePrimaryIcon.CFBundleIconFiles`
    PrimaryIcon(String),
    /// `CFBundleIconName`, an asset catalog name
    IconName(String),
}

impl IconDeclaration {
    pub fn into_reference(self) -> String {
        match self {
            IconDeclaration::IconFile(name)
            | IconDeclaration::PrimaryIcon(name)
            | IconDeclaration::IconName(name) => name,
        }
    }

    #[cfg(test)]
    pub(crate) fn reference(&self) -> &str {
        match self {
            IconDeclaration::IconFile(name)
            | IconDeclaration::PrimaryIcon(name)
            | IconDeclaration::IconName(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub display_name: String,
    pub bundle_id: String,
    pub icon: Option<IconDeclaration>,
}

/// Reads a manifest (XML or binary) and extracts the identity fields.
pub fn read_manifest(path: &Path) -> Result<AppIdentity, ScanError> {
    let value = Value::from_file(path).map_err(|source| ScanError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;

    value
        .as_dictionary()
        .map(identity_from)
        .ok_or_else(|| ScanError::MalformedManifest {
            path: path.to_path_buf(),
        })
}

pub fn identity_from(dict: &Dictionary) -> AppIdentity {
    let display_name = DISPLAY_NAME_KEYS
        .iter()
        .find_map(|&key| non_empty_string(dict, key))
        .unwrap_or(UNKNOWN)
        .to_owned();

    let bundle_id = non_empty_string(dict, BUNDLE_ID_KEY)
        .unwrap_or(UNKNOWN)
        .to_owned();

    AppIdentity {
        display_name,
        bundle_id,
        icon: icon_declaration(dict),
    }
}

fn icon_declaration(dict: &Dictionary) -> Option<IconDeclaration> {
    match (
        non_empty_string(dict, "CFBundleIconFile"),
        primary_icon_file(dict),
        non_empty_string(dict, "CFBundleIconName"),
    ) {
        (Some(file), _, _) => Some(IconDeclaration::IconFile(file.to_owned())),
        (None, Some(file), _) => Some(IconDeclaration::PrimaryIcon(file.to_owned())),
        (None, None, Some(name)) => Some(IconDeclaration::IconName(name.to_owned())),
        (None, None, None) => None,
    }
}

fn primary_icon_file(dict: &Dictionary) -> Option<&str> {
    let files = dict
        .get("CFBundleIcons")?
        .as_dictionary()?
        .get("CFBundlePrimaryIcon")?
        .as_dictionary()?
        .get("CFBundleIconFiles")?;

    match files {
        Value::Array(entries) => entries
            .iter()
            .filter_map(Value::as_string)
            .find(|name| !name.is_empty()),
        Value::String(name) if !name.is_empty() => Some(name.as_str()),
        _ => None,
    }
}

fn non_empty_string<'a>(dict: &'a Dictionary, key: &str) -> Option<&'a str> {
    dict.get(key)
        .and_then(Value::as_string)
        .filter(|value| !value.is_empty())
}
