//! Container icon (`.icns`) extraction and rendition selection.
//!
//! Both extractors produce an `.iconset` directory of PNG files named the way
//! `iconutil` names them (`icon_128x128.png`, `icon_128x128@2x.png`), so the
//! best rendition is always picked from file names alone.

use clap::ValueEnum;
use icns::{IconFamily, IconType};
use regex::Regex;
use rs_apply::Apply;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use crate::error::ScanError;

const ICONSET_DIR: &str = "icon.iconset";
const WORKSPACE_PREFIX: &str = "appscan_iconset_";

static RENDITION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)x(\d+)(?:@\d+x)?").expect("rendition pattern cannot be invalid")
});

/// How a container icon is unpacked into renditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Extractor {
    /// `iconutil -c iconset`, only available on macOS
    Iconutil,
    /// In-process decoding with the `icns` crate
    Builtin,
}

impl Default for Extractor {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Extractor::Iconutil
        } else {
            Extractor::Builtin
        }
    }
}

impl Extractor {
    /// Unpacks `container` into the `output` directory.
    pub fn extract(self, container: &Path, output: &Path) -> Result<(), ScanError> {
        match self {
            Extractor::Iconutil => run_iconutil(container, output),
            Extractor::Builtin => decode_family(container, output),
        }
    }
}

/// One rendition file of an extracted iconset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

impl Rendition {
    /// Parses `icon_<W>x<H>[@<N>x].png`. Anything that is not a PNG is ignored.
    pub fn parse(file_name: &str) -> Option<Self> {
        let is_png = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            return None;
        }

        let captures = RENDITION_NAME.captures(file_name)?;
        Some(Rendition {
            file_name: file_name.to_owned(),
            width: captures[1].parse().ok()?,
            height: captures[2].parse().ok()?,
        })
    }

    /// Nominal area, the density suffix does not scale it.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Largest nominal rendition, the first one wins on equal area.
pub fn select_largest<'a>(file_names: impl IntoIterator<Item = &'a str>) -> Option<Rendition> {
    file_names
        .into_iter()
        .filter_map(Rendition::parse)
        .reduce(|best, next| if next.area() > best.area() { next } else { best })
}

/// Extracts `container` into a private workspace and hands the best
/// rendition to `use_rendition`.
///
/// The workspace is removed when this returns, whatever the outcome.
pub fn with_best_rendition<T>(
    container: &Path,
    extractor: Extractor,
    use_rendition: impl FnOnce(&Path) -> Result<T, ScanError>,
) -> Result<T, ScanError> {
    let workspace = tempfile::Builder::new()
        .prefix(WORKSPACE_PREFIX)
        .tempdir()
        .map_err(|e| ScanError::icon_resolution(container, format!("no workspace: {e}")))?;

    let iconset = workspace.path().join(ICONSET_DIR);
    extractor.extract(container, &iconset)?;

    let best = best_rendition(&iconset)
        .map_err(|e| ScanError::icon_resolution(container, e))?
        .ok_or_else(|| ScanError::icon_resolution(container, "no valid renditions found"))?;

    use_rendition(&best)
}

fn best_rendition(iconset: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut names: Vec<String> = fs::read_dir(iconset)?
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    // directory order is arbitrary, keep "first encountered" reproducible
    names.sort();

    Ok(select_largest(names.iter().map(String::as_str))
        .map(|rendition| iconset.join(rendition.file_name)))
}

fn run_iconutil(container: &Path, output: &Path) -> Result<(), ScanError> {
    let result = Command::new("iconutil")
        .arg("-c")
        .arg("iconset")
        .arg(container)
        .arg("-o")
        .arg(output)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ScanError::icon_resolution(container, format!("failed to run iconutil: {e}")))?;

    if result.status.success() {
        Ok(())
    } else {
        Err(ScanError::icon_resolution(
            container,
            format!(
                "iconutil exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            ),
        ))
    }
}

fn decode_family(container: &Path, output: &Path) -> Result<(), ScanError> {
    let family = File::open(container)
        .map(BufReader::new)
        .and_then(IconFamily::read)
        .map_err(|e| ScanError::icon_resolution(container, e))?;

    fs::create_dir_all(output).map_err(|e| ScanError::icon_resolution(container, e))?;

    // renditions this decoder cannot handle (JPEG 2000) are skipped
    family
        .available_icons()
        .into_iter()
        .filter_map(|icon_type| {
            family
                .get_icon_with_type(icon_type)
                .ok()
                .map(|image| (icon_type, image))
        })
        .try_for_each(|(icon_type, image)| {
            output
                .join(rendition_file_name(icon_type))
                .apply(File::create)
                .map(BufWriter::new)
                .and_then(|file| image.write_png(file))
        })
        .map_err(|e| ScanError::icon_resolution(container, e))
}

fn rendition_file_name(icon_type: IconType) -> String {
    match icon_type.pixel_density() {
        1 => format!(
            "icon_{}x{}.png",
            icon_type.screen_width(),
            icon_type.screen_height()
        ),
        density => format!(
            "icon_{}x{}@{}x.png",
            icon_type.screen_width(),
            icon_type.screen_height(),
            density
        ),
    }
}
