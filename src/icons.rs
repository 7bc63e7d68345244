use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use crate::error::ScanError;
use crate::iconset::{self, Extractor};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["icns", "png", "ico", "tiff", "tif"];
const CONTAINER_EXTENSION: &str = "icns";
const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Finds the icon file a manifest refers to.
///
/// `Contents/Resources` is searched before the bundle root. The reference is
/// tried as written and then with each supported extension appended, unless
/// it already carries one.
///
/// Lookups never leave the bundle. A leading `/` is dropped and a reference
/// with `..` in it finds nothing.
pub fn find_icon_file(bundle: &Path, reference: &str) -> Option<PathBuf> {
    let names = candidate_names(&contained_reference(reference)?);

    [bundle.join("Contents").join("Resources"), bundle.to_path_buf()]
        .into_iter()
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn contained_reference(reference: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(reference).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => return None,
        }
    }
    (!relative.as_os_str().is_empty()).then_some(relative)
}

fn candidate_names(reference: &Path) -> Vec<PathBuf> {
    let already_suffixed = has_extension(reference, SUPPORTED_EXTENSIONS);

    std::iter::once(reference.to_path_buf())
        .chain(
            SUPPORTED_EXTENSIONS
                .iter()
                .filter(|_| !already_suffixed)
                .map(|ext| {
                    let mut name = reference.as_os_str().to_owned();
                    name.push(".");
                    name.push(ext);
                    PathBuf::from(name)
                }),
        )
        .collect()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Renders the icon at `icon_path` as a `data:image/png;base64,` URI that
/// fits in `size` x `size`.
///
/// Containers are unpacked first and their largest rendition is used.
pub fn encode_data_uri(icon_path: &Path, size: u32, extractor: Extractor) -> Result<String, ScanError> {
    let png = if has_extension(icon_path, &[CONTAINER_EXTENSION]) {
        iconset::with_best_rendition(icon_path, extractor, |rendition| {
            normalize_png(rendition, size)
        })?
    } else {
        normalize_png(icon_path, size)?
    };

    Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(png)))
}

/// Decodes a raster image and re-encodes it as PNG within `size` x `size`.
/// Aspect ratio is kept and images are never enlarged.
pub fn normalize_png(source: &Path, size: u32) -> Result<Vec<u8>, ScanError> {
    let encode = || -> Result<Vec<u8>, ImageError> {
        let image = ImageReader::open(source)?.with_guessed_format()?.decode()?;
        let image = fit_within(image, size.max(1));

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    };

    encode().map_err(|source_err| ScanError::IconEncode {
        path: source.to_path_buf(),
        source: source_err,
    })
}

fn fit_within(image: DynamicImage, size: u32) -> DynamicImage {
    if image.width() <= size && image.height() <= size {
        image
    } else {
        image.resize(size, size, FilterType::Lanczos3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iconset::tests::write_icns;
    use icns::IconType;
    use image::{GenericImageView, Rgba, RgbaImage};
    use std::fs;

    fn bundle_with_resources() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("Sample.app");
        fs::create_dir_all(bundle.join("Contents/Resources")).unwrap();
        (dir, bundle)
    }

    fn decode_data_uri(uri: &str) -> DynamicImage {
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        image::load_from_memory_with_format(&STANDARD.decode(payload).unwrap(), ImageFormat::Png)
            .unwrap()
    }

    #[test]
    fn resources_are_searched_before_root() {
        let (_dir, bundle) = bundle_with_resources();
        fs::write(bundle.join("AppIcon.icns"), b"root").unwrap();
        fs::write(bundle.join("Contents/Resources/AppIcon.icns"), b"res").unwrap();

        assert_eq!(
            find_icon_file(&bundle, "AppIcon"),
            Some(bundle.join("Contents/Resources/AppIcon.icns"))
        );
    }

    #[test]
    fn falls_back_to_bundle_root() {
        let (_dir, bundle) = bundle_with_resources();
        fs::write(bundle.join("Logo.png"), b"png").unwrap();

        assert_eq!(find_icon_file(&bundle, "Logo"), Some(bundle.join("Logo.png")));
    }

    #[test]
    fn extension_order_prefers_icns() {
        let (_dir, bundle) = bundle_with_resources();
        let resources = bundle.join("Contents/Resources");
        fs::write(resources.join("Icon.png"), b"png").unwrap();
        fs::write(resources.join("Icon.icns"), b"icns").unwrap();

        assert_eq!(find_icon_file(&bundle, "Icon"), Some(resources.join("Icon.icns")));
    }

    #[test]
    fn suffixed_reference_is_used_as_is() {
        let (_dir, bundle) = bundle_with_resources();
        let resources = bundle.join("Contents/Resources");
        fs::write(resources.join("Icon.png"), b"png").unwrap();

        assert_eq!(find_icon_file(&bundle, "Icon.png"), Some(resources.join("Icon.png")));
        assert_eq!(find_icon_file(&bundle, "Icon.icns"), None);
        assert_eq!(
            candidate_names(Path::new("Icon.ICNS")),
            vec![PathBuf::from("Icon.ICNS")]
        );
    }

    #[test]
    fn absolute_reference_stays_inside_bundle() {
        let (dir, bundle) = bundle_with_resources();
        let outside = dir.path().join("outside.png");
        fs::write(&outside, b"png").unwrap();

        assert_eq!(find_icon_file(&bundle, outside.to_str().unwrap()), None);

        let inside = bundle.join("Contents/Resources").join(outside.strip_prefix("/").unwrap());
        fs::create_dir_all(inside.parent().unwrap()).unwrap();
        fs::write(&inside, b"png").unwrap();
        assert_eq!(find_icon_file(&bundle, outside.to_str().unwrap()), Some(inside));
    }

    #[test]
    fn parent_segments_find_nothing() {
        let (dir, bundle) = bundle_with_resources();
        fs::write(dir.path().join("secret.png"), b"png").unwrap();
        fs::write(bundle.join("Contents/Resources/Icon.png"), b"png").unwrap();

        assert_eq!(find_icon_file(&bundle, "../../../secret"), None);
        assert_eq!(find_icon_file(&bundle, "../Resources/Icon"), None);
        assert_eq!(find_icon_file(&bundle, "/"), None);
    }

    #[test]
    fn missing_icon_is_none_and_directories_do_not_count() {
        let (_dir, bundle) = bundle_with_resources();
        fs::create_dir_all(bundle.join("Contents/Resources/Folder.icns")).unwrap();

        assert_eq!(find_icon_file(&bundle, "Nothing"), None);
        assert_eq!(find_icon_file(&bundle, "Folder"), None);
    }

    #[test]
    fn large_raster_is_scaled_down_with_aspect() {
        let (_dir, bundle) = bundle_with_resources();
        let path = bundle.join("Contents/Resources/Wide.png");
        RgbaImage::from_pixel(400, 200, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let image = decode_data_uri(&encode_data_uri(&path, 100, Extractor::Builtin).unwrap());
        assert_eq!(image.dimensions(), (100, 50));
    }

    #[test]
    fn small_raster_is_never_enlarged() {
        let (_dir, bundle) = bundle_with_resources();
        let path = bundle.join("Contents/Resources/Tiny.png");
        RgbaImage::from_pixel(24, 24, Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();

        let image = decode_data_uri(&encode_data_uri(&path, 256, Extractor::Builtin).unwrap());
        assert_eq!(image.dimensions(), (24, 24));
    }

    #[test]
    fn container_uses_largest_rendition() {
        let (_dir, bundle) = bundle_with_resources();
        let path = bundle.join("Contents/Resources/AppIcon.icns");
        write_icns(
            &path,
            &[
                (IconType::RGB24_16x16, [255, 0, 0, 255]),
                (IconType::RGB24_32x32, [255, 0, 0, 255]),
                (IconType::RGB24_128x128, [0, 0, 255, 255]),
            ],
        );

        let uri = encode_data_uri(&path, 256, Extractor::Builtin).unwrap();
        let image = decode_data_uri(&uri);
        assert_eq!(image.dimensions(), (128, 128));
        assert_eq!(image.get_pixel(64, 64), Rgba([0, 0, 255, 255]));

        let bounded = decode_data_uri(&encode_data_uri(&path, 64, Extractor::Builtin).unwrap());
        assert_eq!(bounded.dimensions(), (64, 64));
    }

    #[test]
    fn undecodable_raster_is_an_encode_failure() {
        let (_dir, bundle) = bundle_with_resources();
        let path = bundle.join("Contents/Resources/Broken.png");
        fs::write(&path, b"not a png at all").unwrap();

        assert!(matches!(
            encode_data_uri(&path, 64, Extractor::Builtin),
            Err(ScanError::IconEncode { .. })
        ));
    }

    #[test]
    fn concurrent_containers_do_not_share_workspaces() {
        let (_dir_a, bundle_a) = bundle_with_resources();
        let (_dir_b, bundle_b) = bundle_with_resources();
        let icon_a = bundle_a.join("Contents/Resources/AppIcon.icns");
        let icon_b = bundle_b.join("Contents/Resources/AppIcon.icns");
        write_icns(&icon_a, &[(IconType::RGB24_128x128, [255, 0, 0, 255])]);
        write_icns(&icon_b, &[(IconType::RGB24_32x32, [0, 255, 0, 255])]);

        let (a, b) = std::thread::scope(|scope| {
            let a = scope.spawn(|| {
                (0..4)
                    .map(|_| encode_data_uri(&icon_a, 256, Extractor::Builtin).unwrap())
                    .collect::<Vec<_>>()
            });
            let b = scope.spawn(|| {
                (0..4)
                    .map(|_| encode_data_uri(&icon_b, 256, Extractor::Builtin).unwrap())
                    .collect::<Vec<_>>()
            });
            (a.join().unwrap(), b.join().unwrap())
        });

        for uri in a {
            let image = decode_data_uri(&uri);
            assert_eq!(image.dimensions(), (128, 128));
            assert_eq!(image.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        }
        for uri in b {
            let image = decode_data_uri(&uri);
            assert_eq!(image.dimensions(), (32, 32));
            assert_eq!(image.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
        }
    }
}
