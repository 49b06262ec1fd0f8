use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::io::{read_image_cube, RasterData};

/// Sample identifier of a file name: the text between `sample_` and the
/// next underscore.
///
/// `"stratum_a_sample_42_rgb.tif"` gives `Some("42")`.
pub fn get_fid(sample_name: &str) -> Option<&str> {
    let start = sample_name.find("sample_")? + "sample_".len();
    let rest = &sample_name[start..];
    // at least one character before the closing underscore
    let mut chars = rest.char_indices();
    chars.next()?;
    chars
        .find(|&(_, ch)| ch == '_')
        .map(|(end, _)| &rest[..end])
}

/// GeoTIFF files of `base_path` whose name contains `stratum`, sorted by
/// name. Files whose sample identifier is blacklisted are skipped.
pub fn list_stratum_images<P: AsRef<Path>>(
    base_path: P,
    stratum: &str,
    blacklist: &[String],
) -> Result<Vec<PathBuf>> {
    let base_path = base_path.as_ref();
    let entries = std::fs::read_dir(base_path)
        .with_context(|| format!("Failed to list directory {:?}", base_path))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry of {:?}", base_path))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.contains(stratum) || !name.ends_with(".tif") {
            continue;
        }
        if get_fid(name).map_or(false, |fid| blacklist.iter().any(|b| b == fid)) {
            tracing::debug!("Skipping blacklisted image {}", name);
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

/// Read every image of a stratum, keyed by file name
pub fn read_stratum_images<P: AsRef<Path>>(
    base_path: P,
    stratum: &str,
    blacklist: &[String],
) -> Result<BTreeMap<String, RasterData>> {
    let mut images = BTreeMap::new();
    for path in list_stratum_images(base_path, stratum, blacklist)? {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid image file name {:?}", path))?;
        tracing::debug!("Reading image {}", name);
        let raster = read_image_cube(&path)?;
        images.insert(name, raster);
    }
    Ok(images)
}
