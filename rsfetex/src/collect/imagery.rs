use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::collect::global_variables::{DEFAULT_IMAGERY_BASE_URL, DOWNLOAD_TIMEOUT_SECS};

/// Sensor product of the orthoimagery archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// Visible and near infrared, stored as flat-fielded tiles
    Vnir,
    /// Short-wave infrared
    Swir,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Vnir => "vnir",
            ImageType::Swir => "swir",
        }
    }

    /// Archive folder of this product, relative to the base URL
    pub fn folder(&self) -> String {
        format!("{}-ortho/", self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vnir" => Ok(ImageType::Vnir),
            "swir" => Ok(ImageType::Swir),
            other => anyhow::bail!("Unknown image type '{}', expected 'vnir' or 'swir'", other),
        }
    }
}

/// Name of the remote file holding `img_name`
pub fn download_name(img_name: &str, img_type: ImageType) -> String {
    match img_type {
        ImageType::Vnir => img_name.replace(".tif", "_flatfield.tif"),
        ImageType::Swir => img_name.to_string(),
    }
}

/// Full URL of an image: `<base>/<type>-ortho/<download name>`
pub fn image_url(base_url: &str, img_name: &str, img_type: ImageType) -> Result<Url> {
    let base = Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
    let folder = base
        .join(&img_type.folder())
        .context("Failed to build image folder URL")?;
    folder
        .join(&download_name(img_name, img_type))
        .with_context(|| format!("Failed to build URL for image {}", img_name))
}

/// Download one image into `save_folder`, saved under `img_name`.
///
/// Only `http` and `https` URLs are fetched. Returns the written path.
pub fn fetch_image<P: AsRef<Path>>(
    img_name: &str,
    img_type: ImageType,
    save_folder: P,
    base_url: Option<&str>,
) -> Result<PathBuf> {
    let url = image_url(
        base_url.unwrap_or(DEFAULT_IMAGERY_BASE_URL),
        img_name,
        img_type,
    )?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!(
            "Cannot fetch {}: the '{}' scheme is not supported, use an http(s) mirror",
            url,
            url.scheme()
        );
    }

    tracing::info!("Downloading {}", url);
    let client = Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")?;
    let response = client
        .get(url.clone())
        .send()
        .with_context(|| format!("Failed to download {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("Image URL returned {}: {}", response.status(), url);
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("Failed to read response body from {}", url))?;

    let save_folder = save_folder.as_ref();
    create_dir_all(save_folder)
        .with_context(|| format!("Failed to create directory {:?}", save_folder))?;
    let output_path = save_folder.join(img_name);
    write(&output_path, &bytes)
        .with_context(|| format!("Failed to write image to {}", output_path.display()))?;
    tracing::info!("Saved {} bytes to {:?}", bytes.len(), output_path);
    Ok(output_path)
}
