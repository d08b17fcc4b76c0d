use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageReader;
use tokio::fs;
use uuid::Uuid;

use crate::config::Settings;
use crate::constants::{ALLOWED_IMAGE_EXTENSIONS, MAX_IMAGE_DIMENSION};
use crate::error::Error;

/// Checks the extension allow-list and the size cap. Runs before any
/// byte touches disk, so a rejected upload leaves no partial file.
pub fn validate_upload(filename: &str, size: usize, settings: &Settings) -> Result<String, Error> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(Error::Validation(format!(
            "unsupported file type, allowed: {}",
            ALLOWED_IMAGE_EXTENSIONS.join(", ")
        )));
    }

    if size > settings.max_upload_size {
        return Err(Error::Validation(format!(
            "file exceeds the maximum size of {} bytes",
            settings.max_upload_size
        )));
    }

    Ok(extension)
}

/// Persists an upload under a random name inside the tenant's directory
/// and returns the public URL it will be served from. Oversized images
/// are downscaled in place; if the bytes turn out not to decode as an
/// image the original file is kept as stored.
pub async fn store_image(
    upload_dir: &Path,
    tenant: &str,
    filename: &str,
    data: &[u8],
    settings: &Settings,
) -> Result<String, Error> {
    let extension = validate_upload(filename, data.len(), settings)?;

    let stored_name = format!("{}.{extension}", Uuid::new_v4());
    let target = upload_dir.join(&stored_name);

    fs::create_dir_all(upload_dir).await?;
    fs::write(&target, data).await?;

    if let Err(e) = downscale_in_place(&target, data) {
        log::warn!("keeping original upload {stored_name}: {e}");
    }

    Ok(format!("/uploads/{tenant}/{stored_name}"))
}

/// Best-effort removal of a stored image by its public URL. Only the
/// final path component is used, so a mangled URL can never reach
/// outside the tenant's directory.
pub async fn remove_image(upload_dir: &Path, image_url: &str) {
    let path = match stored_path(upload_dir, image_url) {
        Some(path) => path,
        None => return,
    };

    if let Err(e) = fs::remove_file(&path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("could not remove {}: {e}", path.display());
        }
    }
}

pub fn stored_path(upload_dir: &Path, image_url: &str) -> Option<PathBuf> {
    let name = image_url.rsplit('/').next()?;
    if name.is_empty() || name.contains("..") {
        return None;
    }
    Some(upload_dir.join(name))
}

fn downscale_in_place(path: &Path, data: &[u8]) -> Result<(), image::ImageError> {
    let decoded = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;

    if decoded.width() <= MAX_IMAGE_DIMENSION && decoded.height() <= MAX_IMAGE_DIMENSION {
        return Ok(());
    }

    let resized = decoded.thumbnail(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION);
    resized.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list_is_enforced() {
        let settings = Settings::default();
        assert!(validate_upload("photo.JPG", 1024, &settings).is_ok());
        assert!(validate_upload("photo.webp", 1024, &settings).is_ok());
        assert!(validate_upload("photo.bmp", 1024, &settings).is_err());
        assert!(validate_upload("no-extension", 1024, &settings).is_err());
    }

    #[test]
    fn size_cap_is_enforced() {
        let settings = Settings::default();
        assert!(validate_upload("photo.png", settings.max_upload_size, &settings).is_ok());
        assert!(validate_upload("photo.png", settings.max_upload_size + 1, &settings).is_err());
    }

    #[test]
    fn stored_path_strips_directories_from_the_url() {
        let dir = Path::new("/srv/uploads/7");
        let path = stored_path(dir, "/uploads/7/abc.png").unwrap();
        assert_eq!(path, dir.join("abc.png"));
        assert!(stored_path(dir, "/uploads/7/").is_none());
    }
}
