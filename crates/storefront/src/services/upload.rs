//! Product image uploads.
//!
//! Images are checked against an extension allow-list and a size cap,
//! shrunk to fit [`MAX_DIMENSION`] on either side (GIFs are stored as-is so
//! animation survives), then written to the object store under
//! `products/<uuid>.<ext>`.

use std::io::Cursor;

use image::{ImageFormat, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, instrument};

use super::storage::{ObjectStore, StorageError};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Longest side, in pixels, of a stored image.
pub const MAX_DIMENSION: u32 = 2000;

/// Errors from validating or storing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file uploaded")]
    MissingFile,

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("file exceeds {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("malformed upload: {0}")]
    Multipart(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("image processing failed: {0}")]
    Processing(String),
}

/// Accepted image kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageKind {
    /// Kind for a file name, by extension.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnsupportedType` for anything off the list.
    pub fn from_file_name(name: &str) -> Result<(Self, String), UploadError> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let kind = match ext.as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "webp" => Self::Webp,
            "gif" => Self::Gif,
            _ => {
                let shown = if ext.is_empty() { "none".to_string() } else { format!(".{ext}") };
                return Err(UploadError::UnsupportedType(shown));
            }
        };
        Ok((kind, ext))
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    const fn format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Webp => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
        }
    }
}

/// A validated image ready to be stored.
#[derive(Debug)]
pub struct PreparedImage {
    pub key: String,
    pub kind: ImageKind,
    pub body: Vec<u8>,
}

/// Validate and, if needed, shrink an uploaded image.
///
/// CPU-bound; call from `spawn_blocking`.
///
/// # Errors
///
/// Returns `UploadError` if the file is missing, too large, of an unlisted
/// type, or does not decode as the type its extension claims.
pub fn prepare(file_name: &str, bytes: Vec<u8>) -> Result<PreparedImage, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::MissingFile);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            max_bytes: MAX_UPLOAD_BYTES,
        });
    }

    let (kind, ext) = ImageKind::from_file_name(file_name)?;
    let key = format!("products/{}.{ext}", uuid::Uuid::new_v4());

    if kind == ImageKind::Gif {
        if !bytes.starts_with(b"GIF8") {
            return Err(UploadError::InvalidImage("not a GIF file".to_string()));
        }
        return Ok(PreparedImage {
            key,
            kind,
            body: bytes,
        });
    }

    let image = image::load_from_memory_with_format(&bytes, kind.format())
        .map_err(|e| UploadError::InvalidImage(e.to_string()))?;

    if image.width() <= MAX_DIMENSION && image.height() <= MAX_DIMENSION {
        return Ok(PreparedImage {
            key,
            kind,
            body: bytes,
        });
    }

    let resized = image.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3);
    debug!(
        from_width = image.width(),
        from_height = image.height(),
        width = resized.width(),
        height = resized.height(),
        "Resized upload"
    );

    let mut body = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut body), kind.format())
        .map_err(|e| UploadError::Processing(e.to_string()))?;

    Ok(PreparedImage { key, kind, body })
}

/// Prepare an upload off the async runtime and store it.
///
/// # Errors
///
/// Returns `UploadError` from validation, processing or storage.
#[instrument(skip(store, bytes), fields(size = bytes.len()))]
pub async fn upload_image(
    store: &dyn ObjectStore,
    file_name: String,
    bytes: Vec<u8>,
) -> Result<String, UploadError> {
    let prepared = tokio::task::spawn_blocking(move || prepare(&file_name, bytes))
        .await
        .map_err(|e| UploadError::Processing(e.to_string()))??;

    let url = store
        .put(&prepared.key, prepared.body, prepared.kind.content_type())
        .await?;

    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use image::{DynamicImage, RgbImage};

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[derive(Default)]
    struct MemoryStore {
        puts: Mutex<Vec<(String, usize, String)>>,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put(
            &self,
            key: &str,
            body: Vec<u8>,
            content_type: &str,
        ) -> Result<String, StorageError> {
            self.puts
                .lock()
                .unwrap()
                .push((key.to_string(), body.len(), content_type.to_string()));
            Ok(format!("https://cdn.test/{key}"))
        }
    }

    #[test]
    fn test_extension_allow_list() {
        assert_eq!(
            ImageKind::from_file_name("Photo.JPEG").unwrap(),
            (ImageKind::Jpeg, "jpeg".to_string())
        );
        assert!(matches!(
            ImageKind::from_file_name("script.svg"),
            Err(UploadError::UnsupportedType(ext)) if ext == ".svg"
        ));
        assert!(matches!(
            ImageKind::from_file_name("README"),
            Err(UploadError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_small_image_kept_as_is() {
        let bytes = png(20, 10);
        let prepared = prepare("thumb.png", bytes.clone()).unwrap();
        assert_eq!(prepared.body, bytes);
        assert!(prepared.key.starts_with("products/"));
        assert!(prepared.key.ends_with(".png"));
    }

    #[test]
    fn test_large_image_resized_to_fit() {
        let prepared = prepare("banner.png", png(2500, 100)).unwrap();
        let decoded = image::load_from_memory(&prepared.body).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2000, 80));
    }

    #[test]
    fn test_rejects_oversize_and_empty() {
        assert!(matches!(
            prepare("big.png", vec![0; MAX_UPLOAD_BYTES + 1]),
            Err(UploadError::TooLarge { .. })
        ));
        assert!(matches!(
            prepare("empty.png", Vec::new()),
            Err(UploadError::MissingFile)
        ));
    }

    #[test]
    fn test_rejects_mislabelled_file() {
        assert!(matches!(
            prepare("fake.png", b"definitely not a png".to_vec()),
            Err(UploadError::InvalidImage(_))
        ));
        assert!(matches!(
            prepare("fake.gif", b"PNG?".to_vec()),
            Err(UploadError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_gif_passthrough() {
        let bytes = b"GIF89a-rest-of-file".to_vec();
        let prepared = prepare("spin.gif", bytes.clone()).unwrap();
        assert_eq!(prepared.body, bytes);
        assert_eq!(prepared.kind.content_type(), "image/gif");
    }

    #[tokio::test]
    async fn test_upload_image_stores_under_products() {
        let store = MemoryStore::default();
        let url = upload_image(&store, "p.png".to_string(), png(4, 4))
            .await
            .unwrap();
        assert!(url.starts_with("https://cdn.test/products/"));
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].2, "image/png");
    }
}
