use base64::engine::{general_purpose::STANDARD, Engine};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{CalResult, Error};

/// Encoded images larger than this are halved once before sending
pub const MAX_ENCODED_BYTES: usize = 100 * 1024 * 1024;

/// The image formats the model accepts, keyed by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageKind {
    /// Map a file extension (case-insensitive, without the dot) to a kind
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Determine the kind from a path's extension alone
    pub fn from_path(path: &Path) -> CalResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        Self::from_extension(ext).ok_or_else(|| {
            if ext.is_empty() {
                Error::UnsupportedFormat(format!("{} has no extension", path.display()))
            } else {
                Error::UnsupportedFormat(format!(".{}", ext.to_ascii_lowercase()))
            }
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    fn format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Webp => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
        }
    }
}

/// An image ready to be attached to a model request
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Base64 text of the encoded image
    pub data: String,
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    /// Size of the encoded buffer before base64
    pub encoded_len: usize,
    /// Whether the size ceiling forced a downscale
    pub downscaled: bool,
}

impl PreparedImage {
    pub fn media_type(&self) -> &'static str {
        self.kind.media_type()
    }
}

/// Loads image files and turns them into model attachments
#[derive(Debug, Clone, Copy)]
pub struct ImagePreparer {
    max_encoded_bytes: usize,
}

impl Default for ImagePreparer {
    fn default() -> Self {
        Self {
            max_encoded_bytes: MAX_ENCODED_BYTES,
        }
    }
}

impl ImagePreparer {
    pub fn new(max_encoded_bytes: usize) -> Self {
        Self { max_encoded_bytes }
    }

    pub fn max_encoded_bytes(&self) -> usize {
        self.max_encoded_bytes
    }

    /// Load, normalize and encode the image at `path`.
    ///
    /// The extension decides the output format and is checked before the file
    /// is opened. If the first encoding is over the ceiling the image is
    /// halved once and re-encoded; the result is not checked again.
    pub fn prepare(&self, path: &Path) -> CalResult<PreparedImage> {
        let kind = ImageKind::from_path(path)?;

        let img = load_image(path)?;
        let img = drop_alpha(img);

        let mut buffer = encode(&img, kind)?;
        let mut width = img.width();
        let mut height = img.height();
        let mut downscaled = false;

        if buffer.len() > self.max_encoded_bytes {
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            warn!(
                "Encoded image is {} bytes (limit {}), downscaling to {}x{}",
                buffer.len(),
                self.max_encoded_bytes,
                width,
                height
            );
            let resized = img.resize_exact(width, height, FilterType::CatmullRom);
            buffer = encode(&resized, kind)?;
            downscaled = true;
        }

        info!(
            "Prepared {} as {} ({}x{}, {} bytes)",
            path.display(),
            kind.media_type(),
            width,
            height,
            buffer.len()
        );

        Ok(PreparedImage {
            data: STANDARD.encode(&buffer),
            kind,
            width,
            height,
            encoded_len: buffer.len(),
            downscaled,
        })
    }
}

fn load_image(path: &Path) -> CalResult<DynamicImage> {
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| Error::Image(format!("Failed to decode {}: {}", path.display(), e)))?;

    debug!(
        "Loaded {} with dimensions {}x{} ({:?})",
        path.display(),
        img.width(),
        img.height(),
        img.color()
    );

    Ok(img)
}

/// Flatten any alpha channel away; JPEG cannot carry it
fn drop_alpha(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        debug!("Dropping alpha channel from {:?} image", img.color());
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    }
}

fn encode(img: &DynamicImage, kind: ImageKind) -> CalResult<Vec<u8>> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), kind.format())
        .map_err(|e| Error::Image(format!("Failed to encode image as {}: {}", kind.name(), e)))?;
    Ok(buffer)
}
