use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use thiserror::Error;
use tracing::debug;

use tempo_client::types::FilePayload;

/// Attachments above this size are rejected before any processing.
pub const MAX_ATTACHMENT_SIZE: u64 = 20 * 1024 * 1024;

/// Longer image dimension after downscaling.
pub const MAX_IMAGE_DIMENSION: u32 = 1200;

/// Fixed JPEG re-encode quality (0.7).
pub const JPEG_QUALITY: u8 = 70;

/// Text previews are truncated to this many characters for local display.
pub const TEXT_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("file is {size} bytes, over the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
}

pub type PreprocessResult<T> = Result<T, PreprocessError>;

/// An attachment ready for upload. `bytes` is the transmission payload;
/// `preview` is presentation-only and never substituted for it.
#[derive(Debug, Clone)]
pub struct PreparedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
    pub preview: Option<String>,
}

impl From<PreparedFile> for FilePayload {
    fn from(file: PreparedFile) -> Self {
        FilePayload {
            name: file.name,
            media_type: file.media_type,
            bytes: file.bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileClass {
    Image,
    Text,
    Opaque,
}

/// Decodable raster types; everything else under `image/` (svg and friends)
/// is treated as opaque.
const RASTER_SUBTYPES: &[&str] = &["png", "jpeg", "jpg", "gif", "webp", "bmp"];

const TEXT_MEDIA_TYPES: &[&str] = &["application/json", "application/xml", "application/csv"];

fn classify(media_type: &str) -> FileClass {
    let media_type = media_type.to_ascii_lowercase();
    if let Some(subtype) = media_type.strip_prefix("image/") {
        if RASTER_SUBTYPES.contains(&subtype) {
            return FileClass::Image;
        }
        return FileClass::Opaque;
    }
    if media_type.starts_with("text/") || TEXT_MEDIA_TYPES.contains(&media_type.as_str()) {
        return FileClass::Text;
    }
    FileClass::Opaque
}

/// Prepare a file on disk for upload. The size gate runs against filesystem
/// metadata before any content is read.
pub fn prepare_file(path: &Path, media_type: &str) -> PreprocessResult<PreparedFile> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_ATTACHMENT_SIZE {
        return Err(PreprocessError::FileTooLarge {
            size,
            max: MAX_ATTACHMENT_SIZE,
        });
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    let bytes = std::fs::read(path)?;

    prepare_bytes(name, media_type, bytes)
}

/// Prepare an already-read payload (picker, drag-and-drop). The size gate
/// still runs before any decoding.
pub fn prepare_bytes(
    name: impl Into<String>,
    media_type: &str,
    bytes: Vec<u8>,
) -> PreprocessResult<PreparedFile> {
    let name = name.into();
    let size = bytes.len() as u64;
    if size > MAX_ATTACHMENT_SIZE {
        return Err(PreprocessError::FileTooLarge {
            size,
            max: MAX_ATTACHMENT_SIZE,
        });
    }

    match classify(media_type) {
        FileClass::Image => {
            let compressed = compress_image(&bytes)?;
            debug!(
                file_name = %name,
                original = bytes.len(),
                compressed = compressed.len(),
                "image downscaled for upload"
            );
            Ok(PreparedFile {
                name,
                media_type: "image/jpeg".to_string(),
                bytes: compressed,
                preview: None,
            })
        }
        FileClass::Text => {
            let preview = text_preview(&bytes);
            Ok(PreparedFile {
                name,
                media_type: media_type.to_string(),
                bytes,
                preview: Some(preview),
            })
        }
        FileClass::Opaque => Ok(PreparedFile {
            name,
            media_type: media_type.to_string(),
            bytes,
            preview: None,
        }),
    }
}

/// Decode, fit into the bounding square preserving aspect ratio, re-encode
/// as JPEG at the fixed quality.
fn compress_image(bytes: &[u8]) -> PreprocessResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;

    let scaled = if decoded.width().max(decoded.height()) > MAX_IMAGE_DIMENSION {
        decoded.resize(MAX_IMAGE_DIMENSION, MAX_IMAGE_DIMENSION, FilterType::Triangle)
    } else {
        decoded
    };

    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    scaled.to_rgb8().write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

/// First [`TEXT_PREVIEW_CHARS`] characters of the decoded text, for display
/// only. The full content is still uploaded untruncated.
fn text_preview(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.chars().take(TEXT_PREVIEW_CHARS).collect()
}
