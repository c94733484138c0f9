use std::io::Cursor;

use image::ImageReader;
use tracing::{debug, warn};

use super::domain::{CandidateDocument, DocumentFile, ImageDimensions, MediaType};

/// Largest accepted upload, 2 MiB.
pub const MAX_DOCUMENT_BYTES: usize = 2 * 1024 * 1024;
pub const MIN_IMAGE_WIDTH: u32 = 200;
pub const MIN_IMAGE_HEIGHT: u32 = 200;

/// Characters rejected in declared filenames.
pub const UNSAFE_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Local validation failures. None of these ever reach the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid file type. Only JPG, PNG, PDF allowed.")]
    InvalidType { declared: String },
    #[error("File too large. Maximum size is 2MB.")]
    TooLarge { size: usize, max: usize },
    #[error("Filename contains invalid characters.")]
    UnsafeFilename { filename: String },
    #[error("Image too small. Minimum {min_width}x{min_height} pixels required.")]
    ImageTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Limits applied to candidate documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentPolicy {
    pub max_bytes: usize,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for DocumentPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_DOCUMENT_BYTES,
            min_width: MIN_IMAGE_WIDTH,
            min_height: MIN_IMAGE_HEIGHT,
        }
    }
}

impl DocumentPolicy {
    /// Type, size and filename checks, in that order. Shared with the sandbox service,
    /// which re-applies them server side.
    pub fn check_envelope(
        &self,
        filename: &str,
        declared_type: &str,
        byte_len: usize,
    ) -> Result<MediaType, ValidationError> {
        let media_type =
            MediaType::from_declared(declared_type).ok_or_else(|| ValidationError::InvalidType {
                declared: declared_type.to_string(),
            })?;

        if byte_len > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: byte_len,
                max: self.max_bytes,
            });
        }

        if filename.contains(UNSAFE_FILENAME_CHARS) {
            return Err(ValidationError::UnsafeFilename {
                filename: filename.to_string(),
            });
        }

        Ok(media_type)
    }

    fn check_dimensions(&self, dimensions: ImageDimensions) -> Result<(), ValidationError> {
        if dimensions.width < self.min_width || dimensions.height < self.min_height {
            return Err(ValidationError::ImageTooSmall {
                width: dimensions.width,
                height: dimensions.height,
                min_width: self.min_width,
                min_height: self.min_height,
            });
        }
        Ok(())
    }
}

/// Stateless validator turning a [`DocumentFile`] into a [`CandidateDocument`].
#[derive(Debug, Clone, Default)]
pub struct DocumentValidator {
    policy: DocumentPolicy,
}

impl DocumentValidator {
    pub fn new(policy: DocumentPolicy) -> Self {
        Self { policy }
    }

    /// Runs every check and only resolves once the image header read has finished.
    pub async fn validate(&self, file: DocumentFile) -> Result<CandidateDocument, ValidationError> {
        let media_type =
            self.policy
                .check_envelope(&file.filename, &file.media_type, file.content.len())?;

        if !media_type.is_image() {
            debug!(filename = %file.filename, "document accepted without reading dimensions");
            return Ok(CandidateDocument::new(file, media_type, None));
        }

        let declared = file.media_type.clone();
        let (file, dimensions) = tokio::task::spawn_blocking(move || {
            let dimensions = read_dimensions(&file.content);
            (file, dimensions)
        })
        .await
        .map_err(|err| {
            warn!(error = %err, "image header task failed");
            ValidationError::InvalidType {
                declared: declared.clone(),
            }
        })?;

        let dimensions = dimensions.ok_or(ValidationError::InvalidType { declared })?;
        self.policy.check_dimensions(dimensions)?;

        debug!(
            filename = %file.filename,
            width = dimensions.width,
            height = dimensions.height,
            "image document accepted"
        );
        Ok(CandidateDocument::new(file, media_type, Some(dimensions)))
    }
}

/// Reads only the image header; `None` when the bytes do not decode as a known format.
pub(crate) fn read_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    reader.format()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(ImageDimensions { width, height })
}
