use image::ImageFormat;

/// Offset of the `DICM` magic in a DICOM part-10 file (after the preamble).
const DICOM_MAGIC_OFFSET: usize = 128;
const DICOM_MAGIC: &[u8] = b"DICM";

/// Kind of file accepted for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Raster(ImageFormat),
    Dicom,
}

/// An image file staged for submission to the analysis service.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Sniff the payload format before spending an upload on it.
    ///
    /// DICOM is recognized by the `DICM` magic at offset 128; everything else
    /// goes through raster format detection.
    pub fn detect_kind(&self) -> Result<ImageKind, UploadError> {
        if self.bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        if self.bytes.len() > DICOM_MAGIC_OFFSET + DICOM_MAGIC.len()
            && &self.bytes[DICOM_MAGIC_OFFSET..DICOM_MAGIC_OFFSET + DICOM_MAGIC.len()]
                == DICOM_MAGIC
        {
            return Ok(ImageKind::Dicom);
        }

        image::guess_format(&self.bytes)
            .map(ImageKind::Raster)
            .map_err(|_| UploadError::UnsupportedFormat)
    }

    /// MIME type sent with the multipart upload.
    pub fn mime_type(&self) -> &'static str {
        match self.detect_kind() {
            Ok(ImageKind::Dicom) => "application/dicom",
            Ok(ImageKind::Raster(format)) => format.to_mime_type(),
            Err(_) => "application/octet-stream",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Unsupported file format: expected PNG, JPEG, WEBP or DICOM (.dcm)")]
    UnsupportedFormat,

    #[error("Empty upload")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn dicom_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; DICOM_MAGIC_OFFSET];
        bytes.extend_from_slice(DICOM_MAGIC);
        bytes.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);
        bytes
    }

    #[test]
    fn test_detects_png() {
        let payload = ImagePayload::new("scan.png", PNG_MAGIC.to_vec());
        assert_eq!(
            payload.detect_kind().unwrap(),
            ImageKind::Raster(ImageFormat::Png)
        );
        assert_eq!(payload.mime_type(), "image/png");
    }

    #[test]
    fn test_detects_dicom() {
        let payload = ImagePayload::new("scan.dcm", dicom_bytes());
        assert_eq!(payload.detect_kind().unwrap(), ImageKind::Dicom);
        assert_eq!(payload.mime_type(), "application/dicom");
    }

    #[test]
    fn test_rejects_garbage() {
        let payload = ImagePayload::new("notes.txt", b"not an image at all".to_vec());
        assert!(matches!(
            payload.detect_kind(),
            Err(UploadError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_rejects_empty() {
        let payload = ImagePayload::new("empty.png", Vec::new());
        assert!(matches!(payload.detect_kind(), Err(UploadError::Empty)));
    }
}
