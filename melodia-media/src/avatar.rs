use melodia_blob::{BlobError, BlobResult};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;

/// Frame header facts of a validated JPEG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegInfo {
    pub width: u16,
    pub height: u16,
    pub components: u8,
}

/// Check that `data` is a complete JPEG image: start marker, a frame header
/// with non-zero dimensions ahead of the scan data, and an end marker.
pub fn validate_jpeg(data: &[u8]) -> BlobResult<JpegInfo> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != SOI {
        return Err(BlobError::invalid_content("not a JPEG image: missing start marker"));
    }
    if data[data.len() - 2] != 0xFF || data[data.len() - 1] != EOI {
        return Err(BlobError::invalid_content("truncated JPEG image: missing end marker"));
    }

    let mut pos = 2;
    loop {
        if pos >= data.len() || data[pos] != 0xFF {
            return Err(BlobError::invalid_content(format!("corrupt JPEG segment at byte {}", pos)));
        }
        // Markers may be preceded by any number of fill bytes
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        let marker = *data
            .get(pos)
            .ok_or_else(|| BlobError::invalid_content("corrupt JPEG: dangling marker"))?;
        pos += 1;

        match marker {
            0x01 | 0xD0..=0xD7 => continue,
            EOI | SOS => return Err(BlobError::invalid_content("JPEG image has no frame header")),
            _ => {}
        }

        let length = match data.get(pos..pos + 2) {
            Some(raw) => u16::from_be_bytes([raw[0], raw[1]]) as usize,
            None => return Err(BlobError::invalid_content("corrupt JPEG: segment length cut off")),
        };
        if length < 2 || pos + length > data.len() {
            return Err(BlobError::invalid_content(format!(
                "corrupt JPEG: segment 0x{:02X} claims {} bytes",
                marker, length
            )));
        }
        let segment = &data[pos + 2..pos + length];

        if is_frame_header(marker) {
            if segment.len() < 6 {
                return Err(BlobError::invalid_content("corrupt JPEG: short frame header"));
            }
            let info = JpegInfo {
                height: u16::from_be_bytes([segment[1], segment[2]]),
                width: u16::from_be_bytes([segment[3], segment[4]]),
                components: segment[5],
            };
            if info.width == 0 || info.height == 0 {
                return Err(BlobError::invalid_content("JPEG image has zero dimensions"));
            }
            return Ok(info);
        }

        pos += length;
    }
}

/// SOF0..SOF15, minus DHT (C4), JPG (C8) and DAC (CC)
fn is_frame_header(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Smallest structure `validate_jpeg` accepts: SOI, APP0, SOF0, SOS, EOI
    pub(crate) fn tiny_jpeg(width: u16, height: u16) -> Vec<u8> {
        let mut data = vec![0xFF, SOI];
        // APP0 "JFIF"
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0]);
        // SOF0, one component
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
        // SOS plus a byte of scan data
        data.extend_from_slice(&[0xFF, SOS, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0x55]);
        data.extend_from_slice(&[0xFF, EOI]);
        data
    }

    #[test]
    fn test_accepts_minimal_jpeg() {
        let info = validate_jpeg(&tiny_jpeg(64, 48)).unwrap();
        assert_eq!(info, JpegInfo { width: 64, height: 48, components: 1 });
    }

    #[test]
    fn test_rejects_png() {
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
        assert!(matches!(validate_jpeg(png), Err(BlobError::InvalidContent { .. })));
    }

    #[test]
    fn test_rejects_truncated_image() {
        let mut data = tiny_jpeg(8, 8);
        data.truncate(data.len() - 2);
        assert!(matches!(validate_jpeg(&data), Err(BlobError::InvalidContent { .. })));
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(validate_jpeg(&tiny_jpeg(0, 10)).is_err());
    }

    #[test]
    fn test_rejects_segment_overrun() {
        let mut data = tiny_jpeg(8, 8);
        // Inflate the APP0 length past the end of the buffer
        data[4] = 0x7F;
        assert!(matches!(validate_jpeg(&data), Err(BlobError::InvalidContent { .. })));
    }

    #[test]
    fn test_rejects_empty_payload() {
        assert!(validate_jpeg(&[]).is_err());
    }
}
