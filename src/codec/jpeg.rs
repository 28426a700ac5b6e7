//! JPEG marker handling for EXIF preservation.
//!
//! The encoder writes a bare JFIF stream, so EXIF metadata is carried over
//! by copying the source's APP1 `Exif` segment verbatim into the output,
//! directly after its SOI marker:
//!
//! ```text
//! source:  SOI [APP0] APP1(Exif) ... SOS ... EOI
//!                      │
//!                      ▼
//! output:  SOI APP1(Exif) APP0 ... SOS ... EOI
//! ```

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// Start Of Scan marker
const SOS: u8 = 0xDA;

/// End Of Image marker
const EOI: u8 = 0xD9;

/// Application segment 1 (EXIF / XMP)
const APP1: u8 = 0xE1;

/// Identifier that opens an EXIF APP1 payload
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Find the APP1 EXIF segment of a JPEG stream, marker included.
///
/// Scanning stops at the first SOS; metadata never follows image data.
pub fn exif_segment(data: &[u8]) -> Option<&[u8]> {
    if data.len() < 4 || data[0..2] != SOI {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }

        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == SOS || marker == EOI {
            return None;
        }

        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let end = pos + 2 + length;
        if length < 2 || end > data.len() {
            return None;
        }

        let payload = &data[pos + 4..end];
        if marker == APP1 && payload.starts_with(EXIF_HEADER) {
            return Some(&data[pos..end]);
        }

        pos = end;
    }

    None
}

/// Insert an APP1 segment after the SOI marker of `jpeg`.
///
/// Returns `jpeg` unchanged when it is not a JPEG stream.
pub fn insert_segment(jpeg: Vec<u8>, segment: &[u8]) -> Vec<u8> {
    if jpeg.len() < 2 || jpeg[0..2] != SOI {
        return jpeg;
    }

    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(segment);
    out.extend_from_slice(&jpeg[2..]);
    out
}
