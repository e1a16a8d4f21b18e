//! LRIT header records.
//!
//! Every record starts with a 1 byte header type and a 2 byte record length that
//! includes those 3 bytes. All integers are big-endian.
//!
//! Reference: CGMS LRIT/HRIT Global Specification (CGMS 03), section 4.
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::prelude::*;

/// Length of the type and length fields common to all records.
pub const RECORD_PREFIX_LEN: usize = 3;

pub const PRIMARY: u8 = 0;
pub const IMAGE_STRUCTURE: u8 = 1;
pub const IMAGE_NAVIGATION: u8 = 2;
pub const ANNOTATION: u8 = 4;
pub const TIMESTAMP: u8 = 5;
/// Mission specific segment identification used by segmented image products.
pub const SEGMENT_IDENTIFICATION: u8 = 128;

fn check_record(buf: &[u8], header_type: u8, len: usize) -> Result<()> {
    if buf.len() < len {
        return Err(Error::NotEnoughData {
            actual: buf.len(),
            minimum: len,
        });
    }
    if buf[0] != header_type {
        return Err(Error::InvalidHeader(format!(
            "expected header type {header_type}, got {}",
            buf[0]
        )));
    }
    let record_len = u16::from_be_bytes([buf[1], buf[2]]) as usize;
    if record_len != len {
        return Err(Error::InvalidHeader(format!(
            "header type {header_type} must have length {len}, got {record_len}"
        )));
    }
    Ok(())
}

fn be_i32(buf: &[u8]) -> i32 {
    i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Decode fixed-width text, dropping NUL padding and surrounding whitespace.
pub(crate) fn decode_text(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// Header type 0. Always the first record in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PrimaryHeader {
    /// 0 for image data, see [Self::IMAGE_DATA].
    pub file_type_code: u8,
    /// Length of all header records, including this one.
    pub total_header_length: u32,
    /// Length of the data field in bits.
    pub data_field_length: u64,
}

impl PrimaryHeader {
    pub const LEN: usize = 16;
    pub const IMAGE_DATA: u8 = 0;

    /// Decode from the first [Self::LEN] bytes of `buf`.
    ///
    /// # Errors
    /// [Error::NotEnoughData] or [Error::InvalidHeader] if the record is not a primary header.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_record(buf, PRIMARY, Self::LEN)?;
        Ok(PrimaryHeader {
            file_type_code: buf[3],
            total_header_length: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            data_field_length: u64::from_be_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
        })
    }

    /// Data field length rounded up to whole bytes, or `None` if it does not fit in a
    /// `usize`.
    #[must_use]
    pub fn data_field_bytes(&self) -> Option<usize> {
        usize::try_from(self.data_field_length.div_ceil(8)).ok()
    }
}

/// Header type 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ImageStructure {
    pub bits_per_pixel: u8,
    pub columns: u16,
    pub lines: u16,
    /// 0 for no compression.
    pub compression: u8,
}

impl ImageStructure {
    pub const LEN: usize = 9;

    /// # Errors
    /// [Error::NotEnoughData] or [Error::InvalidHeader] for a malformed record.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_record(buf, IMAGE_STRUCTURE, Self::LEN)?;
        Ok(ImageStructure {
            bits_per_pixel: buf[3],
            columns: u16::from_be_bytes([buf[4], buf[5]]),
            lines: u16::from_be_bytes([buf[6], buf[7]]),
            compression: buf[8],
        })
    }
}

/// Header type 2. Relates image columns and lines to the projection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ImageNavigation {
    /// Projection name, e.g., `GEOS(076.0)`.
    pub projection: String,
    pub column_scaling: i32,
    pub line_scaling: i32,
    pub column_offset: i32,
    pub line_offset: i32,
}

impl ImageNavigation {
    pub const LEN: usize = 51;
    const PROJECTION_LEN: usize = 32;

    /// # Errors
    /// [Error::NotEnoughData] or [Error::InvalidHeader] for a malformed record.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_record(buf, IMAGE_NAVIGATION, Self::LEN)?;
        let (name, rest) = buf[RECORD_PREFIX_LEN..].split_at(Self::PROJECTION_LEN);
        Ok(ImageNavigation {
            projection: decode_text(name),
            column_scaling: be_i32(&rest[0..4]),
            line_scaling: be_i32(&rest[4..8]),
            column_offset: be_i32(&rest[8..12]),
            line_offset: be_i32(&rest[12..16]),
        })
    }
}

/// Header type 128. Locates a segment within its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SegmentIdentification {
    /// Ground processing spacecraft identifier.
    pub spacecraft_id: u16,
    /// Spectral channel.
    pub channel: u8,
    /// Sequence number of this segment, between `planned_start` and `planned_end`.
    pub sequence: u16,
    pub planned_start: u16,
    pub planned_end: u16,
    /// 0 for no compression.
    pub compression: u8,
}

impl SegmentIdentification {
    pub const LEN: usize = 13;

    /// # Errors
    /// [Error::NotEnoughData] or [Error::InvalidHeader] for a malformed record.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_record(buf, SEGMENT_IDENTIFICATION, Self::LEN)?;
        Ok(SegmentIdentification {
            spacecraft_id: u16::from_be_bytes([buf[3], buf[4]]),
            channel: buf[5],
            sequence: u16::from_be_bytes([buf[6], buf[7]]),
            planned_start: u16::from_be_bytes([buf[8], buf[9]]),
            planned_end: u16::from_be_bytes([buf[10], buf[11]]),
            compression: buf[12],
        })
    }

    /// Zero-based segment index and total number of segments.
    ///
    /// # Errors
    /// [Error::SegmentSequence] if the sequence is outside the planned range.
    pub fn index(&self) -> Result<(usize, usize)> {
        if self.planned_end < self.planned_start
            || !(self.planned_start..=self.planned_end).contains(&self.sequence)
        {
            return Err(Error::SegmentSequence {
                sequence: self.sequence,
                start: self.planned_start,
                end: self.planned_end,
            });
        }
        Ok((
            usize::from(self.sequence - self.planned_start),
            usize::from(self.planned_end - self.planned_start) + 1,
        ))
    }
}

/// A record of a type this crate does not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RawRecord {
    pub header_type: u8,
    /// Record bytes after the type and length fields.
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn primary() {
        #[rustfmt::skip]
        let dat: &[u8] = &[
            0x00, 0x00, 0x10,
            0x00,
            0x00, 0x00, 0x00, 0x2e,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01,
        ];
        let hdr = PrimaryHeader::decode(dat).unwrap();
        assert_eq!(hdr.file_type_code, PrimaryHeader::IMAGE_DATA);
        assert_eq!(hdr.total_header_length, 46);
        assert_eq!(hdr.data_field_length, 257);
        assert_eq!(hdr.data_field_bytes(), Some(33));
    }

    #[test]
    fn primary_wrong_type() {
        let mut dat = [0u8; 16];
        dat[0] = 1;
        dat[2] = 16;
        assert!(matches!(
            PrimaryHeader::decode(&dat),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn primary_wrong_length() {
        let mut dat = [0u8; 16];
        dat[2] = 15;
        assert!(matches!(
            PrimaryHeader::decode(&dat),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn image_structure() {
        let dat: &[u8] = &[0x01, 0x00, 0x09, 0x08, 0x05, 0xdc, 0x00, 0x64, 0x00];
        let hdr = ImageStructure::decode(dat).unwrap();
        assert_eq!(
            hdr,
            ImageStructure {
                bits_per_pixel: 8,
                columns: 1500,
                lines: 100,
                compression: 0,
            }
        );
    }

    #[test]
    fn image_navigation() {
        let mut dat = vec![0x02, 0x00, 0x33];
        let mut name = b"GEOS(076.0)".to_vec();
        name.resize(32, 0);
        dat.extend(name);
        dat.extend(10_233_128i32.to_be_bytes());
        dat.extend((-10_233_128i32).to_be_bytes());
        dat.extend(1392i32.to_be_bytes());
        dat.extend((-27i32).to_be_bytes());

        let hdr = ImageNavigation::decode(&dat).unwrap();
        assert_eq!(hdr.projection, "GEOS(076.0)");
        assert_eq!(hdr.column_scaling, 10_233_128);
        assert_eq!(hdr.line_scaling, -10_233_128);
        assert_eq!(hdr.column_offset, 1392);
        assert_eq!(hdr.line_offset, -27);
    }

    #[test]
    fn segment_identification() {
        #[rustfmt::skip]
        let dat: &[u8] = &[
            0x80, 0x00, 0x0d,
            0x00, 0x13,
            0x03,
            0x00, 0x04,
            0x00, 0x01,
            0x00, 0x06,
            0x00,
        ];
        let hdr = SegmentIdentification::decode(dat).unwrap();
        assert_eq!(hdr.spacecraft_id, 19);
        assert_eq!(hdr.channel, 3);
        assert_eq!(hdr.sequence, 4);
        assert_eq!(hdr.index().unwrap(), (3, 6));
    }

    #[test_case(0, 1, 6 ; "before start")]
    #[test_case(7, 1, 6 ; "after end")]
    #[test_case(3, 6, 1 ; "inverted range")]
    fn segment_index_out_of_sequence(sequence: u16, start: u16, end: u16) {
        let hdr = SegmentIdentification {
            spacecraft_id: 0,
            channel: 0,
            sequence,
            planned_start: start,
            planned_end: end,
            compression: 0,
        };
        assert!(matches!(hdr.index(), Err(Error::SegmentSequence { .. })));
    }

    #[test]
    fn truncated_record() {
        let dat: &[u8] = &[0x01, 0x00, 0x09, 0x08, 0x05];
        assert!(matches!(
            ImageStructure::decode(dat),
            Err(Error::NotEnoughData {
                actual: 5,
                minimum: 9
            })
        ));
    }

    #[test]
    fn text_padding() {
        assert_eq!(decode_text(b"  abc\0\0\0"), "abc");
    }
}
