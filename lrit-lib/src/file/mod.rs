//! LRIT file decoding.
mod header;

use std::io::Read;

use hifitime::Epoch;
#[cfg(feature = "serde")]
use serde::Serialize;
use tracing::trace;

use crate::prelude::*;
use crate::timecode::Cds;

pub use header::{
    ImageNavigation, ImageStructure, PrimaryHeader, RawRecord, SegmentIdentification,
    RECORD_PREFIX_LEN,
};

/// Header type constants.
pub mod header_type {
    pub use super::header::{
        ANNOTATION, IMAGE_NAVIGATION, IMAGE_STRUCTURE, PRIMARY, SEGMENT_IDENTIFICATION, TIMESTAMP,
    };
}

/// A decoded LRIT file: its header records and data field.
///
/// Header records this crate does not interpret are kept in `other`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LritFile {
    pub primary: PrimaryHeader,
    pub image_structure: Option<ImageStructure>,
    pub navigation: Option<ImageNavigation>,
    /// Annotation text, conventionally the file name.
    pub annotation: Option<String>,
    pub timestamp: Option<Epoch>,
    pub segment: Option<SegmentIdentification>,
    pub other: Vec<RawRecord>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub data: Vec<u8>,
}

impl LritFile {
    /// Decode a complete file from `buf`. Bytes beyond the data field are ignored.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if `buf` is shorter than the lengths given by the primary
    /// header, [Error::InvalidHeader] if header records are malformed.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let primary = PrimaryHeader::decode(buf)?;
        let total = primary.total_header_length as usize;
        if total < PrimaryHeader::LEN {
            return Err(Error::InvalidHeader(format!(
                "total header length {total} shorter than primary header"
            )));
        }
        if buf.len() < total {
            return Err(Error::NotEnoughData {
                actual: buf.len(),
                minimum: total,
            });
        }

        let mut file = LritFile {
            primary,
            image_structure: None,
            navigation: None,
            annotation: None,
            timestamp: None,
            segment: None,
            other: Vec::default(),
            data: Vec::default(),
        };

        let mut offset = PrimaryHeader::LEN;
        while offset < total {
            if total - offset < RECORD_PREFIX_LEN {
                return Err(Error::InvalidHeader(format!(
                    "truncated record at offset {offset}"
                )));
            }
            let header_type = buf[offset];
            let len = u16::from_be_bytes([buf[offset + 1], buf[offset + 2]]) as usize;
            if len < RECORD_PREFIX_LEN || offset + len > total {
                return Err(Error::InvalidHeader(format!(
                    "record type {header_type} at offset {offset} has invalid length {len}"
                )));
            }
            let record = &buf[offset..offset + len];
            trace!(header_type, offset, len, "header record");
            file.add_record(header_type, record)?;
            offset += len;
        }

        let data_len = primary.data_field_bytes().ok_or_else(|| {
            Error::InvalidHeader(format!(
                "data field length {} too large",
                primary.data_field_length
            ))
        })?;
        let end = total.checked_add(data_len).ok_or_else(|| {
            Error::InvalidHeader(format!("data field length {data_len} too large"))
        })?;
        if buf.len() < end {
            return Err(Error::NotEnoughData {
                actual: buf.len(),
                minimum: end,
            });
        }
        file.data = buf[total..end].to_vec();

        Ok(file)
    }

    /// Read a single file from `r`, consuming exactly its header and data field.
    ///
    /// # Errors
    /// Any `std::io::Error` reading the primary header, [Error::NotEnoughData] if `r` ends
    /// before the lengths given by the primary header, or the errors of [Self::decode].
    pub fn read<R>(mut r: R) -> Result<Self>
    where
        R: Read,
    {
        let mut buf = vec![0u8; PrimaryHeader::LEN];
        r.read_exact(&mut buf)?;
        let primary = PrimaryHeader::decode(&buf)?;
        if (primary.total_header_length as usize) < PrimaryHeader::LEN {
            return Err(Error::InvalidHeader(format!(
                "total header length {} shorter than primary header",
                primary.total_header_length
            )));
        }
        let total = primary
            .data_field_bytes()
            .and_then(|len| len.checked_add(primary.total_header_length as usize))
            .ok_or_else(|| Error::InvalidHeader("file length too large".to_string()))?;

        // Lengths come from the file, so only grow the buffer with bytes actually read.
        r.take((total - PrimaryHeader::LEN) as u64)
            .read_to_end(&mut buf)?;
        if buf.len() < total {
            return Err(Error::NotEnoughData {
                actual: buf.len(),
                minimum: total,
            });
        }

        Self::decode(&buf)
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        self.primary.file_type_code == PrimaryHeader::IMAGE_DATA
    }

    fn add_record(&mut self, header_type: u8, record: &[u8]) -> Result<()> {
        match header_type {
            header::PRIMARY => {
                return Err(Error::InvalidHeader(
                    "primary header must only appear first".to_string(),
                ))
            }
            header::IMAGE_STRUCTURE => {
                self.image_structure = Some(ImageStructure::decode(record)?);
            }
            header::IMAGE_NAVIGATION => {
                self.navigation = Some(ImageNavigation::decode(record)?);
            }
            header::ANNOTATION => {
                self.annotation = Some(header::decode_text(&record[RECORD_PREFIX_LEN..]));
            }
            header::TIMESTAMP => {
                // P-field precedes the CDS T-field
                let body = &record[RECORD_PREFIX_LEN..];
                if body.is_empty() {
                    return Err(Error::NotEnoughData {
                        actual: record.len(),
                        minimum: RECORD_PREFIX_LEN + 1 + Cds::LRIT.num_bytes(),
                    });
                }
                self.timestamp = Some(Cds::LRIT.decode(&body[1..])?);
            }
            header::SEGMENT_IDENTIFICATION => {
                self.segment = Some(SegmentIdentification::decode(record)?);
            }
            _ => self.other.push(RawRecord {
                header_type,
                data: record[RECORD_PREFIX_LEN..].to_vec(),
            }),
        }
        Ok(())
    }
}
