//! CCSDS Day Segmented time code decoding, as used by LRIT time stamp records.
//!
//! Reference: [CCSDS Time Code Formats](https://public.ccsds.org/Pubs/301x0b4e1.pdf)
use hifitime::{Duration, Epoch};

use crate::prelude::*;

/// Number of seconds between the 1958 and 1900
const CCSDS_HIFIEPOCH_DELTA_SECS: u64 = 1830297600;
/// Number of bytes for the CDS milliseconds field
const NUM_CDS_MILLIS_OF_DAY_BYTES: usize = 4;

/// Day segmented time code layout.
///
/// Valid combinations are:
/// |`num_day`|`num_submillis`| |
/// |---|---|---|
/// |2|0|No sub-milliseconds|
/// |2|2|Microsecond resolution|
/// |3|0|No sub-milliseconds|
/// |3|2|Microsecond resolution|
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cds {
    pub num_day: usize,
    pub num_submillis: usize,
}

impl Cds {
    /// Layout of the T-field in an LRIT time stamp record.
    pub const LRIT: Cds = Cds {
        num_day: 2,
        num_submillis: 0,
    };

    /// Number of bytes in the T-field.
    #[must_use]
    pub fn num_bytes(&self) -> usize {
        self.num_day + NUM_CDS_MILLIS_OF_DAY_BYTES + self.num_submillis
    }

    /// Decode a CDS T-field (no P-field) from the start of `buf`.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if `buf` is shorter than [Self::num_bytes], or [Error::Timecode] for an
    /// unsupported layout.
    pub fn decode(&self, buf: &[u8]) -> Result<Epoch> {
        if !(2..=3).contains(&self.num_day) {
            return Err(Error::Timecode(format!(
                "Number of CDS day bytes must be 2 or 3; got {}",
                self.num_day
            )));
        }
        let want = self.num_bytes();
        if buf.len() < want {
            return Err(Error::NotEnoughData {
                actual: buf.len(),
                minimum: want,
            });
        }

        let (x, rest) = buf.split_at(self.num_day);
        let mut day_bytes = [0u8; 4];
        day_bytes[4 - self.num_day..].copy_from_slice(x);
        let days = u32::from_be_bytes(day_bytes);

        let millis = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let micros = match self.num_submillis {
            0 => 0,
            2 => u32::from_be_bytes([0, 0, rest[4], rest[5]]),
            _ => {
                return Err(Error::Timecode(format!(
                    "Number of CDS sub-millisecond bytes must be 0 or 2; got {}",
                    self.num_submillis
                )))
            }
        };

        let dur = Duration::compose(
            0,
            u64::from(days),
            0,
            0,
            // Add in delta to get to hifi epoch
            CCSDS_HIFIEPOCH_DELTA_SECS,
            u64::from(millis),
            u64::from(micros),
            0,
        );
        Ok(Epoch::from_utc_duration(dur))
    }
}
