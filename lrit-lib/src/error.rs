#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Segment index is not in `[0, max)`. Nothing was written.
    #[error("segment index {index} out of range; image has {max} segments")]
    IndexOutOfRange { index: usize, max: usize },

    /// Segment data does not contain exactly one segment worth of samples.
    #[error("segment has {actual} samples, expected {expected}")]
    SegmentSize { actual: usize, expected: usize },

    #[error("invalid image geometry: {0}")]
    InvalidGeometry(String),

    #[error("Not enough bytes")]
    NotEnoughData { actual: usize, minimum: usize },

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Segment sequence number outside of the planned segment range.
    #[error("segment sequence {sequence} not in planned range {start}..={end}")]
    SegmentSequence { sequence: u16, start: u16, end: u16 },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("Invalid timecode: {0}")]
    Timecode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
