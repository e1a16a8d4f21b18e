//! Reassembly of images delivered as fixed-height horizontal segments.
use std::sync::{Mutex, MutexGuard, PoisonError};

use ndarray::{s, Array2, ArrayView2};
use tracing::trace;

use crate::prelude::*;
use crate::product::ProductMeta;

/// Accumulates fixed-height horizontal segments into a single raster.
///
/// Segments may be pushed in any order. Pushing the same segment more than once
/// overwrites its pixels but counts it only once towards completion.
///
/// # Example
/// ```
/// use lrit::image::SegmentedImageDecoder;
///
/// let mut decoder = SegmentedImageDecoder::<u8>::new(3, 2, 1, "example").unwrap();
/// decoder.push_segment(&[9, 9], 1).unwrap();
/// decoder.push_segment(&[1, 1], 0).unwrap();
/// assert!(!decoder.is_complete());
/// decoder.push_segment(&[5, 5], 2).unwrap();
/// assert!(decoder.is_complete());
///
/// let image = decoder.into_image();
/// assert_eq!(image.as_slice().unwrap(), &[1, 1, 9, 9, 5, 5]);
/// ```
#[derive(Debug)]
pub struct SegmentedImageDecoder<T = u8> {
    id: String,
    segment_width: usize,
    segment_height: usize,
    segments_done: Vec<bool>,
    num_done: usize,
    image: Array2<T>,
    /// Metadata for the product being assembled. Carried along, never interpreted.
    pub meta: ProductMeta,
}

impl<T> Default for SegmentedImageDecoder<T>
where
    T: Copy + Default,
{
    /// A decoder with no image in progress.
    fn default() -> Self {
        Self {
            id: String::new(),
            segment_width: 0,
            segment_height: 0,
            segments_done: Vec::new(),
            num_done: 0,
            image: Array2::from_elem((0, 0), T::default()),
            meta: ProductMeta::default(),
        }
    }
}

impl<T> SegmentedImageDecoder<T>
where
    T: Copy + Default,
{
    /// Create a decoder for an image of `max_segments` segments, each
    /// `segment_width` columns by `segment_height` rows. The raster is filled with
    /// `T::default()`.
    ///
    /// `id` identifies the image for the caller and is not interpreted.
    ///
    /// # Errors
    /// [Error::InvalidGeometry] if any dimension is zero or the raster size overflows.
    pub fn new(
        max_segments: usize,
        segment_width: usize,
        segment_height: usize,
        id: impl Into<String>,
    ) -> Result<Self> {
        if max_segments == 0 || segment_width == 0 || segment_height == 0 {
            return Err(Error::InvalidGeometry(format!(
                "segments={max_segments} width={segment_width} height={segment_height}; all must be > 0"
            )));
        }
        let rows = segment_height
            .checked_mul(max_segments)
            .filter(|rows| rows.checked_mul(segment_width).is_some())
            .ok_or_else(|| {
                Error::InvalidGeometry(format!(
                    "{max_segments} segments of {segment_width}x{segment_height} overflows"
                ))
            })?;

        Ok(Self {
            id: id.into(),
            segment_width,
            segment_height,
            segments_done: vec![false; max_segments],
            num_done: 0,
            image: Array2::from_elem((rows, segment_width), T::default()),
            meta: ProductMeta::default(),
        })
    }

    /// Write `data` into the row band of segment `index` and mark it received.
    ///
    /// `data` is row-major and must hold exactly `segment_width * segment_height`
    /// samples.
    ///
    /// # Errors
    /// [Error::IndexOutOfRange] if `index` is not less than [Self::num_segments], or
    /// [Error::SegmentSize] for the wrong number of samples. Neither modifies the decoder.
    pub fn push_segment(&mut self, data: &[T], index: usize) -> Result<()> {
        let max = self.segments_done.len();
        if index >= max {
            return Err(Error::IndexOutOfRange { index, max });
        }
        let expected = self.segment_width * self.segment_height;
        if data.len() != expected {
            return Err(Error::SegmentSize {
                actual: data.len(),
                expected,
            });
        }

        let segment = ArrayView2::from_shape((self.segment_height, self.segment_width), data)
            .map_err(|err| Error::InvalidGeometry(err.to_string()))?;
        let start = index * self.segment_height;
        self.image
            .slice_mut(s![start..start + self.segment_height, ..])
            .assign(&segment);

        if !self.segments_done[index] {
            self.num_done += 1;
        }
        self.segments_done[index] = true;

        trace!(
            id = %self.id,
            index,
            received = self.num_done,
            total = max,
            "pushed segment"
        );
        Ok(())
    }

    /// True once every segment has been pushed at least once.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_active() && self.num_done == self.segments_done.len()
    }

    /// False for the default decoder, i.e., no image in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.segments_done.is_empty()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.segments_done.len()
    }

    /// Number of distinct segments received so far.
    #[must_use]
    pub fn segments_received(&self) -> usize {
        self.num_done
    }

    #[must_use]
    pub fn segment_width(&self) -> usize {
        self.segment_width
    }

    #[must_use]
    pub fn segment_height(&self) -> usize {
        self.segment_height
    }

    #[must_use]
    pub fn is_segment_done(&self, index: usize) -> bool {
        self.segments_done.get(index).copied().unwrap_or(false)
    }

    /// Indices of segments not yet received, in ascending order.
    pub fn missing_segments(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments_done
            .iter()
            .enumerate()
            .filter_map(|(idx, done)| (!done).then_some(idx))
    }

    /// The row band for segment `index`, or `None` if out of range.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<ArrayView2<'_, T>> {
        if index >= self.segments_done.len() {
            return None;
        }
        let start = index * self.segment_height;
        Some(self.image.slice(s![start..start + self.segment_height, ..]))
    }

    /// The full raster, `(rows, columns)`.
    #[must_use]
    pub fn image(&self) -> ArrayView2<'_, T> {
        self.image.view()
    }

    #[must_use]
    pub fn into_image(self) -> Array2<T> {
        self.image
    }
}

/// A [SegmentedImageDecoder] that can be shared between ingestion threads.
///
/// Each call holds the lock for exactly one push or query, so a completion check
/// never observes a partially written segment.
#[derive(Debug)]
pub struct SyncSegmentedImageDecoder<T = u8> {
    inner: Mutex<SegmentedImageDecoder<T>>,
}

impl<T> From<SegmentedImageDecoder<T>> for SyncSegmentedImageDecoder<T> {
    fn from(decoder: SegmentedImageDecoder<T>) -> Self {
        Self {
            inner: Mutex::new(decoder),
        }
    }
}

impl<T> SyncSegmentedImageDecoder<T>
where
    T: Copy + Default,
{
    #[must_use]
    pub fn new(decoder: SegmentedImageDecoder<T>) -> Self {
        Self::from(decoder)
    }

    /// See [SegmentedImageDecoder::push_segment].
    ///
    /// # Errors
    /// Same as [SegmentedImageDecoder::push_segment].
    pub fn push_segment(&self, data: &[T], index: usize) -> Result<()> {
        self.lock().push_segment(data, index)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.lock().is_complete()
    }

    #[must_use]
    pub fn segments_received(&self) -> usize {
        self.lock().segments_received()
    }

    #[must_use]
    pub fn into_inner(self) -> SegmentedImageDecoder<T> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    // A push either writes a whole segment or fails before writing, so the
    // decoder is consistent even if another holder panicked.
    fn lock(&self) -> MutexGuard<'_, SegmentedImageDecoder<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
