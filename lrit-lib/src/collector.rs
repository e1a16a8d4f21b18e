//! Per-channel assembly of segmented LRIT image files.
use std::{
    collections::HashMap,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{bounded, Receiver};
use ndarray::Array2;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

use crate::file::LritFile;
use crate::image::SegmentedImageDecoder;
use crate::prelude::*;
use crate::product::{ImageStatus, ProductMeta};

/// An image handed off by the [ImageCollector].
#[derive(Debug, Clone)]
pub struct FinishedImage {
    pub id: String,
    pub meta: ProductMeta,
    /// Raster of `(lines, columns)`.
    pub image: Array2<u8>,
    /// True when every segment was received.
    pub complete: bool,
    /// Indices of segments never received.
    pub missing: Vec<usize>,
}

impl FinishedImage {
    fn from_decoder(decoder: SegmentedImageDecoder<u8>) -> Self {
        let complete = decoder.is_complete();
        let missing = decoder.missing_segments().collect();
        let id = decoder.id().to_string();
        let meta = decoder.meta.clone();
        FinishedImage {
            id,
            meta,
            image: decoder.into_image(),
            complete,
            missing,
        }
    }
}

/// Routes image segment files to one [SegmentedImageDecoder] per spectral channel.
///
/// A channel's image is finished when all its segments arrive, or when a segment of a
/// different image arrives on the same channel, in which case the image in progress is
/// handed off incomplete if `emit_partial` is set.
///
/// # Example
/// ```
/// use lrit::collector::ImageCollector;
///
/// let mut collector = ImageCollector::builder()
///     .satellite_name("Elektro-L 3")
///     .satellite_short_name("L3")
///     .build();
/// // for file in files { for image in collector.push(file)? { ... } }
/// let leftovers = collector.flush();
/// assert!(leftovers.is_empty());
/// ```
#[derive(TypedBuilder)]
pub struct ImageCollector {
    #[builder(default, setter(into))]
    satellite_name: String,
    #[builder(default, setter(into))]
    satellite_short_name: String,
    /// Hand off images that were superseded or flushed before completion.
    #[builder(default = true)]
    emit_partial: bool,
    #[builder(default, setter(skip))]
    decoders: HashMap<u8, SegmentedImageDecoder<u8>>,
    #[builder(default, setter(skip))]
    status: HashMap<u8, ImageStatus>,
}

impl Default for ImageCollector {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ImageCollector {
    /// Current status of `channel`.
    #[must_use]
    pub fn status(&self, channel: u8) -> ImageStatus {
        self.status.get(&channel).copied().unwrap_or_default()
    }

    /// Add a file, returning any images it finished.
    ///
    /// Non-image files are ignored.
    ///
    /// # Errors
    /// [Error::InvalidHeader] if an image file is missing its image structure or segment
    /// identification records, [Error::Unsupported] for compressed or non 8-bit data,
    /// [Error::SegmentSequence] if the segment is outside of its planned range, or
    /// [Error::SegmentSize] if the data field does not match the image structure. The
    /// collector state is unchanged on error.
    pub fn push(&mut self, file: LritFile) -> Result<Vec<FinishedImage>> {
        if !file.is_image() {
            trace!(
                file_type = file.primary.file_type_code,
                "ignoring non-image file"
            );
            return Ok(Vec::default());
        }
        let Some(structure) = file.image_structure else {
            return Err(Error::InvalidHeader(
                "image file without image structure".to_string(),
            ));
        };
        let Some(segment) = file.segment else {
            return Err(Error::InvalidHeader(
                "image file without segment identification".to_string(),
            ));
        };
        if structure.compression != 0 || segment.compression != 0 {
            return Err(Error::Unsupported(format!(
                "compressed image data (structure={}, segment={})",
                structure.compression, segment.compression
            )));
        }
        if structure.bits_per_pixel != 8 {
            return Err(Error::Unsupported(format!(
                "{} bits per pixel",
                structure.bits_per_pixel
            )));
        }
        let (index, num_segments) = segment.index()?;
        let width = usize::from(structure.columns);
        let height = usize::from(structure.lines);
        let expected = width * height;
        if file.data.len() != expected {
            return Err(Error::SegmentSize {
                actual: file.data.len(),
                expected,
            });
        }

        let channel = segment.channel;
        let id = image_id(&file);
        let mut finished = Vec::default();

        let start_new = match self.decoders.get(&channel) {
            Some(decoder) if decoder.is_active() => {
                decoder.id() != id
                    || decoder.num_segments() != num_segments
                    || decoder.segment_width() != width
                    || decoder.segment_height() != height
            }
            _ => true,
        };
        let fresh = if start_new {
            let mut decoder = SegmentedImageDecoder::new(num_segments, width, height, id)?;
            decoder.meta = ProductMeta {
                filename: file.annotation.clone().unwrap_or_default(),
                channel: Some(channel),
                satellite_name: self.satellite_name.clone(),
                satellite_short_name: self.satellite_short_name.clone(),
                scan_time: file.timestamp,
                navigation: file.navigation.clone(),
            };
            Some(decoder)
        } else {
            None
        };

        let decoder = self.decoders.entry(channel).or_default();
        if let Some(fresh) = fresh {
            debug!(
                channel,
                id = fresh.id(),
                num_segments,
                width,
                height,
                "starting image"
            );
            let old = std::mem::replace(decoder, fresh);
            if let Some(image) = hand_off_partial(old, self.emit_partial) {
                finished.push(image);
            }
            set_status(&mut self.status, channel, ImageStatus::Receiving);
        }

        decoder.push_segment(&file.data, index)?;

        if decoder.is_complete() {
            set_status(&mut self.status, channel, ImageStatus::Saving);
            let decoder = std::mem::take(decoder);
            debug!(channel, id = decoder.id(), "image complete");
            finished.push(FinishedImage::from_decoder(decoder));
            set_status(&mut self.status, channel, ImageStatus::Idle);
        }

        Ok(finished)
    }

    /// Hand off every image in progress that has received at least one segment.
    ///
    /// Images still in progress are incomplete, so, as when superseded, they are only
    /// returned if `emit_partial` is set and are dropped otherwise.
    pub fn flush(&mut self) -> Vec<FinishedImage> {
        let mut channels: Vec<u8> = self.decoders.keys().copied().collect();
        channels.sort_unstable();

        let mut finished = Vec::default();
        for channel in channels {
            if let Some(decoder) = self.decoders.remove(&channel) {
                if let Some(image) = hand_off_partial(decoder, self.emit_partial) {
                    finished.push(image);
                }
            }
            set_status(&mut self.status, channel, ImageStatus::Idle);
        }
        finished
    }
}

fn set_status(status: &mut HashMap<u8, ImageStatus>, channel: u8, new: ImageStatus) {
    let old = status.insert(channel, new).unwrap_or_default();
    if old != new {
        trace!(channel, ?old, ?new, "image status");
    }
}

fn hand_off_partial(
    decoder: SegmentedImageDecoder<u8>,
    emit_partial: bool,
) -> Option<FinishedImage> {
    if decoder.segments_received() == 0 {
        return None;
    }
    let missing = decoder.num_segments() - decoder.segments_received();
    if emit_partial {
        warn!(id = decoder.id(), missing, "handing off incomplete image");
        Some(FinishedImage::from_decoder(decoder))
    } else {
        warn!(id = decoder.id(), missing, "dropping incomplete image");
        None
    }
}

/// Label shared by all segments of one image.
fn image_id(file: &LritFile) -> String {
    let (spacecraft, channel) = file
        .segment
        .map_or((0, 0), |s| (s.spacecraft_id, s.channel));
    match file.timestamp {
        Some(epoch) => {
            let (y, m, d, hh, mm, ss, _) = epoch.to_gregorian_utc();
            format!("{spacecraft}_{channel}_{y:04}{m:02}{d:02}T{hh:02}{mm:02}{ss:02}")
        }
        None => format!("{spacecraft}_{channel}_unknown"),
    }
}

/// Iterator over the images finished by [collect_images].
pub struct FinishedImageIter {
    images: Receiver<Result<FinishedImage>>,
    handle: Option<JoinHandle<()>>,
}

impl Iterator for FinishedImageIter {
    type Item = Result<FinishedImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Ok(zult) = self.images.recv() {
            return Some(zult);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("image collector thread panicked");
            }
        }
        None
    }
}

/// Feed `files` through `collector` on a background thread.
///
/// Errors from individual files are yielded and collection continues. Once `files`
/// is exhausted the collector is flushed.
///
/// # Panics
/// If the background thread could not be started.
pub fn collect_images<F>(mut collector: ImageCollector, files: F) -> FinishedImageIter
where
    F: Iterator<Item = LritFile> + Send + 'static,
{
    const DEFAULT_BUFFER_SIZE: usize = 16;
    let (tx, rx) = bounded(DEFAULT_BUFFER_SIZE);

    let handle = thread::Builder::new()
        .name("lrit_image_collector".into())
        .spawn(move || {
            for file in files {
                match collector.push(file) {
                    Ok(images) => {
                        for image in images {
                            if tx.send(Ok(image)).is_err() {
                                debug!("image receiver dropped");
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        if tx.send(Err(err)).is_err() {
                            debug!("image receiver dropped");
                            return;
                        }
                    }
                }
            }
            for image in collector.flush() {
                if tx.send(Ok(image)).is_err() {
                    debug!("image receiver dropped");
                    return;
                }
            }
        })
        .expect("failed to start image collector thread");

    FinishedImageIter {
        images: rx,
        handle: Some(handle),
    }
}
