use hifitime::Epoch;
#[cfg(feature = "serde")]
use serde::Serialize;
use typed_builder::TypedBuilder;

use crate::file::ImageNavigation;

/// Descriptive metadata for an image product.
///
/// # Example
/// ```
/// use lrit::product::ProductMeta;
///
/// let meta = ProductMeta::builder()
///     .filename("L_1_20240101_0000_1.lrit")
///     .channel(1)
///     .satellite_name("Elektro-L 3")
///     .build();
/// assert_eq!(meta.channel, Some(1));
/// assert!(meta.navigation.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ProductMeta {
    /// Name of the file the product was first seen in.
    #[builder(default, setter(into))]
    pub filename: String,
    /// Spectral channel.
    #[builder(default, setter(strip_option))]
    pub channel: Option<u8>,
    #[builder(default, setter(into))]
    pub satellite_name: String,
    #[builder(default, setter(into))]
    pub satellite_short_name: String,
    #[builder(default, setter(strip_option))]
    pub scan_time: Option<Epoch>,
    #[builder(default, setter(strip_option))]
    pub navigation: Option<ImageNavigation>,
}

/// Where a channel's image is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum ImageStatus {
    /// Segments are being accumulated.
    Receiving,
    /// A finished image is being handed off.
    Saving,
    #[default]
    Idle,
}
