#![doc = include_str!("../README.md")]

mod error;

pub mod collector;
pub mod file;
pub mod image;
pub mod product;
pub mod timecode;

pub use error::{Error, Result};

pub(crate) mod prelude {
    pub use crate::error::{Error, Result};
}
