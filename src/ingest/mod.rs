//! Image sources and sinks.
//!
//! Images enter as encoded files (JPEG, PNG, BMP, TIFF) or in-memory
//! encoded bytes and leave as files under the configured output directory.
//! The ingestion layer is responsible for:
//! - Rejecting remote URLs and unsupported formats
//! - Decoding to 8-bit RGB and rejecting zero-size images
//! - Naming outputs uniquely so concurrent writers never collide
//!
//! Decoding failures are reported as `ImageLoad` errors for that input only.

pub mod file;

pub use file::{
    decode_image, is_supported_format, load_image, save_image, unique_output_path,
    SUPPORTED_EXTENSIONS,
};
