//! A library for reading, editing, and writing ICO image files.
//!
//! An ICO file is a small directory of images, each stored either as a
//! complete PNG file or as a headerless Windows bitmap (a DIB).  This crate
//! parses both kinds of entry, decodes them to RGBA pixels, and writes icon
//! files back out with every entry stored as a PNG.
//!
//! Malformed input is never fatal to parsing: a file that isn't an ICO file
//! at all yields an empty [`IconDir`] with [`IconDir::error`] set, and a bad
//! entry keeps its directory fields and raw bytes with the problem recorded
//! in [`Entry::error`].  Entries with errors are left out when the file is
//! saved.
//!
//! # Example
//!
//! ```no_run
//! use icoedit::{Entry, IconDir, PngCodec};
//!
//! let file = std::fs::File::open("favicon.ico").unwrap();
//! let icon_dir = IconDir::read(file).unwrap();
//! let codec = PngCodec::new();
//! for entry in icon_dir.entries() {
//!     match entry.pixel_buffer(&codec) {
//!         Ok(image) => println!("{}x{}", image.width(), image.height()),
//!         Err(error) => println!("unreadable: {}", error),
//!     }
//! }
//! let out = std::fs::File::create("favicon-png.ico").unwrap();
//! icon_dir.write(out, &codec).unwrap();
//! ```

#![warn(missing_docs)]

#[macro_use]
mod macros;

mod bmpdepth;
mod bmpentry;
mod bmpheader;
mod compression;
mod cursor;
mod entry;
mod error;
mod icondir;
mod image;
mod pngentry;

pub use crate::bmpentry::BmpEntry;
pub use crate::bmpheader::{BitmapInfoHeader, Orientation, BMP_HEADER_LEN};
pub use crate::compression::Compression;
pub use crate::cursor::ByteCursor;
pub use crate::entry::{Entry, EntryHeader, IconDirEntry, ENTRY_HEADER_LEN};
pub use crate::error::{IcoError, Result};
pub use crate::icondir::{IconDir, ICONDIR_HEADER_LEN};
pub use crate::image::{composite, IconImage, ImageCodec, PngCodec};
pub use crate::pngentry::{PngEntry, PNG_MEDIA_TYPE};
