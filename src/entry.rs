use crate::bmpentry::BmpEntry;
use crate::cursor::ByteCursor;
use crate::error::{IcoError, Result};
use crate::image::{IconImage, ImageCodec};
use crate::pngentry::PngEntry;
use byteorder::LittleEndian;
use log::warn;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

//===========================================================================//

/// The size of an ICONDIRENTRY struct, in bytes.
pub const ENTRY_HEADER_LEN: u32 = 16;

// The signature that all PNG files start with.
pub(crate) const PNG_SIGNATURE: &[u8] = &[137, 80, 78, 71, 13, 10, 26, 10];

//===========================================================================//

/// The fields of an ICONDIRENTRY record that describe an image, minus the
/// data size (which is always the length of the entry's image data).
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct EntryHeader {
    /// Width of the image, in pixels.
    pub width: u32,
    /// Height of the image, in pixels.
    pub height: u32,
    /// Number of colors in the palette, or 0 if the image has no palette.
    pub num_colors: u8,
    /// Number of color planes.
    pub color_planes: u16,
    /// Bits per pixel.
    pub bits_per_pixel: u16,
    /// Absolute offset of the image data within the ICO file.
    pub data_offset: u32,
}

impl EntryHeader {
    /// Reads one directory record, returning the header and the data size.
    pub(crate) fn read<B: AsRef<[u8]>>(
        cursor: &mut ByteCursor<B>,
    ) -> Result<(EntryHeader, u32)> {
        let width_byte = cursor.get_u8()?;
        let height_byte = cursor.get_u8()?;
        let num_colors = cursor.get_u8()?;
        cursor.skip(1)?; // reserved
        let color_planes = cursor.get_u16::<LittleEndian>()?;
        let bits_per_pixel = cursor.get_u16::<LittleEndian>()?;
        let data_size = cursor.get_u32::<LittleEndian>()?;
        let data_offset = cursor.get_u32::<LittleEndian>()?;
        // The width and height each get only one byte; zero means 256.
        let width = if width_byte == 0 { 256 } else { width_byte as u32 };
        let height = if height_byte == 0 { 256 } else { height_byte as u32 };
        let header = EntryHeader {
            width,
            height,
            num_colors,
            color_planes,
            bits_per_pixel,
            data_offset,
        };
        Ok((header, data_size))
    }

    /// Writes this header as a directory record at the cursor.
    pub(crate) fn write<B: AsRef<[u8]> + AsMut<[u8]>>(
        &self,
        cursor: &mut ByteCursor<B>,
        data_size: u32,
    ) -> Result<usize> {
        // A width/height byte of zero indicates a size of 256 or more.
        let width = if self.width > 255 { 0 } else { self.width as u8 };
        let height = if self.height > 255 { 0 } else { self.height as u8 };
        cursor.set_u8(width, None)?;
        cursor.set_u8(height, None)?;
        cursor.set_u8(self.num_colors, None)?;
        cursor.set_u8(0, None)?; // reserved
        cursor.set_u16::<LittleEndian>(self.color_planes, None)?;
        cursor.set_u16::<LittleEndian>(self.bits_per_pixel, None)?;
        cursor.set_u32::<LittleEndian>(data_size, None)?;
        cursor.set_u32::<LittleEndian>(self.data_offset, None)
    }
}

//===========================================================================//

/// The operations shared by every kind of ICO entry.
pub trait Entry {
    /// Returns the directory fields for this entry.
    fn header(&self) -> &EntryHeader;

    /// Returns the raw image data, in the format it is embedded in the ICO
    /// file (a PNG file, or a headerless BMP).
    fn encoded_bytes(&self) -> &[u8];

    /// Returns the problem found when this entry was created, if any.
    /// Entries with an error stay in their icon file, but can't be decoded
    /// and are left out when the file is saved.
    fn error(&self) -> Option<&IcoError>;

    /// Decodes the entry into RGBA pixels.
    fn pixel_buffer(&self, codec: &dyn ImageCodec) -> Result<IconImage>;

    /// Returns the entry's image as a self-contained PNG or BMP file.
    fn standalone_file_bytes(&self) -> Result<Vec<u8>>;

    /// Returns the width of the image, in pixels.
    fn width(&self) -> u32 {
        self.header().width
    }

    /// Returns the height of the image, in pixels.
    fn height(&self) -> u32 {
        self.header().height
    }

    /// Returns the bits-per-pixel (color depth) of the image.
    fn bits_per_pixel(&self) -> u16 {
        self.header().bits_per_pixel
    }

    /// Returns the size of the image data, in bytes.
    fn data_size(&self) -> u32 {
        u32::try_from(self.encoded_bytes().len()).unwrap_or(u32::MAX)
    }

    /// Returns the number of bytes this entry occupies in an ICO file: its
    /// directory record plus its image data.
    fn serialized_length(&self) -> usize {
        ENTRY_HEADER_LEN as usize + self.encoded_bytes().len()
    }
}

//===========================================================================//

/// One entry in an ICO file; a single image, stored either as a PNG or as a
/// BMP.
///
/// The kind of entry is never taken from the directory record; it is
/// determined by checking whether the image data starts with the PNG
/// signature.
#[derive(Clone, Debug)]
pub enum IconDirEntry {
    /// A PNG-encoded image.
    Png(PngEntry),
    /// A BMP-encoded image.
    Bitmap(BmpEntry),
}

impl IconDirEntry {
    /// Builds the entry variant that matches `data`.
    pub(crate) fn parse(header: EntryHeader, data: Vec<u8>) -> IconDirEntry {
        if data.starts_with(PNG_SIGNATURE) {
            IconDirEntry::Png(PngEntry::parse(header, data))
        } else {
            IconDirEntry::Bitmap(BmpEntry::parse(header, data))
        }
    }

    /// Returns true if the image is encoded as a PNG, or false if it is
    /// encoded as a BMP.
    pub fn is_png(&self) -> bool {
        matches!(*self, IconDirEntry::Png(_))
    }

    /// Returns the PNG version of this entry without modifying it.
    pub(crate) fn to_png(&self, codec: &dyn ImageCodec) -> Result<PngEntry> {
        match *self {
            IconDirEntry::Png(ref entry) => match entry.error() {
                Some(error) => Err(error.clone()),
                None => Ok(entry.clone()),
            },
            IconDirEntry::Bitmap(ref entry) => entry.to_png(codec),
        }
    }

    /// Re-encodes a BMP entry as a PNG entry.  Returns true if the entry is
    /// now a PNG (including if it already was), or false if it couldn't be
    /// converted, in which case it is left unchanged.
    pub fn convert_to_png_if_needed(
        &mut self,
        codec: &dyn ImageCodec,
    ) -> bool {
        let converted = match *self {
            IconDirEntry::Png(ref entry) => return entry.error().is_none(),
            IconDirEntry::Bitmap(ref entry) => entry.to_png(codec),
        };
        match converted {
            Ok(png) => {
                *self = IconDirEntry::Png(png);
                true
            }
            Err(error) => {
                warn!("Could not convert bitmap entry to PNG: {}", error);
                false
            }
        }
    }
}

impl Entry for IconDirEntry {
    fn header(&self) -> &EntryHeader {
        match *self {
            IconDirEntry::Png(ref entry) => entry.header(),
            IconDirEntry::Bitmap(ref entry) => entry.header(),
        }
    }

    fn encoded_bytes(&self) -> &[u8] {
        match *self {
            IconDirEntry::Png(ref entry) => entry.encoded_bytes(),
            IconDirEntry::Bitmap(ref entry) => entry.encoded_bytes(),
        }
    }

    fn error(&self) -> Option<&IcoError> {
        match *self {
            IconDirEntry::Png(ref entry) => entry.error(),
            IconDirEntry::Bitmap(ref entry) => entry.error(),
        }
    }

    fn pixel_buffer(&self, codec: &dyn ImageCodec) -> Result<IconImage> {
        match *self {
            IconDirEntry::Png(ref entry) => entry.pixel_buffer(codec),
            IconDirEntry::Bitmap(ref entry) => entry.pixel_buffer(codec),
        }
    }

    fn standalone_file_bytes(&self) -> Result<Vec<u8>> {
        match *self {
            IconDirEntry::Png(ref entry) => entry.standalone_file_bytes(),
            IconDirEntry::Bitmap(ref entry) => entry.standalone_file_bytes(),
        }
    }
}

impl From<PngEntry> for IconDirEntry {
    fn from(entry: PngEntry) -> IconDirEntry {
        IconDirEntry::Png(entry)
    }
}

impl From<BmpEntry> for IconDirEntry {
    fn from(entry: BmpEntry) -> IconDirEntry {
        IconDirEntry::Bitmap(entry)
    }
}

//===========================================================================//


//===========================================================================//
