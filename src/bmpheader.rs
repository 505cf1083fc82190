use crate::compression::Compression;
use crate::cursor::ByteCursor;
use crate::error::Result;
use byteorder::LittleEndian;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

//===========================================================================//

/// The size of a BITMAPINFOHEADER struct, in bytes.
pub const BMP_HEADER_LEN: u32 = 40;

// Byte offset of the height field within a BITMAPINFOHEADER.
pub(crate) const HEIGHT_FIELD_OFFSET: usize = 8;

//===========================================================================//

/// The order in which the rows of a bitmap are stored.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Orientation {
    /// The first stored row is the bottom row of the image (positive height).
    BottomUp,
    /// The first stored row is the top row of the image (negative height).
    TopDown,
}

//===========================================================================//

/// A parsed BITMAPINFOHEADER, as found at the start of a non-PNG ICO entry.
///
/// In ICO files the stored height counts the rows of both the color data and
/// the AND mask, so it is twice the real height; `height` here is always the
/// real height, with the stored sign moved into `orientation`.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct BitmapInfoHeader {
    /// Size of the header struct itself, in bytes.
    pub size: u32,
    /// Width of the bitmap, in pixels.
    pub width: i32,
    /// Real height of the bitmap, in pixels.
    pub height: u32,
    /// Row order, taken from the sign of the stored height.
    pub orientation: Orientation,
    /// Number of color planes.
    pub planes: u16,
    /// Bits per pixel.
    pub bits_per_pixel: u16,
    /// Compression method.
    pub compression: Compression,
    /// Size of the color data, in bytes.
    pub image_length: u32,
    /// Horizontal resolution, in pixels per meter.
    pub ppm_x: i32,
    /// Vertical resolution, in pixels per meter.
    pub ppm_y: i32,
    /// Number of colors used by the bitmap, defaulted from the bit depth
    /// when stored as zero.
    pub colors_used: u32,
    /// The colors-used field exactly as stored.
    pub stored_colors_used: u32,
    /// Number of colors considered important; zero means all of them.
    pub colors_important: u32,
}

impl BitmapInfoHeader {
    /// Parses a header at the cursor, applying the ICO height convention and
    /// filling in defaulted fields.
    pub fn read<B: AsRef<[u8]>>(
        cursor: &mut ByteCursor<B>,
    ) -> Result<BitmapInfoHeader> {
        let size = cursor.get_u32::<LittleEndian>()?;
        if size < BMP_HEADER_LEN {
            format_error!(
                "Invalid BMP header size (was {}, but must be at least {})",
                size,
                BMP_HEADER_LEN
            );
        }
        let width = cursor.get_i32::<LittleEndian>()?;
        let stored_height = cursor.get_i32::<LittleEndian>()?;
        let planes = cursor.get_u16::<LittleEndian>()?;
        let bits_per_pixel = cursor.get_u16::<LittleEndian>()?;
        let compression =
            Compression::from_number(cursor.get_u32::<LittleEndian>()?);
        let mut image_length = cursor.get_u32::<LittleEndian>()?;
        let ppm_x = cursor.get_i32::<LittleEndian>()?;
        let ppm_y = cursor.get_i32::<LittleEndian>()?;
        let stored_colors_used = cursor.get_u32::<LittleEndian>()?;
        let colors_important = cursor.get_u32::<LittleEndian>()?;

        if stored_height % 2 != 0 {
            // The height is stored doubled, counting the rows of both the
            // color data and the AND mask, so it should be divisible by 2.
            format_error!(
                "Invalid height field in BMP header \
                 (was {}, but must be divisible by 2)",
                stored_height
            );
        }
        let height = stored_height.unsigned_abs() / 2;
        let orientation = if stored_height < 0 {
            Orientation::TopDown
        } else {
            Orientation::BottomUp
        };

        let mut colors_used = stored_colors_used;
        if colors_used == 0 && bits_per_pixel < 32 {
            let exponent =
                (bits_per_pixel as u32).saturating_mul(planes as u32);
            colors_used = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        }
        if compression == Compression::Rgb && image_length == 0 {
            let bits = (width.max(0) as u64)
                * (height as u64)
                * (bits_per_pixel as u64);
            image_length = u32::try_from(bits / 8).unwrap_or(u32::MAX);
        }

        Ok(BitmapInfoHeader {
            size,
            width,
            height,
            orientation,
            planes,
            bits_per_pixel,
            compression,
            image_length,
            ppm_x,
            ppm_y,
            colors_used,
            stored_colors_used,
            colors_important,
        })
    }

    /// Returns the height field as stored in an ICO entry: twice the real
    /// height, negated for top-down bitmaps.
    pub fn stored_height(&self) -> i32 {
        self.signed_height((self.height as i32).saturating_mul(2))
    }

    /// Returns the height field of a standalone BMP file: the real height,
    /// always positive, since exported rows are stored bottom-up.
    pub fn standalone_height(&self) -> i32 {
        self.height.min(i32::MAX as u32) as i32
    }

    fn signed_height(&self, magnitude: i32) -> i32 {
        match self.orientation {
            Orientation::BottomUp => magnitude,
            Orientation::TopDown => -magnitude,
        }
    }

    /// Returns the number of entries in the color table that follows the
    /// header.  Indexed (1, 4, or 8 bpp) bitmaps have at most one entry per
    /// possible index; deeper bitmaps only have a table (which their pixels
    /// don't use) when the stored colors-used field is nonzero.
    pub fn color_table_len(&self) -> usize {
        match self.bits_per_pixel {
            0 => 0,
            1..=8 => {
                let max_colors = 1usize << self.bits_per_pixel;
                (self.colors_used as usize).min(max_colors)
            }
            _ => self.stored_colors_used as usize,
        }
    }

    /// Encodes this header in the ICO convention (doubled height).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor =
            ByteCursor::new(vec![0u8; BMP_HEADER_LEN as usize]);
        cursor.set_u32::<LittleEndian>(BMP_HEADER_LEN, None)?;
        cursor.set_i32::<LittleEndian>(self.width, None)?;
        cursor.set_i32::<LittleEndian>(self.stored_height(), None)?;
        cursor.set_u16::<LittleEndian>(self.planes, None)?;
        cursor.set_u16::<LittleEndian>(self.bits_per_pixel, None)?;
        cursor.set_u32::<LittleEndian>(self.compression.number(), None)?;
        cursor.set_u32::<LittleEndian>(self.image_length, None)?;
        cursor.set_i32::<LittleEndian>(self.ppm_x, None)?;
        cursor.set_i32::<LittleEndian>(self.ppm_y, None)?;
        cursor.set_u32::<LittleEndian>(self.stored_colors_used, None)?;
        cursor.set_u32::<LittleEndian>(self.colors_important, None)?;
        debug_assert_eq!(cursor.position(), BMP_HEADER_LEN as usize);
        Ok(cursor.into_inner())
    }
}

//===========================================================================//


//===========================================================================//
