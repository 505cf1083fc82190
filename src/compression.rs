#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

//===========================================================================//

/// The compression method recorded in a BMP header.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Compression {
    /// Uncompressed RGB (or palette-indexed) data
    Rgb,
    /// Run-length encoded, 8 bits per pixel
    Rle8,
    /// Run-length encoded, 4 bits per pixel
    Rle4,
    /// Uncompressed, with explicit channel bit masks
    Bitfields,
    /// An embedded JPEG image
    Jpeg,
    /// An embedded PNG image
    Png,
    /// Uncompressed CMYK
    Cmyk,
    /// Run-length encoded CMYK, 8 bits per pixel
    CmykRle8,
    /// Run-length encoded CMYK, 4 bits per pixel
    CmykRle4,
    /// A compression number not defined by the BMP format
    Unknown(u32),
}

impl Compression {
    pub(crate) fn from_number(number: u32) -> Compression {
        match number {
            0 => Compression::Rgb,
            1 => Compression::Rle8,
            2 => Compression::Rle4,
            3 => Compression::Bitfields,
            4 => Compression::Jpeg,
            5 => Compression::Png,
            11 => Compression::Cmyk,
            12 => Compression::CmykRle8,
            13 => Compression::CmykRle4,
            other => Compression::Unknown(other),
        }
    }

    pub(crate) fn number(&self) -> u32 {
        match *self {
            Compression::Rgb => 0,
            Compression::Rle8 => 1,
            Compression::Rle4 => 2,
            Compression::Bitfields => 3,
            Compression::Jpeg => 4,
            Compression::Png => 5,
            Compression::Cmyk => 11,
            Compression::CmykRle8 => 12,
            Compression::CmykRle4 => 13,
            Compression::Unknown(number) => number,
        }
    }

    /// Returns true if ICO bitmap entries may use this compression method.
    /// Note that only `Rgb` can actually be decoded.
    pub fn is_supported(&self) -> bool {
        matches!(
            *self,
            Compression::Rgb
                | Compression::Rle4
                | Compression::Rle8
                | Compression::Bitfields
        )
    }

    /// Returns a human-readable name for this compression method.
    pub fn name(&self) -> String {
        let name = match *self {
            Compression::Rgb => "Uncompressed RGB",
            Compression::Rle8 => "RLE-8 compressed RGB",
            Compression::Rle4 => "RLE-4 compressed RGB",
            Compression::Bitfields => "Uncompressed RGB bitfields",
            Compression::Jpeg => "JPEG compressed",
            Compression::Png => "PNG compressed",
            Compression::Cmyk => "Uncompressed CMYK",
            Compression::CmykRle8 => "RLE-8 compressed CMYK",
            Compression::CmykRle4 => "RLE-4 compressed CMYK",
            Compression::Unknown(number) => {
                return format!("Unknown compression ({})", number);
            }
        };
        name.to_string()
    }
}

//===========================================================================//


//===========================================================================//
