//===========================================================================//

/// The color depths that uncompressed ICO bitmaps can use.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BmpDepth {
    One,
    Four,
    Eight,
    Sixteen,
    TwentyFour,
    ThirtyTwo,
}

impl BmpDepth {
    pub(crate) fn from_bits_per_pixel(
        bits_per_pixel: u16,
    ) -> Option<BmpDepth> {
        match bits_per_pixel {
            1 => Some(BmpDepth::One),
            4 => Some(BmpDepth::Four),
            8 => Some(BmpDepth::Eight),
            16 => Some(BmpDepth::Sixteen),
            24 => Some(BmpDepth::TwentyFour),
            32 => Some(BmpDepth::ThirtyTwo),
            _ => None,
        }
    }

    pub(crate) fn bits_per_pixel(&self) -> u16 {
        match *self {
            BmpDepth::One => 1,
            BmpDepth::Four => 4,
            BmpDepth::Eight => 8,
            BmpDepth::Sixteen => 16,
            BmpDepth::TwentyFour => 24,
            BmpDepth::ThirtyTwo => 32,
        }
    }

    /// Returns true if pixels are indices into a color table.
    pub(crate) fn is_indexed(&self) -> bool {
        matches!(*self, BmpDepth::One | BmpDepth::Four | BmpDepth::Eight)
    }

    /// Returns the number of bytes of pixel data in one row, not counting
    /// padding.
    pub(crate) fn row_data_size(&self, width: usize) -> usize {
        (width * (self.bits_per_pixel() as usize) + 7) / 8
    }

    /// Returns the number of bytes in one stored row; rows of color data are
    /// padded to a multiple of four bytes.
    pub(crate) fn row_size(&self, width: usize) -> usize {
        ((self.row_data_size(width) + 3) / 4) * 4
    }
}

/// Returns the number of bits in one row of an AND mask, which is padded to
/// a multiple of 32 bits.
pub(crate) fn mask_row_bits(width: usize) -> usize {
    ((width + 31) / 32) * 32
}

//===========================================================================//


//===========================================================================//
