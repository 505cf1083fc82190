use crate::bmpdepth::{mask_row_bits, BmpDepth};
use crate::bmpheader::{BitmapInfoHeader, Orientation, HEIGHT_FIELD_OFFSET};
use crate::compression::Compression;
use crate::cursor::ByteCursor;
use crate::entry::{Entry, EntryHeader};
use crate::error::{IcoError, Result};
use crate::image::{composite, IconImage, ImageCodec};
use crate::pngentry::PngEntry;
use byteorder::LittleEndian;

//===========================================================================//

// The size of a BITMAPFILEHEADER struct, in bytes.
const BMP_FILE_HEADER_LEN: usize = 14;

// Opacity values produced from the AND mask.
const TRANSPARENT: u8 = 0;
const OPAQUE: u8 = u8::MAX;

//===========================================================================//

/// An ICO entry whose image data is a legacy device-independent bitmap: a
/// BITMAPINFOHEADER, an optional color table, the color (XOR) plane, and a
/// 1-bit AND mask.
///
/// Problems found while parsing the bitmap header are recorded on the entry
/// (see [`Entry::error`]) instead of failing the parse of the whole icon
/// file; the pixel-producing methods then return that error.
#[derive(Clone, Debug)]
pub struct BmpEntry {
    header: EntryHeader,
    data: Vec<u8>,
    info: Option<BitmapInfoHeader>,
    error: Option<IcoError>,
}

impl BmpEntry {
    pub(crate) fn parse(header: EntryHeader, data: Vec<u8>) -> BmpEntry {
        let mut entry = BmpEntry { header, data, info: None, error: None };
        match BitmapInfoHeader::read(&mut ByteCursor::new(&entry.data)) {
            Ok(info) => {
                entry.error = validate_info(&info).err();
                entry.info = Some(info);
            }
            Err(error) => entry.error = Some(error),
        }
        entry
    }

    /// Creates an entry for image data that couldn't be read at all.
    pub(crate) fn unreadable(
        header: EntryHeader,
        error: IcoError,
    ) -> BmpEntry {
        BmpEntry { header, data: Vec::new(), info: None, error: Some(error) }
    }

    /// Returns the parsed bitmap header, if it could be parsed.
    pub fn info(&self) -> Option<&BitmapInfoHeader> {
        self.info.as_ref()
    }

    fn usable_info(&self) -> Result<&BitmapInfoHeader> {
        if let Some(ref error) = self.error {
            return Err(error.clone());
        }
        match self.info {
            Some(ref info) => Ok(info),
            None => format_error!("Missing bitmap header"),
        }
    }

    // Returns the header and depth of a bitmap whose pixels can be decoded.
    fn decodable_info(&self) -> Result<(&BitmapInfoHeader, BmpDepth)> {
        let info = self.usable_info()?;
        match info.compression {
            Compression::Rgb => {}
            Compression::Rle4 | Compression::Rle8 | Compression::Bitfields => {
                unsupported!(
                    "Decoding {} bitmaps is not supported",
                    info.compression.name()
                );
            }
            other => {
                unsupported!("Unsupported compression type: {}", other.name());
            }
        }
        match BmpDepth::from_bits_per_pixel(info.bits_per_pixel) {
            Some(depth) => Ok((info, depth)),
            None => unsupported!(
                "Unsupported bit depth ({})",
                info.bits_per_pixel
            ),
        }
    }

    fn color_table_offset(info: &BitmapInfoHeader) -> usize {
        info.size as usize
    }

    fn color_plane_offset(info: &BitmapInfoHeader) -> usize {
        let table_size = info.color_table_len().saturating_mul(4);
        BmpEntry::color_table_offset(info).saturating_add(table_size)
    }

    fn color_plane_size(info: &BitmapInfoHeader, depth: BmpDepth) -> usize {
        depth.row_size(info.width as usize) * info.height as usize
    }

    // Maps a stored row index to its index counting from the top.
    fn display_row(info: &BitmapInfoHeader, stored_row: usize) -> usize {
        match info.orientation {
            Orientation::BottomUp => info.height as usize - 1 - stored_row,
            Orientation::TopDown => stored_row,
        }
    }

    fn read_color_table(
        &self,
        info: &BitmapInfoHeader,
    ) -> Result<Vec<[u8; 3]>> {
        let cursor = ByteCursor::new(&self.data);
        let table = cursor.bytes_at(
            BmpEntry::color_table_offset(info),
            4 * info.color_table_len(),
        )?;
        Ok(table
            .chunks_exact(4)
            .map(|quad| [quad[2], quad[1], quad[0]])
            .collect())
    }

    /// Decodes the color (XOR) plane into top-down RGBA.  For 32 bpp bitmaps
    /// the fourth byte of each pixel is the stored alpha value; for all other
    /// depths it is 255.
    pub fn color_plane(&self) -> Result<Vec<u8>> {
        let (info, depth) = self.decodable_info()?;
        let width = info.width as usize;
        let height = info.height as usize;
        let palette = if depth.is_indexed() {
            self.read_color_table(info)?
        } else {
            Vec::new()
        };
        let row_size = depth.row_size(width);
        let cursor = ByteCursor::new(&self.data);
        let plane = cursor.bytes_at(
            BmpEntry::color_plane_offset(info),
            BmpEntry::color_plane_size(info, depth),
        )?;
        let lookup = |index: u8| -> Result<[u8; 3]> {
            match palette.get(index as usize) {
                Some(&color) => Ok(color),
                None => format_error!(
                    "Color index {} is outside the {}-entry color table",
                    index,
                    palette.len()
                ),
            }
        };

        let mut rgba = vec![u8::MAX; width * height * 4];
        for (stored_row, src) in plane.chunks_exact(row_size).enumerate() {
            let start = BmpEntry::display_row(info, stored_row) * width * 4;
            let dest = &mut rgba[start..(start + width * 4)];
            for (col, pixel) in dest.chunks_exact_mut(4).enumerate() {
                match depth {
                    BmpDepth::One => {
                        let index = (src[col / 8] >> (7 - col % 8)) & 0x1;
                        pixel[..3].copy_from_slice(&lookup(index)?);
                    }
                    BmpDepth::Four => {
                        let shift = 4 * (1 - col % 2);
                        let index = (src[col / 2] >> shift) & 0xf;
                        pixel[..3].copy_from_slice(&lookup(index)?);
                    }
                    BmpDepth::Eight => {
                        pixel[..3].copy_from_slice(&lookup(src[col])?);
                    }
                    BmpDepth::Sixteen => {
                        let bytes = [src[2 * col], src[2 * col + 1]];
                        let color = u16::from_le_bytes(bytes);
                        let red = (color >> 10) & 0x1f;
                        let green = (color >> 5) & 0x1f;
                        let blue = color & 0x1f;
                        pixel[0] = ((red * 255 + 15) / 31) as u8;
                        pixel[1] = ((green * 255 + 15) / 31) as u8;
                        pixel[2] = ((blue * 255 + 15) / 31) as u8;
                    }
                    BmpDepth::TwentyFour => {
                        let bgr = &src[(3 * col)..(3 * col + 3)];
                        pixel[..3].copy_from_slice(&[bgr[2], bgr[1], bgr[0]]);
                    }
                    BmpDepth::ThirtyTwo => {
                        let bgra = &src[(4 * col)..(4 * col + 4)];
                        pixel.copy_from_slice(&[
                            bgra[2], bgra[1], bgra[0], bgra[3],
                        ]);
                    }
                }
            }
        }
        Ok(rgba)
    }

    /// Returns the alpha plane (one byte per pixel, top-down) of a 32 bpp
    /// bitmap, or `None` if the bitmap has no alpha channel or its alpha
    /// channel is zero everywhere (which means it carries no alpha data).
    pub fn alpha_plane(&self) -> Result<Option<Vec<u8>>> {
        let (_, depth) = self.decodable_info()?;
        if depth != BmpDepth::ThirtyTwo {
            return Ok(None);
        }
        let alpha: Vec<u8> =
            self.color_plane()?.chunks_exact(4).map(|px| px[3]).collect();
        if alpha.iter().all(|&value| value == 0) {
            return Ok(None);
        }
        Ok(Some(alpha))
    }

    /// Unpacks the AND mask into one opacity byte per pixel, top-down: a set
    /// bit becomes 0 (transparent) and a clear bit 255 (opaque).  The padding
    /// bits at the end of each 32-bit-aligned mask row are skipped.
    pub fn mask_plane(&self) -> Result<Vec<u8>> {
        let (info, depth) = self.decodable_info()?;
        let width = info.width as usize;
        let height = info.height as usize;
        let row_size = mask_row_bits(width) / 8;
        let offset = BmpEntry::color_plane_offset(info)
            + BmpEntry::color_plane_size(info, depth);
        let cursor = ByteCursor::new(&self.data);
        let mask = cursor.bytes_at(offset, row_size * height)?;

        let mut opacity = vec![OPAQUE; width * height];
        for (stored_row, src) in mask.chunks_exact(row_size).enumerate() {
            let start = BmpEntry::display_row(info, stored_row) * width;
            let dest = &mut opacity[start..(start + width)];
            for (col, value) in dest.iter_mut().enumerate() {
                if (src[col / 8] >> (7 - col % 8)) & 0x1 == 1 {
                    *value = TRANSPARENT;
                }
            }
        }
        Ok(opacity)
    }

    /// Returns the final per-pixel opacity: the minimum of the alpha plane
    /// and the mask, or just the mask when there is no alpha data.
    pub fn opacity_plane(&self) -> Result<Vec<u8>> {
        let mask = self.mask_plane()?;
        match self.alpha_plane()? {
            Some(alpha) => Ok(alpha
                .iter()
                .zip(mask.iter())
                .map(|(&alpha, &mask)| alpha.min(mask))
                .collect()),
            None => Ok(mask),
        }
    }

    /// Converts this bitmap into a new, unplaced PNG entry.
    pub(crate) fn to_png(&self, codec: &dyn ImageCodec) -> Result<PngEntry> {
        let image = self.pixel_buffer(codec)?;
        PngEntry::from_image(&image, codec)
    }
}

fn validate_info(info: &BitmapInfoHeader) -> Result<()> {
    if !info.compression.is_supported() {
        unsupported!(
            "Unsupported compression type: {}",
            info.compression.name()
        );
    }
    if BmpDepth::from_bits_per_pixel(info.bits_per_pixel).is_none() {
        unsupported!("Unsupported bit depth ({})", info.bits_per_pixel);
    }
    if info.width < 1 {
        format_error!(
            "Invalid BMP width (was {}, but must be at least 1)",
            info.width
        );
    }
    if info.height < 1 {
        format_error!(
            "Invalid BMP height (was {}, but must be at least 1)",
            info.height
        );
    }
    Ok(())
}

impl Entry for BmpEntry {
    fn header(&self) -> &EntryHeader {
        &self.header
    }

    fn encoded_bytes(&self) -> &[u8] {
        &self.data
    }

    fn error(&self) -> Option<&IcoError> {
        self.error.as_ref()
    }

    fn pixel_buffer(&self, _codec: &dyn ImageCodec) -> Result<IconImage> {
        let color = self.color_plane()?;
        let opacity = self.opacity_plane()?;
        let info = self.usable_info()?;
        composite(info.width as u32, info.height, &color, &opacity)
    }

    /// Wraps the header, color table, and color plane in a BMP file header.
    /// The AND mask is left out, and the height field holds the real height
    /// rather than the doubled height used inside ICO files.  Exported rows
    /// are always bottom-up, so top-down color planes are flipped.
    fn standalone_file_bytes(&self) -> Result<Vec<u8>> {
        let info = self.usable_info()?;
        let rgb_depth = match info.compression {
            Compression::Rgb => {
                BmpDepth::from_bits_per_pixel(info.bits_per_pixel)
            }
            _ => None,
        };
        let color_plane_size = match rgb_depth {
            Some(depth) => BmpEntry::color_plane_size(info, depth),
            None => info.image_length as usize,
        };
        let pixel_offset = BmpEntry::color_plane_offset(info);
        let dib_len = pixel_offset.saturating_add(color_plane_size);
        let mut dib =
            ByteCursor::new(&self.data).bytes_at(0, dib_len)?.to_vec();
        if let (Orientation::TopDown, Some(depth)) =
            (info.orientation, rgb_depth)
        {
            let row_size = depth.row_size(info.width as usize);
            let flipped: Vec<u8> = dib[pixel_offset..]
                .chunks_exact(row_size)
                .rev()
                .flatten()
                .copied()
                .collect();
            dib.truncate(pixel_offset);
            dib.extend_from_slice(&flipped);
        }

        let file_len = BMP_FILE_HEADER_LEN + dib_len;
        if file_len > u32::MAX as usize {
            size_limit!("BMP is too large ({} bytes)", file_len);
        }
        let mut cursor = ByteCursor::new(vec![0u8; file_len]);
        cursor.set_bytes(b"BM", None)?;
        cursor.set_u32::<LittleEndian>(file_len as u32, None)?;
        cursor.set_u32::<LittleEndian>(0, None)?; // reserved
        cursor.set_u32::<LittleEndian>(
            (BMP_FILE_HEADER_LEN + pixel_offset) as u32,
            None,
        )?;
        cursor.set_bytes(&dib, None)?;
        cursor.set_i32::<LittleEndian>(
            info.standalone_height(),
            Some(BMP_FILE_HEADER_LEN + HEIGHT_FIELD_OFFSET),
        )?;
        Ok(cursor.into_inner())
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::BmpEntry;
    use crate::bmpheader::{BitmapInfoHeader, Orientation};
    use crate::compression::Compression;
    use crate::entry::{Entry, EntryHeader};
    use crate::error::IcoError;
    use crate::image::PngCodec;

    fn entry_header(width: u32, height: u32, bpp: u16) -> EntryHeader {
        EntryHeader {
            width,
            height,
            num_colors: 0,
            color_planes: 1,
            bits_per_pixel: bpp,
            data_offset: 0,
        }
    }

    fn info(
        width: i32,
        height: u32,
        orientation: Orientation,
    ) -> BitmapInfoHeader {
        BitmapInfoHeader {
            size: 40,
            width,
            height,
            orientation,
            planes: 1,
            bits_per_pixel: 32,
            compression: Compression::Rgb,
            image_length: 0,
            ppm_x: 0,
            ppm_y: 0,
            colors_used: 0,
            stored_colors_used: 0,
            colors_important: 0,
        }
    }

    // Builds a 32 bpp DIB from top-down RGBA pixels and top-down mask bits
    // (true = masked out), storing rows in the given orientation.
    fn dib_32bpp(
        width: usize,
        height: usize,
        orientation: Orientation,
        rgba: &[u8],
        mask: &[bool],
    ) -> Vec<u8> {
        let mut data =
            info(width as i32, height as u32, orientation).to_bytes().unwrap();
        let rows: Vec<usize> = match orientation {
            Orientation::BottomUp => (0..height).rev().collect(),
            Orientation::TopDown => (0..height).collect(),
        };
        for &row in rows.iter() {
            for col in 0..width {
                let px = &rgba[(4 * (row * width + col))..][..4];
                data.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
        let mask_row_bytes = ((width + 31) / 32) * 4;
        for &row in rows.iter() {
            let mut bytes = vec![0u8; mask_row_bytes];
            for col in 0..width {
                if mask[row * width + col] {
                    bytes[col / 8] |= 0x80 >> (col % 8);
                }
            }
            data.extend_from_slice(&bytes);
        }
        data
    }

    fn sample_pixels(width: usize, height: usize, alpha: u8) -> Vec<u8> {
        let mut rgba = Vec::new();
        for index in 0..(width * height) {
            let (red, green) = (index as u8, (index * 3) as u8);
            rgba.extend_from_slice(&[red, green, 7, alpha]);
        }
        rgba
    }

    #[test]
    fn orientation_does_not_change_pixels() {
        let (width, height) = (3, 20);
        let rgba = sample_pixels(width, height, 0xff);
        let mask: Vec<bool> =
            (0..(width * height)).map(|i| i % 5 == 0).collect();
        let bottom_up = BmpEntry::parse(
            entry_header(3, 20, 32),
            dib_32bpp(width, height, Orientation::BottomUp, &rgba, &mask),
        );
        let top_down = BmpEntry::parse(
            entry_header(3, 20, 32),
            dib_32bpp(width, height, Orientation::TopDown, &rgba, &mask),
        );
        assert_eq!(bottom_up.info().unwrap().height, 20);
        assert_eq!(top_down.info().unwrap().orientation, Orientation::TopDown);
        let codec = PngCodec::new();
        let image = bottom_up.pixel_buffer(&codec).unwrap();
        assert_eq!(image, top_down.pixel_buffer(&codec).unwrap());
        assert_eq!(image.width(), 3);
        assert_eq!(image.height(), 20);
        assert_eq!(&image.rgba_data()[..4], &[0, 0, 7, 0]);
        assert_eq!(&image.rgba_data()[4..8], &[1, 3, 7, 0xff]);
    }

    #[test]
    fn mask_padding_bits_are_ignored() {
        let (width, height) = (17, 2);
        let rgba = sample_pixels(width, height, 0xff);
        let mask: Vec<bool> = (0..(width * height)).map(|i| i == 16).collect();
        let mut data =
            dib_32bpp(width, height, Orientation::TopDown, &rgba, &mask);
        // Set every padding bit in both mask rows.
        let mask_start = data.len() - 8;
        for row in 0..2 {
            let start = mask_start + 4 * row;
            data[start + 2] |= 0x7f;
            data[start + 3] = 0xff;
        }
        let entry = BmpEntry::parse(entry_header(17, 2, 32), data);
        let mask = entry.mask_plane().unwrap();
        assert_eq!(mask.len(), 34);
        let transparent: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value == 0)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(transparent, vec![16]);
    }

    #[test]
    fn zero_alpha_plane_defers_to_mask() {
        let (width, height) = (2, 2);
        let rgba = sample_pixels(width, height, 0);
        let mask = [false, true, false, false];
        let entry = BmpEntry::parse(
            entry_header(2, 2, 32),
            dib_32bpp(width, height, Orientation::BottomUp, &rgba, &mask),
        );
        assert_eq!(entry.alpha_plane().unwrap(), None);
        assert_eq!(entry.opacity_plane().unwrap(), vec![255, 0, 255, 255]);
    }

    #[test]
    fn alpha_and_mask_take_minimum() {
        let (width, height) = (2, 2);
        let mut rgba = sample_pixels(width, height, 0x80);
        rgba[7] = 0xff;
        let mask = [false, false, true, false];
        let entry = BmpEntry::parse(
            entry_header(2, 2, 32),
            dib_32bpp(width, height, Orientation::BottomUp, &rgba, &mask),
        );
        assert_eq!(
            entry.alpha_plane().unwrap(),
            Some(vec![0x80, 0xff, 0x80, 0x80])
        );
        assert_eq!(entry.opacity_plane().unwrap(), vec![0x80, 0xff, 0, 0x80]);
    }

    #[test]
    fn rle_is_unsupported_but_parses() {
        let mut data =
            dib_32bpp(1, 1, Orientation::BottomUp, &[0; 4], &[false]);
        data[16] = 1; // RLE8
        let entry = BmpEntry::parse(entry_header(1, 1, 32), data);
        assert_eq!(entry.error(), None);
        assert_eq!(entry.info().unwrap().compression, Compression::Rle8);
        assert!(matches!(
            entry.pixel_buffer(&PngCodec::new()),
            Err(IcoError::Unsupported(_))
        ));
    }

    #[test]
    fn jpeg_compression_is_recorded() {
        let mut data =
            dib_32bpp(1, 1, Orientation::BottomUp, &[0; 4], &[false]);
        data[16] = 4; // JPEG
        let entry = BmpEntry::parse(entry_header(1, 1, 32), data);
        assert_eq!(
            entry.error(),
            Some(&IcoError::Unsupported(
                "Unsupported compression type: JPEG compressed".to_string()
            ))
        );
        assert!(entry.color_plane().is_err());
        assert!(entry.standalone_file_bytes().is_err());
    }

    #[test]
    fn truncated_color_plane_is_out_of_range() {
        let data =
            dib_32bpp(4, 4, Orientation::BottomUp, &[0; 64], &[false; 16]);
        let entry =
            BmpEntry::parse(entry_header(4, 4, 32), data[..60].to_vec());
        assert!(matches!(
            entry.color_plane(),
            Err(IcoError::OutOfRange { .. })
        ));
    }

    #[test]
    fn missing_mask_is_out_of_range() {
        let data =
            dib_32bpp(4, 4, Orientation::BottomUp, &[0; 64], &[false; 16]);
        let entry = BmpEntry::parse(
            entry_header(4, 4, 32),
            data[..(40 + 64)].to_vec(),
        );
        assert!(entry.color_plane().is_ok());
        assert!(matches!(
            entry.mask_plane(),
            Err(IcoError::OutOfRange { .. })
        ));
    }

    #[test]
    fn standalone_bmp_file() {
        let (width, height) = (2, 3);
        let rgba = sample_pixels(width, height, 0xff);
        let data = dib_32bpp(
            width,
            height,
            Orientation::BottomUp,
            &rgba,
            &[false; 6],
        );
        let entry = BmpEntry::parse(entry_header(2, 3, 32), data.clone());
        let file = entry.standalone_file_bytes().unwrap();
        let dib_len = 40 + 2 * 3 * 4;
        assert_eq!(file.len(), 14 + dib_len);
        assert_eq!(&file[0..2], b"BM");
        assert_eq!(&file[2..6], &((14 + dib_len) as u32).to_le_bytes());
        assert_eq!(&file[6..10], &[0, 0, 0, 0]);
        assert_eq!(&file[10..14], &54u32.to_le_bytes());
        // The height is the real height, not the doubled ICO height.
        assert_eq!(&file[22..26], &3i32.to_le_bytes());
        assert_eq!(&file[14..22], &data[0..8]);
        assert_eq!(&file[26..], &data[12..dib_len]);
    }

    #[test]
    fn standalone_top_down_is_flipped_to_bottom_up() {
        let (width, height) = (1, 3);
        let rgba = sample_pixels(width, height, 0xff);
        let mask = [false; 3];
        let top_down = BmpEntry::parse(
            entry_header(1, 3, 32),
            dib_32bpp(width, height, Orientation::TopDown, &rgba, &mask),
        );
        let bottom_up = BmpEntry::parse(
            entry_header(1, 3, 32),
            dib_32bpp(width, height, Orientation::BottomUp, &rgba, &mask),
        );
        let file = top_down.standalone_file_bytes().unwrap();
        assert_eq!(&file[22..26], &3i32.to_le_bytes());
        assert_eq!(file, bottom_up.standalone_file_bytes().unwrap());
        // First stored row is the bottom one.
        assert_eq!(&file[54..58], &[7, 6, 2, 0xff]);
    }

    #[test]
    fn deep_bitmap_skips_its_color_table() {
        let mut header = info(1, 1, Orientation::BottomUp);
        header.colors_used = 1;
        header.stored_colors_used = 1;
        let mut data = header.to_bytes().unwrap();
        data.extend_from_slice(b"\xaa\xbb\xcc\x00");
        data.extend_from_slice(b"\x10\x20\x30\xff");
        data.extend_from_slice(b"\x80\x00\x00\x00");
        let entry = BmpEntry::parse(entry_header(1, 1, 32), data.clone());
        assert_eq!(entry.error(), None);
        assert_eq!(entry.color_plane().unwrap(), vec![0x30, 0x20, 0x10, 0xff]);
        assert_eq!(entry.mask_plane().unwrap(), vec![0]);

        let file = entry.standalone_file_bytes().unwrap();
        assert_eq!(file.len(), 14 + 40 + 4 + 4);
        assert_eq!(&file[10..14], &58u32.to_le_bytes());
        assert_eq!(&file[22..26], &1i32.to_le_bytes());
        assert_eq!(&file[26..], &data[12..48]);
    }

    #[test]
    fn to_png_encodes_composited_pixels() {
        let (width, height) = (2, 2);
        let rgba = sample_pixels(width, height, 0);
        let mask = [true, false, false, false];
        let entry = BmpEntry::parse(
            entry_header(2, 2, 32),
            dib_32bpp(width, height, Orientation::BottomUp, &rgba, &mask),
        );
        let codec = PngCodec::new();
        let png = entry.to_png(&codec).unwrap();
        assert_eq!(png.width(), 2);
        assert_eq!(png.bits_per_pixel(), 32);
        let image = png.pixel_buffer(&codec).unwrap();
        assert_eq!(image, entry.pixel_buffer(&codec).unwrap());
        assert_eq!(image.rgba_data()[3], 0);
        assert_eq!(image.rgba_data()[7], 255);
    }
}

//===========================================================================//
