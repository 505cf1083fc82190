use crate::error::Result;
use std::io::Cursor;

//===========================================================================//

// Size limits for images in an ICO file:
const MIN_WIDTH: u32 = 1;
const MIN_HEIGHT: u32 = 1;

//===========================================================================//

/// A decoded image: RGBA pixels in row-major order from top to bottom.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IconImage {
    width: u32,
    height: u32,
    rgba_data: Vec<u8>,
}

impl IconImage {
    /// Creates a new image with the given dimensions and RGBA data.  The
    /// `width` and `height` must be nonzero, and `rgba_data` must have `4 *
    /// width * height` bytes and be in row-major order from top to bottom.
    pub fn from_rgba_data(
        width: u32,
        height: u32,
        rgba_data: Vec<u8>,
    ) -> Result<IconImage> {
        if width < MIN_WIDTH {
            format_error!(
                "Invalid width (was {}, but must be at least {})",
                width,
                MIN_WIDTH
            );
        }
        if height < MIN_HEIGHT {
            format_error!(
                "Invalid height (was {}, but must be at least {})",
                height,
                MIN_HEIGHT
            );
        }
        let expected_data_len = (width as u64) * (height as u64) * 4;
        if (rgba_data.len() as u64) != expected_data_len {
            format_error!(
                "Invalid data length (was {}, but must be {} for {}x{} image)",
                rgba_data.len(),
                expected_data_len,
                width,
                height
            );
        }
        Ok(IconImage { width, height, rgba_data })
    }

    /// Returns the width of the image, in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the image, in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the RGBA data for this image, in row-major order from top to
    /// bottom.
    pub fn rgba_data(&self) -> &[u8] {
        &self.rgba_data
    }

    /// Consumes the image, returning its RGBA data.
    pub fn into_rgba_data(self) -> Vec<u8> {
        self.rgba_data
    }
}

//===========================================================================//

/// Combines an opaque color plane with a separate opacity plane.
///
/// This is a "source-in" composite: each output pixel takes its RGB from
/// `color` (RGBA, 4 bytes per pixel; its alpha byte is ignored) and its alpha
/// from `opacity` (1 byte per pixel).
pub fn composite(
    width: u32,
    height: u32,
    color: &[u8],
    opacity: &[u8],
) -> Result<IconImage> {
    let num_pixels = (width as usize) * (height as usize);
    if color.len() != num_pixels * 4 || opacity.len() != num_pixels {
        format_error!(
            "Color and opacity planes don't match a {}x{} image \
             ({} and {} bytes)",
            width,
            height,
            color.len(),
            opacity.len()
        );
    }
    let mut rgba = Vec::with_capacity(num_pixels * 4);
    for (pixel, &alpha) in color.chunks_exact(4).zip(opacity.iter()) {
        rgba.extend_from_slice(&pixel[..3]);
        rgba.push(alpha);
    }
    IconImage::from_rgba_data(width, height, rgba)
}

//===========================================================================//

/// The image decoder and PNG encoder that ICO entries delegate to.
///
/// Implementations must be usable from several threads at once, since
/// entries are converted in parallel when an icon file is saved.
pub trait ImageCodec: Sync {
    /// Decodes an encoded image (PNG) into RGBA pixels.
    fn decode(&self, data: &[u8]) -> Result<IconImage>;

    /// Encodes RGBA pixels as a PNG file.
    fn encode_png(&self, image: &IconImage) -> Result<Vec<u8>>;
}

/// The default [`ImageCodec`], backed by the `png` crate.
#[derive(Clone, Copy, Debug)]
pub struct PngCodec {
    compression: png::Compression,
    filter: png::FilterType,
}

impl PngCodec {
    /// Creates a codec with the default encoder settings.
    pub fn new() -> PngCodec {
        PngCodec {
            compression: png::Compression::Default,
            filter: png::FilterType::Sub,
        }
    }

    /// Sets the zlib compression level used when encoding.
    pub fn with_compression(mut self, compression: png::Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the row filter used when encoding.
    pub fn with_filter(mut self, filter: png::FilterType) -> Self {
        self.filter = filter;
        self
    }

    fn encode_png_internal(
        &self,
        image: &IconImage,
    ) -> std::result::Result<Vec<u8>, png::EncodingError> {
        let mut data = Vec::new();
        {
            let mut encoder =
                png::Encoder::new(&mut data, image.width(), image.height());
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(self.compression);
            encoder.set_filter(self.filter);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(image.rgba_data())?;
            writer.finish()?;
        }
        Ok(data)
    }
}

impl Default for PngCodec {
    fn default() -> PngCodec {
        PngCodec::new()
    }
}

impl ImageCodec for PngCodec {
    fn decode(&self, data: &[u8]) -> Result<IconImage> {
        let mut decoder = png::Decoder::new(Cursor::new(data));
        // Expand palettes and low bit depths, and reduce 16-bit samples, so
        // that every image comes out as 8-bit gray/RGB with optional alpha.
        decoder.set_transformations(
            png::Transformations::EXPAND | png::Transformations::STRIP_16,
        );
        let mut png_reader = match decoder.read_info() {
            Ok(png_reader) => png_reader,
            Err(error) => codec_error!("Malformed PNG data: {}", error),
        };
        let mut buffer = vec![0u8; png_reader.output_buffer_size()];
        let frame = match png_reader.next_frame(&mut buffer) {
            Ok(frame) => frame,
            Err(error) => codec_error!("Malformed PNG data: {}", error),
        };
        buffer.truncate(frame.buffer_size());
        let rgba_data = match frame.color_type {
            png::ColorType::Rgba => buffer,
            png::ColorType::Rgb => {
                let mut rgba = Vec::with_capacity((buffer.len() / 3) * 4);
                for pixel in buffer.chunks_exact(3) {
                    rgba.extend_from_slice(pixel);
                    rgba.push(u8::MAX);
                }
                rgba
            }
            png::ColorType::GrayscaleAlpha => {
                let mut rgba = Vec::with_capacity(buffer.len() * 2);
                for pixel in buffer.chunks_exact(2) {
                    let (gray, alpha) = (pixel[0], pixel[1]);
                    rgba.extend_from_slice(&[gray, gray, gray, alpha]);
                }
                rgba
            }
            png::ColorType::Grayscale => {
                let mut rgba = Vec::with_capacity(buffer.len() * 4);
                for &gray in buffer.iter() {
                    rgba.extend_from_slice(&[gray, gray, gray, u8::MAX]);
                }
                rgba
            }
            png::ColorType::Indexed => {
                codec_error!("PNG palette was not expanded");
            }
        };
        IconImage::from_rgba_data(frame.width, frame.height, rgba_data)
    }

    fn encode_png(&self, image: &IconImage) -> Result<Vec<u8>> {
        match self.encode_png_internal(image) {
            Ok(data) => Ok(data),
            Err(png::EncodingError::LimitsExceeded) => {
                codec_error!("PNG limits exceeded");
            }
            Err(error) => codec_error!("Could not encode PNG: {}", error),
        }
    }
}

//===========================================================================//


//===========================================================================//
