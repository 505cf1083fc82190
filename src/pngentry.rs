use crate::entry::{Entry, EntryHeader, ENTRY_HEADER_LEN};
use crate::error::{IcoError, Result};
use crate::image::{IconImage, ImageCodec};

//===========================================================================//

/// The media type that [`PngEntry::from_encoded_image`] accepts.
pub const PNG_MEDIA_TYPE: &str = "image/png";

// PNG entries always report 32 bits per pixel.
const PNG_BITS_PER_PIXEL: u16 = 32;

//===========================================================================//

/// An ICO entry whose image data is a complete PNG file.
///
/// PNG entries are never re-encoded: the bytes they were created from are
/// exactly the bytes written back out.
#[derive(Clone, Debug)]
pub struct PngEntry {
    header: EntryHeader,
    data: Vec<u8>,
    error: Option<IcoError>,
}

impl PngEntry {
    pub(crate) fn parse(header: EntryHeader, data: Vec<u8>) -> PngEntry {
        PngEntry { header, data, error: None }
    }

    /// Creates a new, unplaced entry from the contents of a PNG file.
    ///
    /// `media_type` is the declared type of the source (e.g. from a file
    /// picker); anything other than `image/png` is rejected.  Rejections are
    /// recorded on the returned entry (see [`Entry::error`]) rather than
    /// returned, so that a batch of new images can be added without any one
    /// of them aborting the rest.
    pub fn from_encoded_image(
        data: Vec<u8>,
        media_type: &str,
        codec: &dyn ImageCodec,
    ) -> PngEntry {
        let mut entry = PngEntry {
            header: EntryHeader {
                width: 0,
                height: 0,
                num_colors: 0,
                color_planes: 1,
                bits_per_pixel: PNG_BITS_PER_PIXEL,
                data_offset: ENTRY_HEADER_LEN,
            },
            data: Vec::new(),
            error: None,
        };
        if media_type != PNG_MEDIA_TYPE {
            entry.error = Some(IcoError::Format("Not a PNG file".to_string()));
            return entry;
        }
        if let Err(error) = check_data_len(data.len() as u64) {
            entry.error = Some(error);
            return entry;
        }
        match codec.decode(&data) {
            Ok(image) => {
                entry.header.width = image.width();
                entry.header.height = image.height();
            }
            Err(error) => entry.error = Some(error),
        }
        entry.data = data;
        entry
    }

    /// Encodes a decoded image as a new, unplaced PNG entry.
    pub(crate) fn from_image(
        image: &IconImage,
        codec: &dyn ImageCodec,
    ) -> Result<PngEntry> {
        let data = codec.encode_png(image)?;
        check_data_len(data.len() as u64)?;
        let header = EntryHeader {
            width: image.width(),
            height: image.height(),
            num_colors: 0,
            color_planes: 1,
            bits_per_pixel: PNG_BITS_PER_PIXEL,
            data_offset: ENTRY_HEADER_LEN,
        };
        Ok(PngEntry { header, data, error: None })
    }

    /// Sets the fields that a PNG directory record is written with.
    pub(crate) fn place(&mut self, data_offset: u32) {
        self.header.num_colors = 0;
        self.header.color_planes = 1;
        self.header.data_offset = data_offset;
    }
}

impl Entry for PngEntry {
    fn header(&self) -> &EntryHeader {
        &self.header
    }

    fn encoded_bytes(&self) -> &[u8] {
        &self.data
    }

    fn error(&self) -> Option<&IcoError> {
        self.error.as_ref()
    }

    fn pixel_buffer(&self, codec: &dyn ImageCodec) -> Result<IconImage> {
        if let Some(ref error) = self.error {
            return Err(error.clone());
        }
        codec.decode(&self.data)
    }

    fn standalone_file_bytes(&self) -> Result<Vec<u8>> {
        if let Some(ref error) = self.error {
            return Err(error.clone());
        }
        Ok(self.data.clone())
    }
}

/// Fails if `len` bytes of image data can't be described by the 32-bit
/// length field of an ICO directory entry.
pub(crate) fn check_data_len(len: u64) -> Result<()> {
    if len > u32::MAX as u64 {
        size_limit!(
            "PNG is too large (was {} bytes, but max is {})",
            len,
            u32::MAX
        );
    }
    Ok(())
}

//===========================================================================//


//===========================================================================//
