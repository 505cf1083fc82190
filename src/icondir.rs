use crate::bmpentry::BmpEntry;
use crate::cursor::ByteCursor;
use crate::entry::{Entry, EntryHeader, IconDirEntry, ENTRY_HEADER_LEN};
use crate::error::{IcoError, Result};
use crate::image::ImageCodec;
use crate::pngentry::PngEntry;
use byteorder::LittleEndian;
use log::{debug, warn};
use rayon::prelude::*;
use std::io::{self, Read, Write};

//===========================================================================//

/// The size of the ICONDIR header, in bytes.
pub const ICONDIR_HEADER_LEN: u32 = 6;

// The two little-endian u16 fields that every ICO file starts with.
const RESERVED: u16 = 0;
const ICON_TYPE: u16 = 1;

const NOT_AN_ICO_FILE: &str = "Not an ICO file";

//===========================================================================//

/// A collection of images; the contents of a single ICO file.
///
/// Entries are kept in display order, which is preserved when the file is
/// written back out.  The collection is only changed through its command
/// methods, each of which bumps [`IconDir::version`], so that a caller that
/// snapshots the entry list can tell whether it went stale.
#[derive(Clone, Debug, Default)]
pub struct IconDir {
    entries: Vec<IconDirEntry>,
    error: Option<IcoError>,
    version: u64,
}

impl IconDir {
    /// Creates a new, empty collection of icons.
    pub fn new() -> IconDir {
        IconDir { entries: Vec::new(), error: None, version: 0 }
    }

    /// Creates a collection holding the given entries, in order.
    pub fn from_entries(entries: Vec<IconDirEntry>) -> Result<IconDir> {
        let mut icondir = IconDir::new();
        icondir.replace_all(entries)?;
        Ok(icondir)
    }

    /// Returns the entries in this collection.
    pub fn entries(&self) -> &[IconDirEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the problem found while parsing the file, if any.  A file
    /// that isn't an ICO file at all has this set and no entries.
    pub fn error(&self) -> Option<&IcoError> {
        self.error.as_ref()
    }

    /// Returns a counter that changes every time the entry list does.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the size this collection would have as an ICO file if written
    /// with every entry in its current encoding.
    pub fn serialized_length(&self) -> usize {
        ICONDIR_HEADER_LEN as usize
            + self
                .entries
                .iter()
                .map(|entry| entry.serialized_length())
                .sum::<usize>()
    }

    fn check_capacity(count: usize) -> Result<()> {
        if count > u16::MAX as usize {
            size_limit!(
                "Too many entries in IconDir (was {}, but max is {})",
                count,
                u16::MAX
            );
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Adds an entry to the end of the collection.
    pub fn add_entry<E: Into<IconDirEntry>>(
        &mut self,
        entry: E,
    ) -> Result<()> {
        let index = self.entries.len();
        self.insert_entry(index, entry)
    }

    /// Inserts an entry at `index`, shifting later entries back.
    pub fn insert_entry<E: Into<IconDirEntry>>(
        &mut self,
        index: usize,
        entry: E,
    ) -> Result<()> {
        if index > self.entries.len() {
            return Err(IcoError::OutOfRange {
                offset: index,
                len: 1,
                size: self.entries.len(),
            });
        }
        IconDir::check_capacity(self.entries.len() + 1)?;
        self.entries.insert(index, entry.into());
        self.touch();
        Ok(())
    }

    /// Removes and returns the entry at `index`, or returns `None` if there
    /// is no such entry.
    pub fn remove_entry(&mut self, index: usize) -> Option<IconDirEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let entry = self.entries.remove(index);
        self.touch();
        Some(entry)
    }

    /// Replaces every entry in the collection.
    pub fn replace_all(&mut self, entries: Vec<IconDirEntry>) -> Result<()> {
        IconDir::check_capacity(entries.len())?;
        self.entries = entries;
        self.touch();
        Ok(())
    }

    /// Converts the entry at `index` to PNG in place; see
    /// [`IconDirEntry::convert_to_png_if_needed`].  Returns false if there
    /// is no such entry.
    pub fn convert_to_png(
        &mut self,
        index: usize,
        codec: &dyn ImageCodec,
    ) -> bool {
        let converted = match self.entries.get_mut(index) {
            Some(entry) if entry.is_png() => return entry.error().is_none(),
            Some(entry) => entry.convert_to_png_if_needed(codec),
            None => return false,
        };
        if converted {
            self.touch();
        }
        converted
    }

    /// Creates PNG entries from several encoded images at once, each given
    /// with its declared media type, and appends them in order.  Images are
    /// decoded in parallel; an image that fails to decode is still added,
    /// with its error recorded on the entry.
    pub fn add_encoded_images(
        &mut self,
        images: Vec<(Vec<u8>, String)>,
        codec: &dyn ImageCodec,
    ) -> Result<()> {
        IconDir::check_capacity(self.entries.len() + images.len())?;
        let new_entries: Vec<IconDirEntry> = images
            .into_par_iter()
            .map(|(data, media_type)| {
                let entry =
                    PngEntry::from_encoded_image(data, &media_type, codec);
                if let Some(error) = entry.error() {
                    warn!("Rejected new {} image: {}", media_type, error);
                }
                IconDirEntry::Png(entry)
            })
            .collect();
        self.entries.extend(new_entries);
        self.touch();
        Ok(())
    }

    /// Parses an ICO file.
    ///
    /// This never fails outright.  If `data` doesn't start with the ICO
    /// magic number, the result has [`IconDir::error`] set and no entries.
    /// Problems with individual entries are recorded on those entries, and
    /// a directory that ends early keeps the entries read so far.
    pub fn parse(data: &[u8]) -> IconDir {
        let mut icondir = IconDir::new();
        let mut cursor = ByteCursor::new(data);
        match cursor.get_u16_array::<LittleEndian>(2) {
            Ok(ref magic) if magic[..] == [RESERVED, ICON_TYPE] => {}
            _ => {
                icondir.error = Some(IcoError::Format(NOT_AN_ICO_FILE.into()));
                return icondir;
            }
        }
        let num_entries = match cursor.get_u16::<LittleEndian>() {
            Ok(num_entries) => num_entries as usize,
            Err(error) => {
                icondir.error = Some(error);
                return icondir;
            }
        };
        let mut records =
            Vec::<(EntryHeader, u32)>::with_capacity(num_entries);
        for _ in 0..num_entries {
            match EntryHeader::read(&mut cursor) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(
                        "ICO directory ends after {} of {} entries",
                        records.len(),
                        num_entries
                    );
                    icondir.error = Some(error);
                    break;
                }
            }
        }
        // Each entry copies its payload, so the copies together may not
        // exceed the input; records that share one large range would
        // otherwise multiply it.
        let mut claimed: usize = 0;
        for (index, (header, data_size)) in records.into_iter().enumerate() {
            let span = cursor
                .bytes_at(header.data_offset as usize, data_size as usize);
            let entry = match span {
                Ok(bytes) if claimed + bytes.len() > data.len() => {
                    let error = IcoError::SizeLimit(format!(
                        "ICO entries claim more than the file's {} bytes",
                        data.len()
                    ));
                    IconDirEntry::Bitmap(BmpEntry::unreadable(header, error))
                }
                Ok(bytes) => {
                    claimed += bytes.len();
                    IconDirEntry::parse(header, bytes.to_vec())
                }
                Err(error) => {
                    IconDirEntry::Bitmap(BmpEntry::unreadable(header, error))
                }
            };
            if let Some(error) = entry.error() {
                warn!("ICO entry {} can't be decoded: {}", index, error);
            }
            icondir.entries.push(entry);
        }
        debug!("Parsed ICO file with {} entries", icondir.entries.len());
        icondir
    }

    /// Reads an ICO file into memory.  Only I/O errors are returned; format
    /// problems are recorded as described for [`IconDir::parse`].
    pub fn read<R: Read>(mut reader: R) -> io::Result<IconDir> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(IconDir::parse(&data))
    }

    /// Encodes the collection as an ICO file.
    ///
    /// Every entry is stored as a PNG; BMP entries are converted (in
    /// parallel) on a snapshot of the entry list, so `self` is unchanged.
    /// Entries that can't be converted, or that carry an error, are left out
    /// of the file rather than failing the whole save.
    pub fn serialize(&self, codec: &dyn ImageCodec) -> Result<Vec<u8>> {
        let snapshot: Vec<IconDirEntry> = self.entries.clone();
        let converted: Vec<Option<PngEntry>> = snapshot
            .par_iter()
            .enumerate()
            .map(|(index, entry)| match entry.to_png(codec) {
                Ok(png) => Some(png),
                Err(error) => {
                    warn!(
                        "Leaving entry {} out of ICO file: {}",
                        index, error
                    );
                    None
                }
            })
            .collect();
        let mut entries: Vec<PngEntry> =
            converted.into_iter().flatten().collect();
        IconDir::check_capacity(entries.len())?;

        let directory_len = ICONDIR_HEADER_LEN as usize
            + ENTRY_HEADER_LEN as usize * entries.len();
        let file_len = directory_len
            + entries
                .iter()
                .map(|entry| entry.encoded_bytes().len())
                .sum::<usize>();
        if file_len > u32::MAX as usize {
            size_limit!("ICO file is too large ({} bytes)", file_len);
        }

        let mut cursor = ByteCursor::new(vec![0u8; file_len]);
        cursor.set_u16::<LittleEndian>(RESERVED, None)?;
        cursor.set_u16::<LittleEndian>(ICON_TYPE, None)?;
        cursor.set_u16::<LittleEndian>(entries.len() as u16, None)?;
        // Directory records are written at the shared cursor; image data goes
        // at explicit offsets past the end of the directory.
        let mut data_offset = directory_len;
        for entry in entries.iter_mut() {
            entry.place(data_offset as u32);
            entry.header().write(&mut cursor, entry.data_size())?;
            data_offset =
                cursor.set_bytes(entry.encoded_bytes(), Some(data_offset))?;
        }
        debug_assert_eq!(cursor.position(), directory_len);
        debug_assert_eq!(data_offset, file_len);
        debug!(
            "Serialized {} of {} entries into {} bytes",
            entries.len(),
            self.entries.len(),
            file_len
        );
        Ok(cursor.into_inner())
    }

    /// Writes the collection out as an ICO file; see [`IconDir::serialize`].
    pub fn write<W: Write>(
        &self,
        mut writer: W,
        codec: &dyn ImageCodec,
    ) -> io::Result<()> {
        let data = self.serialize(codec)?;
        writer.write_all(&data)
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::IconDir;
    use crate::entry::{Entry, IconDirEntry};
    use crate::error::IcoError;
    use crate::image::{IconImage, ImageCodec, PngCodec};
    use crate::pngentry::{PngEntry, PNG_MEDIA_TYPE};
    use std::io::Cursor;

    fn png_entry(width: u32, height: u32) -> PngEntry {
        let rgba = vec![0xaa; (4 * width * height) as usize];
        let image = IconImage::from_rgba_data(width, height, rgba).unwrap();
        let codec = PngCodec::new();
        let data = codec.encode_png(&image).unwrap();
        PngEntry::from_encoded_image(data, PNG_MEDIA_TYPE, &codec)
    }

    #[test]
    fn read_empty_icon_set() {
        let input = b"\x00\x00\x01\x00\x00\x00";
        let icondir = IconDir::read(Cursor::new(input)).unwrap();
        assert_eq!(icondir.error(), None);
        assert_eq!(icondir.entries().len(), 0);
    }

    #[test]
    fn cursor_file_is_not_an_ico_file() {
        let icondir = IconDir::parse(b"\x00\x00\x02\x00\x00\x00");
        assert_eq!(
            icondir.error(),
            Some(&IcoError::Format("Not an ICO file".to_string()))
        );
        assert!(icondir.is_empty());
    }

    #[test]
    fn short_input_is_not_an_ico_file() {
        for input in [&b""[..], b"\x00", b"\x00\x00\x01"].iter() {
            let icondir = IconDir::parse(input);
            assert_eq!(
                icondir.error().map(|error| error.to_string()),
                Some("Not an ICO file".to_string())
            );
        }
    }

    #[test]
    fn write_empty_icon_set() {
        let icondir = IconDir::new();
        let mut output = Vec::<u8>::new();
        icondir.write(&mut output, &PngCodec::new()).unwrap();
        let expected: &[u8] = b"\x00\x00\x01\x00\x00\x00";
        assert_eq!(output.as_slice(), expected);
    }

    #[test]
    fn truncated_directory_keeps_earlier_entries() {
        let input: &[u8] = b"\
            \x00\x00\x01\x00\x02\x00\
            \x01\x01\x00\x00\x01\x00\x20\x00\
            \x00\x00\x00\x00\x16\x00\x00\x00\
            \x01\x01\x00\x00";
        let icondir = IconDir::parse(input);
        assert!(matches!(icondir.error(), Some(&IcoError::OutOfRange { .. })));
        assert_eq!(icondir.len(), 1);
    }

    #[test]
    fn data_outside_file_is_recorded_on_entry() {
        let input: &[u8] = b"\
            \x00\x00\x01\x00\x01\x00\
            \x01\x01\x00\x00\x01\x00\x20\x00\
            \x40\x00\x00\x00\x16\x00\x00\x00";
        let icondir = IconDir::parse(input);
        assert_eq!(icondir.error(), None);
        assert_eq!(icondir.len(), 1);
        let entry = &icondir.entries()[0];
        assert!(!entry.is_png());
        assert!(matches!(entry.error(), Some(&IcoError::OutOfRange { .. })));
    }

    #[test]
    fn shared_payloads_cannot_exceed_the_file() {
        let mut input = b"\x00\x00\x01\x00\x03\x00".to_vec();
        for _ in 0..3 {
            input.extend_from_slice(b"\x01\x01\x00\x00\x01\x00\x20\x00");
            input.extend_from_slice(&100u32.to_le_bytes());
            input.extend_from_slice(&54u32.to_le_bytes());
        }
        input.extend_from_slice(&[0u8; 100]);
        let icondir = IconDir::parse(&input);
        assert_eq!(icondir.error(), None);
        assert_eq!(icondir.len(), 3);
        let first = &icondir.entries()[0];
        assert_eq!(first.encoded_bytes().len(), 100);
        assert!(!matches!(first.error(), Some(&IcoError::SizeLimit(_))));
        for entry in &icondir.entries()[1..] {
            assert!(entry.encoded_bytes().is_empty());
            assert!(matches!(entry.error(), Some(&IcoError::SizeLimit(_))));
        }
    }

    #[test]
    fn read_bmp_1bpp_icon() {
        let input: &[u8] = b"\
            \x00\x00\x01\x00\x01\x00\
            \
            \x02\x02\x02\x00\x01\x00\x01\x00\
            \x40\x00\x00\x00\x16\x00\x00\x00\
            \
            \x28\x00\x00\x00\x02\x00\x00\x00\x04\x00\x00\x00\
            \x01\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\
            \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\
            \x00\x00\x00\x00\
            \
            \x55\x00\x55\x00\xff\xff\xff\x00\
            \
            \xc0\x00\x00\x00\
            \x40\x00\x00\x00\
            \
            \x40\x00\x00\x00\
            \x00\x00\x00\x00";
        let icondir = IconDir::parse(input);
        assert_eq!(icondir.entries().len(), 1);
        let entry = &icondir.entries()[0];
        assert_eq!(entry.width(), 2);
        assert_eq!(entry.height(), 2);
        assert_eq!(entry.header().num_colors, 2);
        assert_eq!(entry.header().data_offset, 22);
        assert_eq!(entry.data_size(), 64);
        assert!(!entry.is_png());
        let image = entry.pixel_buffer(&PngCodec::new()).unwrap();
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 2);
        let rgba: &[u8] = b"\
            \x55\x00\x55\xff\xff\xff\xff\xff\
            \xff\xff\xff\xff\xff\xff\xff\x00";
        assert_eq!(image.rgba_data(), rgba);
    }

    #[test]
    fn read_bmp_4bpp_icon() {
        let input: &[u8] = b"\
            \x00\x00\x01\x00\x01\x00\
            \
            \x05\x03\x10\x00\x01\x00\x04\x00\
            \x80\x00\x00\x00\x16\x00\x00\x00\
            \
            \x28\x00\x00\x00\x05\x00\x00\x00\x06\x00\x00\x00\
            \x01\x00\x04\x00\x00\x00\x00\x00\x00\x00\x00\x00\
            \x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\
            \x00\x00\x00\x00\
            \
            \x00\x00\x00\x00\x00\x00\x00\x00\
            \x00\x00\x7f\x00\x00\x00\xff\x00\
            \x00\x7f\x00\x00\x00\xff\x00\x00\
            \x00\x7f\x7f\x00\x00\xff\xff\x00\
            \x7f\x00\x00\x00\xff\x00\x00\x00\
            \x7f\x00\x7f\x00\xff\x00\xff\x00\
            \x7f\x7f\x00\x00\xff\xff\x00\x00\
            \x7f\x7f\x7f\x00\xff\xff\xff\x00\
            \
            \x0f\x35\x00\x00\
            \xf3\x59\x10\x00\
            \x05\x91\x00\x00\
            \
            \x88\x00\x00\x00\
            \x00\x00\x00\x00\
            \x88\x00\x00\x00";
        let icondir = IconDir::parse(input);
        assert_eq!(icondir.entries().len(), 1);
        let entry = &icondir.entries()[0];
        assert_eq!(entry.width(), 5);
        assert_eq!(entry.height(), 3);
        assert!(!entry.is_png());
        let image = entry.pixel_buffer(&PngCodec::new()).unwrap();
        assert_eq!(image.width(), 5);
        assert_eq!(image.height(), 3);
        let rgba: &[u8] = b"\
            \x00\x00\x00\x00\x00\xff\x00\xff\x00\x00\xff\xff\
            \x00\x00\x00\xff\x00\x00\x00\x00\
            \xff\xff\xff\xff\xff\x00\x00\xff\x00\xff\x00\xff\
            \x00\x00\xff\xff\x00\x00\x00\xff\
            \x00\x00\x00\x00\xff\xff\xff\xff\xff\x00\x00\xff\
            \x00\xff\x00\xff\x00\x00\x00\x00";
        assert_eq!(image.rgba_data(), rgba);
    }

    #[test]
    fn read_png_grayscale_icon() {
        let input: &[u8] = b"\
            \x00\x00\x01\x00\x01\x00\
            \
            \x02\x02\x00\x00\x00\x00\x00\x00\
            \x47\x00\x00\x00\x16\x00\x00\x00\
            \
            \x89\x50\x4e\x47\x0d\x0a\x1a\x0a\x00\x00\x00\x0d\x49\x48\x44\x52\
            \x00\x00\x00\x02\x00\x00\x00\x02\x08\x00\x00\x00\x00\x57\xdd\x52\
            \xf8\x00\x00\x00\x0e\x49\x44\x41\x54\x78\x9c\x63\xb4\x77\x60\xdc\
            \xef\x00\x00\x04\x08\x01\x81\x86\x2e\xc9\x8d\x00\x00\x00\x00\x49\
            \x45\x4e\x44\xae\x42\x60\x82";
        let icondir = IconDir::parse(input);
        assert_eq!(icondir.entries().len(), 1);
        let entry = &icondir.entries()[0];
        assert_eq!(entry.width(), 2);
        assert_eq!(entry.height(), 2);
        assert!(entry.is_png());
        assert_eq!(entry.encoded_bytes(), &input[22..]);
        let image = entry.pixel_buffer(&PngCodec::new()).unwrap();
        let rgba: &[u8] = b"\
            \x3f\x3f\x3f\xff\x7f\x7f\x7f\xff\
            \xbf\xbf\xbf\xff\xff\xff\xff\xff";
        assert_eq!(image.rgba_data(), rgba);
    }

    #[test]
    fn commands_bump_version() {
        let mut icondir = IconDir::new();
        assert_eq!(icondir.version(), 0);
        icondir.add_entry(png_entry(1, 1)).unwrap();
        icondir.insert_entry(0, png_entry(2, 2)).unwrap();
        assert_eq!(icondir.version(), 2);
        let widths: Vec<u32> =
            icondir.entries().iter().map(|entry| entry.width()).collect();
        assert_eq!(widths, vec![2, 1]);
        assert!(icondir.insert_entry(5, png_entry(3, 3)).is_err());
        assert_eq!(icondir.version(), 2);
        let removed = icondir.remove_entry(0).unwrap();
        assert_eq!(removed.width(), 2);
        assert!(icondir.remove_entry(3).is_none());
        assert_eq!(icondir.version(), 3);
        icondir.replace_all(Vec::new()).unwrap();
        assert!(icondir.is_empty());
        assert_eq!(icondir.version(), 4);
    }

    #[test]
    fn serialized_length_counts_every_entry() {
        let first = png_entry(3, 3);
        let second = png_entry(5, 5);
        let expected =
            6 + 2 * 16 + (first.data_size() + second.data_size()) as usize;
        let icondir = IconDir::from_entries(vec![
            IconDirEntry::from(first),
            IconDirEntry::from(second),
        ])
        .unwrap();
        assert_eq!(icondir.serialized_length(), expected);
        let data = icondir.serialize(&PngCodec::new()).unwrap();
        assert_eq!(data.len(), expected);
    }

    #[test]
    fn add_encoded_images_keeps_order_and_errors() {
        let codec = PngCodec::new();
        let mut images = Vec::new();
        for size in 1..5u32 {
            let rgba = vec![0; (4 * size * size) as usize];
            let image = IconImage::from_rgba_data(size, size, rgba).unwrap();
            let data = codec.encode_png(&image).unwrap();
            images.push((data, "image/png".to_string()));
        }
        images.insert(2, (b"GIF89a".to_vec(), "image/gif".to_string()));
        let mut icondir = IconDir::new();
        icondir.add_encoded_images(images, &codec).unwrap();
        let widths: Vec<u32> =
            icondir.entries().iter().map(|entry| entry.width()).collect();
        assert_eq!(widths, vec![1, 2, 0, 3, 4]);
        assert!(icondir.entries()[2].error().is_some());
        assert_eq!(icondir.version(), 1);

        let data = icondir.serialize(&codec).unwrap();
        assert_eq!(IconDir::parse(&data).len(), 4);
    }

    #[test]
    fn convert_entry_in_place() {
        let mut icondir = IconDir::new();
        icondir.add_entry(png_entry(2, 2)).unwrap();
        assert!(icondir.convert_to_png(0, &PngCodec::new()));
        assert_eq!(icondir.version(), 1);
        assert!(!icondir.convert_to_png(1, &PngCodec::new()));
    }
}

//===========================================================================//
