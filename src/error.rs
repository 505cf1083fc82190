use std::io;
use thiserror::Error;

//===========================================================================//

/// Errors produced while reading or writing ICO data.
///
/// Most of these are *recorded* rather than returned: a container that fails
/// its magic check, or an entry whose bitmap can't be decoded, still comes
/// back to the caller with the error attached, so that one bad image never
/// prevents the rest of a file from being inspected.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum IcoError {
    /// The data is not in the expected format (wrong magic number or
    /// signature, or a malformed header).
    #[error("{0}")]
    Format(String),
    /// The data is well-formed, but uses a feature this library can't
    /// decode (e.g. RLE compression).
    #[error("{0}")]
    Unsupported(String),
    /// The data is too large to be stored in an ICO file.
    #[error("{0}")]
    SizeLimit(String),
    /// A read or write would have gone past the end of a buffer.
    #[error(
        "Access of {len} bytes at offset {offset} is out of range \
         (buffer is {size} bytes)"
    )]
    OutOfRange {
        /// The offset at which the access started.
        offset: usize,
        /// The number of bytes that were to be accessed.
        len: usize,
        /// The total size of the buffer.
        size: usize,
    },
    /// The image codec failed to decode or encode an image.
    #[error("{0}")]
    Codec(String),
}

/// A `Result` with an [`IcoError`] as its error type.
pub type Result<T> = std::result::Result<T, IcoError>;

impl From<IcoError> for io::Error {
    fn from(error: IcoError) -> io::Error {
        let kind = match error {
            IcoError::SizeLimit(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, error)
    }
}

//===========================================================================//


//===========================================================================//
