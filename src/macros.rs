//===========================================================================//

macro_rules! format_error {
    ($e:expr) => {
        return Err($crate::error::IcoError::Format(
            ::std::string::String::from($e)))
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::error::IcoError::Format(format!($fmt, $($arg)+)))
    };
}

macro_rules! unsupported {
    ($e:expr) => {
        return Err($crate::error::IcoError::Unsupported(
            ::std::string::String::from($e)))
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::error::IcoError::Unsupported(
            format!($fmt, $($arg)+)))
    };
}

macro_rules! size_limit {
    ($e:expr) => {
        return Err($crate::error::IcoError::SizeLimit(
            ::std::string::String::from($e)))
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::error::IcoError::SizeLimit(
            format!($fmt, $($arg)+)))
    };
}

macro_rules! codec_error {
    ($e:expr) => {
        return Err($crate::error::IcoError::Codec(
            ::std::string::String::from($e)))
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::error::IcoError::Codec(
            format!($fmt, $($arg)+)))
    };
}

//===========================================================================//
