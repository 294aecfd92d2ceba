use std::str::Utf8Error;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unable to identify N1B format from leading header bytes")]
    UnknownFormat,

    #[error("leading header bytes match more than one N1B format")]
    AmbiguousFormat,

    #[error("Not enough bytes decoding {0}")]
    NotEnoughBytes(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Utf8Error(#[from] Utf8Error),

    #[error("no field {name} in the {section} section")]
    FieldNotFound { section: String, name: String },

    #[error("invalid channel {got}; expected one of {valid}")]
    InvalidChannel { got: String, valid: String },

    #[error("image index {0} out of range; only index 0 is available")]
    ImageIndexOutOfRange(usize),

    #[error("no satellite matching {0}")]
    UnknownSatellite(String),

    #[error("invalid date field: {0}")]
    InvalidDate(String),

    #[error("{file}:{line}: {reason}")]
    BulletinParse {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("no ephemeris record covering {0}")]
    EphemerisOutOfRange(String),

    #[error("no orbit bulletin named {0}")]
    BulletinNotFound(String),

    #[error("scan line time sequence is not monotonic at line {0}")]
    NonMonotonicTime(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
