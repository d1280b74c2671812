//! Error taxonomy for the FAT32 engine.
//!
//! Mirrors the teacher crate's two-level error shape (`BootSectorInitError`
//! wrapped by `BootSectorInitIoError`) but collapsed into a single enum,
//! since every layer above L1 needs to be able to return any of these.

use std::io;

use fmt_extra::AsciiStr;

/// Everything that can go wrong while opening, reading, mutating, or
/// repairing a volume.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Boot sector or FSInfo failed validation.
    #[error("invalid image: {reason}")]
    InvalidImage { reason: String },

    /// The `fat_count` copies of the FAT are not byte-identical.
    ///
    /// Fatal unless the engine is opened in scan mode, in which case the
    /// caller downgrades this to a warning and continues on the active FAT.
    #[error("FAT copies {a} and {b} diverge")]
    FatCopiesDiverged { a: u8, b: u8 },

    /// `Fat::walk` exceeded the maximum possible chain length without
    /// reaching an end-of-chain marker.
    #[error("cluster chain starting at {0} contains a cycle")]
    CycleDetected(u32),

    /// Not enough free clusters to satisfy an allocation.
    #[error("not enough free clusters (required {required}, found {found})")]
    NoSpace { required: usize, found: usize },

    /// A multi-FAT-copy write did not complete for every copy. The volume
    /// must be assumed damaged: some copies now disagree.
    #[error("FAT write did not complete across all copies; volume may be damaged")]
    FatWriteIncomplete,

    /// A path did not resolve to any directory entry.
    #[error("not found: {0}")]
    NotFound(String),

    /// A path that was expected to name a directory named something else.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A path that was expected to name a regular file named a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// A user-supplied name contained a character FAT32 short/long names
    /// cannot carry (`< > : " / \ | ? *`, control bytes, or — for short
    /// names — a codepoint outside the cp866 table).
    #[error("invalid character {0:?} in name")]
    InvalidName(char),

    /// Short-name collision resolution ran out of `~1`..`~9` suffixes.
    #[error("could not generate a unique short name (exhausted ~1..~9)")]
    ShortNameExhausted,

    /// Directory nesting exceeded `VolumeOptions::max_directory_depth`
    /// while decoding, most likely because a corrupt or adversarial image
    /// links a subdirectory's first cluster back to one of its own
    /// ancestors.
    #[error("directory nesting exceeds the configured maximum depth ({0})")]
    MaxDepthExceeded(u32),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Error::InvalidImage { reason: reason.into() }
    }

    /// True if this is (or wraps) a permission-denied condition, per the
    /// `PermissionDenied` class in the error taxonomy. Kept as a predicate
    /// rather than a distinct enum variant so the single `io::Error` source
    /// of truth (`ErrorKind`) doesn't get duplicated into two variants that
    /// could drift apart.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::PermissionDenied)
    }

    /// Render an unexpected magic/signature value the way the teacher's
    /// `BootSectorInitError::BadMagic(AsciiStr<..>)` did, for use inside
    /// `InvalidImage` reason strings.
    pub fn describe_bad_signature(label: &str, got: &[u8]) -> String {
        format!("{label}: unexpected signature {}", AsciiStr(got.to_vec()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
