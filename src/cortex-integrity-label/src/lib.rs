//! Low integrity labeling for the Cortex Windows sandbox.
//!
//! Processes launched at Low integrity may not write to objects carrying the
//! implicit Medium label. This crate attaches a mandatory-label ACE
//! (`Low`, no-write-up) to a filesystem path so those processes are admitted:
//! - [`apply_low_integrity_label`] writes the label
//! - [`read_label_sddl`] and [`read_access_sddl`] read security state back as SDDL
//!
//! Only the label portion of the target's security descriptor is ever
//! replaced. Owner, group and DACL are left untouched.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[cfg(windows)]
mod descriptor;
#[cfg(windows)]
pub mod label;
mod run_main;

#[cfg(not(windows))]
pub mod stub;

#[cfg(windows)]
pub use label::{apply_low_integrity_label, read_access_sddl, read_label_sddl};

#[cfg(not(windows))]
pub use stub::*;

/// SDDL for a SACL holding one mandatory-label ACE: no ACE flags,
/// no-write-up, principal = Low mandatory level.
///
/// Never build this from input; it is the only descriptor this crate writes.
pub const LOW_INTEGRITY_SDDL: &str = "S:(ML;;NW;;;LW)";

/// The ACE part of [`LOW_INTEGRITY_SDDL`], as it appears in a rendered SACL.
const LOW_INTEGRITY_ACE: &str = "(ML;;NW;;;LW)";

/// Raw Win32 status code returned by the object-security API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsErrorCode(pub u32);

impl OsErrorCode {
    /// `ERROR_FILE_NOT_FOUND`
    pub const FILE_NOT_FOUND: Self = Self(2);
    /// `ERROR_PATH_NOT_FOUND`
    pub const PATH_NOT_FOUND: Self = Self(3);
    /// `ERROR_ACCESS_DENIED`
    pub const ACCESS_DENIED: Self = Self(5);

    /// The raw numeric status.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Whether the target (or one of its parent directories) does not exist.
    pub fn is_not_found(self) -> bool {
        self == Self::FILE_NOT_FOUND || self == Self::PATH_NOT_FOUND
    }

    /// Whether the caller lacks the rights to change the label.
    pub fn is_access_denied(self) -> bool {
        self == Self::ACCESS_DENIED
    }
}

impl fmt::Display for OsErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while labeling a path.
#[derive(Error, Debug)]
pub enum IntegrityLabelError {
    /// Integrity labels are not available on this platform.
    #[error("Integrity labels not available on this platform")]
    NotAvailable,

    /// The path cannot be passed to the OS.
    #[error("Invalid path {}: contains an interior NUL character", path.display())]
    InvalidPath { path: PathBuf },

    /// The OS rejected the label change.
    #[error("Failed to apply low integrity label to {}: {message} ({code})", path.display())]
    ApplyFailed {
        path: PathBuf,
        code: OsErrorCode,
        message: String,
    },

    /// The OS refused to return the target's security descriptor.
    #[error("Failed to read security descriptor of {}: {message} ({code})", path.display())]
    QueryFailed {
        path: PathBuf,
        code: OsErrorCode,
        message: String,
    },
}

impl IntegrityLabelError {
    /// The OS status code, when the failure came from the OS.
    pub fn os_code(&self) -> Option<OsErrorCode> {
        match self {
            Self::ApplyFailed { code, .. } | Self::QueryFailed { code, .. } => Some(*code),
            Self::NotAvailable | Self::InvalidPath { .. } => None,
        }
    }

    /// The OS-supplied message text, when the failure came from the OS.
    pub fn os_message(&self) -> Option<&str> {
        match self {
            Self::ApplyFailed { message, .. } | Self::QueryFailed { message, .. } => {
                Some(message)
            }
            Self::NotAvailable | Self::InvalidPath { .. } => None,
        }
    }
}

/// Result type for integrity label operations.
pub type Result<T> = std::result::Result<T, IntegrityLabelError>;

/// Check whether a rendered SACL carries the Low, no-write-up label.
pub fn has_low_integrity_label(sddl: &str) -> bool {
    sddl.starts_with("S:") && sddl.contains(LOW_INTEGRITY_ACE)
}

/// Check if integrity labels can be applied on this system.
pub fn is_available() -> bool {
    cfg!(windows)
}

/// Get a description of the labeling capabilities.
pub fn capabilities_description() -> &'static str {
    #[cfg(windows)]
    {
        "Windows: mandatory integrity labels (Low, no-write-up)"
    }
    #[cfg(not(windows))]
    {
        "Integrity labels not available (not running on Windows)"
    }
}

/// Run the `cortex-make-low-integrity` command line and exit.
pub fn run_main() -> ! {
    run_main::run_main()
}
