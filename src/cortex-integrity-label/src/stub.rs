//! Stub implementation for non-Windows platforms.
//!
//! Mandatory integrity labels only exist on Windows. These functions keep the
//! public API identical elsewhere and always report that labeling is not
//! available.

use crate::{IntegrityLabelError, Result};
use std::path::Path;

/// Apply a low integrity label (always fails on non-Windows).
pub fn apply_low_integrity_label(_path: &Path) -> Result<()> {
    Err(IntegrityLabelError::NotAvailable)
}

/// Read the mandatory label (always fails on non-Windows).
pub fn read_label_sddl(_path: &Path) -> Result<String> {
    Err(IntegrityLabelError::NotAvailable)
}

/// Read owner, group and DACL (always fails on non-Windows).
pub fn read_access_sddl(_path: &Path) -> Result<String> {
    Err(IntegrityLabelError::NotAvailable)
}
