//! Mandatory integrity labels on filesystem paths.
//!
//! A Low integrity process may only write to objects whose label is Low.
//! Files without an explicit label are treated as Medium, so anything a
//! sandboxed child must write into has to be relabeled first.

use std::os::windows::ffi::OsStrExt;
use std::path::Path;

use tracing::{debug, error, info};
use windows::Win32::Foundation::{ERROR_SUCCESS, WIN32_ERROR};
use windows::Win32::Security::Authorization::{
    GetNamedSecurityInfoW, SE_FILE_OBJECT, SetNamedSecurityInfoW,
};
use windows::Win32::Security::{
    DACL_SECURITY_INFORMATION, GROUP_SECURITY_INFORMATION, LABEL_SECURITY_INFORMATION,
    OBJECT_SECURITY_INFORMATION, OWNER_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR, PSID,
};
use windows::core::PCWSTR;

use crate::descriptor::LocalSecurityDescriptor;
use crate::{IntegrityLabelError, LOW_INTEGRITY_SDDL, OsErrorCode, Result};

/// Make `path` writable from Low integrity processes.
///
/// Replaces the mandatory label of `path` with Low/no-write-up. Owner, group
/// and DACL are not touched. Applying the label again is a no-op replacement
/// and succeeds.
///
/// # Panics
///
/// Panics if the OS cannot build a descriptor from [`LOW_INTEGRITY_SDDL`].
/// The string is constant, so that only happens with a broken security
/// subsystem.
pub fn apply_low_integrity_label(path: &Path) -> Result<()> {
    let wide_path = path_to_wide(path)?;

    let descriptor = LocalSecurityDescriptor::from_sddl(LOW_INTEGRITY_SDDL).unwrap_or_else(|e| {
        invariant_violation("ConvertStringSecurityDescriptorToSecurityDescriptorW", e)
    });
    let sacl = match descriptor.sacl() {
        Ok(Some(sacl)) => sacl,
        Ok(None) => invariant_violation("GetSecurityDescriptorSacl", "SACL not present"),
        Err(e) => invariant_violation("GetSecurityDescriptorSacl", e),
    };

    debug!("Applying low integrity label to {}", path.display());

    let status = unsafe {
        SetNamedSecurityInfoW(
            PCWSTR::from_raw(wide_path.as_ptr()),
            SE_FILE_OBJECT,
            LABEL_SECURITY_INFORMATION,
            PSID::default(),
            PSID::default(),
            None,
            Some(sacl as *const _),
        )
    };
    drop(descriptor);

    if status != ERROR_SUCCESS {
        let (code, message) = describe_status(status);
        debug!(
            "SetNamedSecurityInfoW failed for {}: {} ({})",
            path.display(),
            message,
            code
        );
        return Err(IntegrityLabelError::ApplyFailed {
            path: path.to_path_buf(),
            code,
            message,
        });
    }

    info!("Applied low integrity label to {}", path.display());
    Ok(())
}

/// Read the mandatory label of `path` as SDDL, e.g. `S:(ML;;NW;;;LW)`.
///
/// Objects without an explicit label render as an empty SACL (`S:`).
pub fn read_label_sddl(path: &Path) -> Result<String> {
    query_sddl(path, LABEL_SECURITY_INFORMATION)
}

/// Read the owner, group and DACL of `path` as SDDL.
pub fn read_access_sddl(path: &Path) -> Result<String> {
    query_sddl(
        path,
        OWNER_SECURITY_INFORMATION | GROUP_SECURITY_INFORMATION | DACL_SECURITY_INFORMATION,
    )
}

fn query_sddl(path: &Path, info: OBJECT_SECURITY_INFORMATION) -> Result<String> {
    let wide_path = path_to_wide(path)?;
    let mut raw = PSECURITY_DESCRIPTOR::default();

    let status = unsafe {
        GetNamedSecurityInfoW(
            PCWSTR::from_raw(wide_path.as_ptr()),
            SE_FILE_OBJECT,
            info,
            None,
            None,
            None,
            None,
            &mut raw,
        )
    };

    if status != ERROR_SUCCESS {
        let (code, message) = describe_status(status);
        return Err(IntegrityLabelError::QueryFailed {
            path: path.to_path_buf(),
            code,
            message,
        });
    }

    // SAFETY: GetNamedSecurityInfoW hands back LocalAlloc memory owned by us.
    let descriptor = unsafe { LocalSecurityDescriptor::from_raw(raw) };
    descriptor
        .to_sddl(info)
        .map_err(|e| IntegrityLabelError::QueryFailed {
            path: path.to_path_buf(),
            code: error_code(&e),
            message: e.message().to_string(),
        })
}

/// Encode `path` as NUL-terminated UTF-16 for the named-object API.
fn path_to_wide(path: &Path) -> Result<Vec<u16>> {
    let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
    if wide.contains(&0) {
        return Err(IntegrityLabelError::InvalidPath {
            path: path.to_path_buf(),
        });
    }
    wide.push(0);
    Ok(wide)
}

/// Split a Win32 status into its code and the system message text.
fn describe_status(status: WIN32_ERROR) -> (OsErrorCode, String) {
    let message = windows::core::Error::from(status.to_hresult()).message();
    (OsErrorCode(status.0), message.to_string().trim_end().to_string())
}

/// The Win32 code behind `err`, or the whole HRESULT when it has none.
fn error_code(err: &windows::core::Error) -> OsErrorCode {
    match WIN32_ERROR::from_error(err) {
        Some(status) => OsErrorCode(status.0),
        None => OsErrorCode(err.code().0 as u32),
    }
}

/// Abort on a failure of the security subsystem itself.
fn invariant_violation(operation: &str, cause: impl std::fmt::Display) -> ! {
    error!("{} failed on the constant low integrity SDDL: {}", operation, cause);
    panic!("{operation} failed on the constant low integrity SDDL: {cause}");
}
