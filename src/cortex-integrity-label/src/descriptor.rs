//! Owning wrapper around OS-allocated security descriptors.
//!
//! Descriptors returned by `ConvertStringSecurityDescriptorToSecurityDescriptorW`
//! and `GetNamedSecurityInfoW` are allocated with `LocalAlloc` and must be
//! released with `LocalFree`. [`LocalSecurityDescriptor`] does that on drop,
//! on every exit path.

use std::ptr;

use tracing::{trace, warn};
use windows::Win32::Foundation::{BOOL, HLOCAL, LocalFree};
use windows::Win32::Security::Authorization::{
    ConvertSecurityDescriptorToStringSecurityDescriptorW,
    ConvertStringSecurityDescriptorToSecurityDescriptorW, SDDL_REVISION_1,
};
use windows::Win32::Security::{
    ACL, GetSecurityDescriptorSacl, OBJECT_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR,
};
use windows::core::{PCWSTR, PWSTR};

/// A security descriptor owned by this process and freed with `LocalFree`.
pub(crate) struct LocalSecurityDescriptor {
    raw: PSECURITY_DESCRIPTOR,
}

impl LocalSecurityDescriptor {
    /// Take ownership of a descriptor allocated by the OS.
    ///
    /// # Safety
    ///
    /// `raw` must come from an API documented to return `LocalAlloc` memory,
    /// and nothing else may free it.
    pub(crate) unsafe fn from_raw(raw: PSECURITY_DESCRIPTOR) -> Self {
        Self { raw }
    }

    /// Build a self-relative descriptor from SDDL text.
    pub(crate) fn from_sddl(sddl: &str) -> windows::core::Result<Self> {
        let wide = to_wide(sddl);
        let mut raw = PSECURITY_DESCRIPTOR::default();

        unsafe {
            ConvertStringSecurityDescriptorToSecurityDescriptorW(
                PCWSTR::from_raw(wide.as_ptr()),
                SDDL_REVISION_1,
                &mut raw,
                None,
            )?;
        }

        trace!("Built security descriptor from SDDL {}", sddl);
        Ok(Self { raw })
    }

    /// Borrow the SACL stored inside this descriptor.
    ///
    /// Returns `None` when the descriptor has no SACL or a null one.
    pub(crate) fn sacl(&self) -> windows::core::Result<Option<&ACL>> {
        let mut present = BOOL::default();
        let mut defaulted = BOOL::default();
        let mut sacl: *mut ACL = ptr::null_mut();

        unsafe {
            GetSecurityDescriptorSacl(self.raw, &mut present, &mut sacl, &mut defaulted)?;
        }

        trace!(
            present = present.as_bool(),
            defaulted = defaulted.as_bool(),
            "Extracted SACL"
        );

        if !present.as_bool() {
            return Ok(None);
        }

        // SAFETY: the SACL points into this descriptor's allocation, which
        // outlives the returned borrow.
        Ok(unsafe { sacl.as_ref() })
    }

    /// Render the requested parts of this descriptor as SDDL.
    pub(crate) fn to_sddl(
        &self,
        info: OBJECT_SECURITY_INFORMATION,
    ) -> windows::core::Result<String> {
        let mut text = PWSTR::null();

        unsafe {
            ConvertSecurityDescriptorToStringSecurityDescriptorW(
                self.raw,
                SDDL_REVISION_1,
                info,
                &mut text,
                None,
            )?;
        }

        let rendered = unsafe { String::from_utf16_lossy(text.as_wide()) };
        unsafe {
            let _ = LocalFree(HLOCAL(text.0.cast()));
        }

        Ok(rendered)
    }
}

impl Drop for LocalSecurityDescriptor {
    fn drop(&mut self) {
        if self.raw.0.is_null() {
            return;
        }

        let leaked = unsafe { LocalFree(HLOCAL(self.raw.0)) };
        if !leaked.0.is_null() {
            warn!("Failed to free security descriptor");
        }
    }
}

/// Encode a string as NUL-terminated UTF-16.
pub(crate) fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}
