//! Integration tests for labeling real filesystem objects.
//!
//! Changing an object's mandatory label needs `WRITE_OWNER`, which the
//! default DACL of a fresh temp directory grants its creator, so these run
//! against temp directories without extra privileges.

#![cfg(windows)]

use std::fs;
use std::iter;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use cortex_integrity_label::{
    IntegrityLabelError, apply_low_integrity_label, has_low_integrity_label, read_access_sddl,
    read_label_sddl,
};
use pretty_assertions::assert_eq;
use windows::Win32::Foundation::{BOOL, ERROR_SUCCESS, HLOCAL, LocalFree, WIN32_ERROR};
use windows::Win32::Security::Authorization::{
    ConvertStringSecurityDescriptorToSecurityDescriptorW, SDDL_REVISION_1, SE_FILE_OBJECT,
    SetNamedSecurityInfoW,
};
use windows::Win32::Security::{
    ACL, DACL_SECURITY_INFORMATION, GetSecurityDescriptorDacl,
    PROTECTED_DACL_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR, PSID,
};
use windows::core::PCWSTR;

/// Everyone may read, nobody holds `WRITE_OWNER`.
const READ_ONLY_DACL: &str = "D:P(A;;FR;;;WD)";

/// Everyone has full control, so the temp dir can be removed again.
const FULL_ACCESS_DACL: &str = "D:P(A;;FA;;;WD)";

/// Replace the DACL of `path` with the protected DACL in `sddl`.
///
/// The owner keeps `WRITE_DAC` implicitly, so this works even after a
/// read-only DACL has been applied.
fn set_protected_dacl(path: &Path, sddl: &str) -> WIN32_ERROR {
    let wide_sddl: Vec<u16> = sddl.encode_utf16().chain(iter::once(0)).collect();
    let wide_path: Vec<u16> = path.as_os_str().encode_wide().chain(iter::once(0)).collect();
    let mut descriptor = PSECURITY_DESCRIPTOR::default();
    let mut present = BOOL::default();
    let mut defaulted = BOOL::default();
    let mut dacl: *mut ACL = ptr::null_mut();

    unsafe {
        ConvertStringSecurityDescriptorToSecurityDescriptorW(
            PCWSTR::from_raw(wide_sddl.as_ptr()),
            SDDL_REVISION_1,
            &mut descriptor,
            None,
        )
        .expect("DACL SDDL should parse");
        GetSecurityDescriptorDacl(descriptor, &mut present, &mut dacl, &mut defaulted)
            .expect("DACL should be extractable");

        let status = SetNamedSecurityInfoW(
            PCWSTR::from_raw(wide_path.as_ptr()),
            SE_FILE_OBJECT,
            DACL_SECURITY_INFORMATION | PROTECTED_DACL_SECURITY_INFORMATION,
            PSID::default(),
            PSID::default(),
            Some(dacl as *const ACL),
            None,
        );
        let _ = LocalFree(HLOCAL(descriptor.0));
        status
    }
}

/// Gives full access back on drop so the temp dir can be cleaned up.
struct RestoreFullAccess<'a>(&'a Path);

impl Drop for RestoreFullAccess<'_> {
    fn drop(&mut self) {
        let _ = set_protected_dacl(self.0, FULL_ACCESS_DACL);
    }
}

#[test]
fn test_fresh_directory_has_no_low_label() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let label = read_label_sddl(dir.path()).expect("read label");
    assert!(!has_low_integrity_label(&label), "unexpected label {label}");
}

#[test]
fn test_apply_labels_directory() {
    let dir = tempfile::tempdir().expect("create temp dir");

    apply_low_integrity_label(dir.path()).expect("apply label");

    let label = read_label_sddl(dir.path()).expect("read label");
    assert!(has_low_integrity_label(&label), "got {label}");
}

#[test]
fn test_apply_labels_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let file = dir.path().join("output.log");
    fs::write(&file, b"sandbox").expect("create file");

    apply_low_integrity_label(&file).expect("apply label");

    let label = read_label_sddl(&file).expect("read label");
    assert!(has_low_integrity_label(&label), "got {label}");
    assert_eq!(fs::read(&file).expect("read file"), b"sandbox");
}

#[test]
fn test_apply_is_idempotent() {
    let dir = tempfile::tempdir().expect("create temp dir");

    apply_low_integrity_label(dir.path()).expect("first apply");
    let first = read_label_sddl(dir.path()).expect("read label");

    apply_low_integrity_label(dir.path()).expect("second apply");
    let second = read_label_sddl(dir.path()).expect("read label");

    assert_eq!(first, second);
}

#[test]
fn test_apply_keeps_owner_group_and_dacl() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let before = read_access_sddl(dir.path()).expect("read access before");

    apply_low_integrity_label(dir.path()).expect("apply label");

    let after = read_access_sddl(dir.path()).expect("read access after");
    assert_eq!(before, after);
}

#[test]
fn test_apply_without_write_owner_is_access_denied() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).expect("create locked dir");

    assert_eq!(set_protected_dacl(&locked, READ_ONLY_DACL), ERROR_SUCCESS);
    let _restore = RestoreFullAccess(&locked);

    let access_before = read_access_sddl(&locked).expect("read access before");
    let label_before = read_label_sddl(&locked).expect("read label before");

    let err = apply_low_integrity_label(&locked).unwrap_err();

    assert!(matches!(err, IntegrityLabelError::ApplyFailed { .. }));
    assert!(
        err.os_code().is_some_and(|code| code.is_access_denied()),
        "unexpected error: {err}"
    );
    assert_eq!(read_access_sddl(&locked).expect("read access after"), access_before);
    assert_eq!(read_label_sddl(&locked).expect("read label after"), label_before);
}

#[test]
fn test_missing_path_is_not_found() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let missing = dir.path().join("missing");

    let err = apply_low_integrity_label(&missing).unwrap_err();

    let code = err.os_code().expect("OS failure should carry a code");
    assert!(code.is_not_found(), "unexpected code {code}");
    assert!(matches!(err, IntegrityLabelError::ApplyFailed { .. }));
    assert!(!missing.exists());
}

#[test]
fn test_missing_parent_is_not_found() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let missing = dir.path().join("no").join("such").join("dir");

    let err = apply_low_integrity_label(&missing).unwrap_err();
    assert!(err.os_code().is_some_and(|code| code.is_not_found()));
}

#[test]
fn test_read_missing_path_is_query_failure() {
    let err = read_label_sddl(Path::new(r"C:\cortex-integrity-label\missing")).unwrap_err();
    assert!(matches!(err, IntegrityLabelError::QueryFailed { .. }));
    assert!(err.os_code().is_some_and(|code| code.is_not_found()));
}
