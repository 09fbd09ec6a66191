//! Low integrity labeling binary.
//!
//! Makes one filesystem path writable from Low integrity processes.
//!
//! Usage:
//!   cortex-make-low-integrity <PATH>

fn main() -> ! {
    cortex_integrity_label::run_main()
}
