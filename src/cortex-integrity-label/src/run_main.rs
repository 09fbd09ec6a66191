//! Main entry point for `cortex-make-low-integrity`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::Parser;
use clap::error::ErrorKind;
use tracing::{debug, warn};

use crate::{IntegrityLabelError, apply_low_integrity_label, read_label_sddl};

/// Exit code when the label was applied.
const SUCCESS_EXIT_CODE: i32 = 0;

/// Exit code for a wrong argument count. No OS call is made.
const USAGE_EXIT_CODE: i32 = 1;

/// Exit code when the OS rejected the label change.
const APPLY_FAILED_EXIT_CODE: i32 = 2;

/// Flags still honored when they are the only argument.
const STANDALONE_FLAGS: &[&str] = &["-h", "--help", "-V", "--version"];

/// Command line arguments for the labeling binary.
#[derive(Debug, Parser)]
#[command(
    name = "cortex-make-low-integrity",
    version,
    about = "Utility to make filesystem paths writable from low-integrity processes."
)]
pub struct LabelArgs {
    /// Log each security API call to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// File or directory to label.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

impl LabelArgs {
    fn log_filter(&self) -> &'static str {
        if self.verbose {
            "cortex_integrity_label=debug"
        } else {
            "warn"
        }
    }
}

/// Main entry point.
pub fn run_main() -> ! {
    let exit_code = run(std::env::args_os());
    std::process::exit(exit_code)
}

fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args = match LabelArgs::try_parse_from(single_path_args(args)) {
        Ok(args) => args,
        Err(e) => return report_usage_error(&e),
    };

    init_logging(args.log_filter());

    println!("Making path low-integrity: {}", args.path.display());

    match apply_low_integrity_label(&args.path) {
        Ok(()) => {
            log_applied_label(&args.path);
            println!("Success.");
            SUCCESS_EXIT_CODE
        }
        Err(e) => {
            eprintln!("ERROR: {}", failure_message(&e));
            APPLY_FAILED_EXIT_CODE
        }
    }
}

/// Treat a lone argument as the target path even when it starts with `-`.
fn single_path_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if let [_, only] = args.as_slice() {
        let is_flag_like = only.as_encoded_bytes().starts_with(b"-")
            && only != "--"
            && !STANDALONE_FLAGS.iter().any(|flag| only == flag);
        if is_flag_like {
            args.insert(1, OsString::from("--"));
        }
    }
    args
}

/// Print clap's output and map it to an exit code.
fn report_usage_error(err: &clap::Error) -> i32 {
    let rendered = err.render();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{rendered}");
            SUCCESS_EXIT_CODE
        }
        _ => {
            eprint!("{rendered}");
            USAGE_EXIT_CODE
        }
    }
}

fn init_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn log_applied_label(path: &Path) {
    match read_label_sddl(path) {
        Ok(sddl) => debug!("Label of {} is now {}", path.display(), sddl),
        Err(e) => warn!("Could not read back label of {}: {}", path.display(), e),
    }
}

/// `<os message> (<code>)` for OS failures, the error text otherwise.
fn failure_message(err: &IntegrityLabelError) -> String {
    match (err.os_message(), err.os_code()) {
        (Some(message), Some(code)) => format!("{message} ({code})"),
        _ => err.to_string(),
    }
}
