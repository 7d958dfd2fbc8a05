use std::{
    fmt,
    path::{Path, PathBuf},
};

pub use sadness_generator::SadnessFlavor;

/// The fault the crash client raises
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum Flavor {
    Panic,
    ErrorPayload,
    Unwrap,
    OutOfBounds,
    DivideByZero,
    OpaquePayload,
}

impl From<Flavor> for SadnessFlavor {
    fn from(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Panic => Self::Panic,
            Flavor::ErrorPayload => Self::ErrorPayload,
            Flavor::Unwrap => Self::Unwrap,
            Flavor::OutOfBounds => Self::OutOfBounds,
            Flavor::DivideByZero => Self::DivideByZero,
            Flavor::OpaquePayload => Self::OpaquePayload,
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&SadnessFlavor::from(*self), f)
    }
}

/// The name of the file the crash client's remote reporter writes the fault
/// message to, relative to the storage root
pub const REPORT_FILE: &str = "reported.txt";

/// The message of the panic raised on the main thread while the first fault
/// is still being handled
pub const SECOND_FAULT: &str = "faulted again";

/// The grace window the tests run the crash client with, in milliseconds
pub const TEST_GRACE_MS: u64 = 500;

#[derive(Clone, Copy)]
pub struct ClientOptions {
    pub flavor: Flavor,
    /// Raises the fault on a separate thread rather than the main thread
    pub use_thread: bool,
    /// Configures a remote reporter
    pub report: bool,
    /// Pretends the storage medium is not mounted
    pub unmounted: bool,
    /// Raises the fault on a separate thread, and then panics on the main
    /// thread while the first fault is being handled
    pub second_fault: bool,
}

impl ClientOptions {
    pub fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            use_thread: false,
            report: false,
            unmounted: false,
            second_fault: false,
        }
    }
}

/// The aftermath of a crashed client
pub struct Crash {
    pub storage_root: PathBuf,
    pub stdout: String,
    pub stderr: String,
}

impl Crash {
    #[inline]
    pub fn crash_dir(&self) -> PathBuf {
        self.storage_root
            .join(crash_logger::DEFAULT_APP_FOLDER)
            .join(crash_logger::DEFAULT_CRASH_FOLDER)
    }

    pub fn crash_logs(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.crash_dir()) {
            Ok(rd) => rd
                .map(|entry| entry.expect("failed to read dir entry").path())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// The message the remote reporter received, if it was called
    pub fn reported(&self) -> Option<String> {
        std::fs::read_to_string(self.storage_root.join(REPORT_FILE)).ok()
    }
}

#[inline]
fn make_storage_root(id: &str) -> PathBuf {
    std::env::current_dir()
        .expect("unable to get current directory")
        .join(".crashes")
        .join(id)
}

pub fn run_client(id: &str, opts: ClientOptions) -> Crash {
    use std::env;

    let storage_root = make_storage_root(id);
    if storage_root.exists() {
        if let Err(e) = std::fs::remove_dir_all(&storage_root) {
            panic!(
                "failed to remove existing storage root {}: {}",
                storage_root.display(),
                e
            );
        }
    }
    std::fs::create_dir_all(&storage_root).expect("failed to create storage root");

    // Adapted from
    // https://github.com/rust-lang/cargo/blob/485670b3983b52289a2f353d589c57fae2f60f82/tests/testsuite/support/mod.rs#L507
    let mut cmd_path = env::current_exe().expect("failed to get exe path");
    cmd_path.pop();
    if cmd_path.ends_with("deps") {
        cmd_path.pop();
    }

    cmd_path.push("crash-client");
    if !env::consts::EXE_SUFFIX.is_empty() {
        cmd_path.set_extension(env::consts::EXE_SUFFIX);
    }

    let grace_ms = TEST_GRACE_MS.to_string();

    let mut cmd = std::process::Command::new(&cmd_path);
    cmd.stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());
    cmd.arg("--flavor")
        .arg(opts.flavor.to_string())
        .arg("--storage-root")
        .arg(&storage_root)
        .args(["--grace-ms", &grace_ms]);
    if opts.use_thread {
        cmd.arg("--use-thread");
    }
    if opts.report {
        cmd.arg("--report");
    }
    if opts.unmounted {
        cmd.arg("--unmounted");
    }
    if opts.second_fault {
        cmd.arg("--second-fault");
    }

    let child = cmd.spawn().expect("failed to run crash-client");
    let output = child.wait_with_output().expect("failed to wait for output");

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    println!("{}", stdout);
    eprintln!("{}", stderr);

    // Ensure it was killed and did not exit properly
    assert_eq!(output.status.code(), None, "{stderr}");

    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            use std::os::unix::process::ExitStatusExt;
            // SIGKILL
            assert_eq!(output.status.signal(), Some(9));
        }
    }

    Crash {
        storage_root,
        stdout,
        stderr,
    }
}

#[inline]
pub fn capture_output() {
    static SUB: std::sync::Once = std::sync::Once::new();

    SUB.call_once(|| {
        tracing_subscriber::fmt().with_test_writer().init();
    });
}

/// Asserts the crash log is well formed and describes the flavor's fault,
/// returning its contents
pub fn assert_crash_log(path: &Path, flavor: Flavor) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .expect("crash log name is not utf-8");
    let stem = name
        .strip_suffix(".log")
        .expect("crash log has no .log extension");
    assert_eq!(stem.len(), 12, "{name}");
    assert!(stem.chars().all(|c| c.is_ascii_digit()), "{name}");

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            panic!("failed to read crash log from {}: {}", path.display(), e);
        }
    };

    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some("------------Crash Environment Info------------")
    );
    for label in [
        "Manufacturer",
        "DeviceName",
        "SystemVersion",
        "DeviceId",
        "AppVersion",
    ] {
        let line = lines.next().expect("header is truncated");
        assert!(
            line.starts_with(&format!("------------{label}: ")) && line.ends_with("------------"),
            "{line}"
        );
    }
    assert_eq!(
        lines.next(),
        Some("------------Crash Environment Info------------")
    );
    assert_eq!(lines.next(), Some(""));

    let sadness = SadnessFlavor::from(flavor);
    assert!(contents.contains(&format!(
        "------------AppVersion: {}------------",
        env!("CARGO_PKG_VERSION")
    )));
    assert!(contents.contains(" panicked at "));
    assert!(contents.contains(&format!("\n{}\n", sadness.message())));
    for cause in sadness.causes() {
        assert!(contents.contains(cause), "missing cause '{cause}'");
    }
    assert!(contents.contains("stack backtrace:"));

    contents
}

/// Crashes a client and returns the contents of the single crash log it wrote
pub fn run_test(flavor: Flavor, counter: u32, use_thread: bool) -> String {
    capture_output();

    let id = format!(
        "{}-{}-{}",
        flavor,
        counter,
        if use_thread { "threaded" } else { "simple" }
    );

    let mut opts = ClientOptions::new(flavor);
    opts.use_thread = use_thread;

    let crash = run_client(&id, opts);
    assert!(crash.reported().is_none());

    let logs = crash.crash_logs();
    assert_eq!(logs.len(), 1, "expected 1 crash log for {id}");
    assert_crash_log(&logs[0], flavor)
}

pub fn run_threaded_test(flavor: Flavor, count: u32) {
    use rayon::prelude::*;

    (0..count).into_par_iter().for_each(|i| {
        let contents = run_test(flavor, i, true);
        assert!(contents.contains("thread 'sad-thread' panicked at "));
    });
}
