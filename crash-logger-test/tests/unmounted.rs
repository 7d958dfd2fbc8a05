//! When the storage is not mounted nothing is written, but the user is still
//! notified and the process is still killed

use crash_logger_test::*;

#[test]
fn unmounted_storage() {
    capture_output();

    let mut opts = ClientOptions::new(Flavor::Panic);
    opts.unmounted = true;

    let crash = run_client("unmounted", opts);

    assert!(crash.crash_logs().is_empty());
    assert!(!crash.crash_dir().exists());
    assert!(crash.stderr.contains(crash_logger::DEFAULT_NOTICE));
    assert!(crash.stderr.contains("\nboom\n"));
}
