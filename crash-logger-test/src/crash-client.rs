use clap::Parser;
use crash_logger::{
    Config, CrashDir, CrashHandler, FaultInterceptor, HostDeviceInfo, make_remote_report,
};
use crash_logger_test::{Flavor, REPORT_FILE, SECOND_FAULT, SadnessFlavor};
use std::{path::PathBuf, sync::Arc, time::Duration};

#[derive(Parser)]
struct Command {
    /// The fault to raise
    #[clap(long, value_enum)]
    flavor: Flavor,
    /// The mount point of the storage the crash log is written to
    #[clap(long)]
    storage_root: PathBuf,
    /// Raises the fault on a separate thread rather than the main thread
    #[clap(long)]
    use_thread: bool,
    /// Configures a remote reporter that writes the fault message to a file
    /// in the storage root
    #[clap(long)]
    report: bool,
    /// Pretends the storage is not mounted
    #[clap(long)]
    unmounted: bool,
    /// Raises the fault on a separate thread, then panics on the main thread
    /// while the first fault is being handled
    #[clap(long)]
    second_fault: bool,
    /// The grace window in milliseconds
    #[clap(long, default_value_t = 3000)]
    grace_ms: u64,
}

fn real_main() -> anyhow::Result<()> {
    let cmd = Command::parse();

    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    println!("pid: {}", std::process::id());

    let mut config = Config::new(CrashDir::nested(&cmd.storage_root, "", ""))
        .device_info(HostDeviceInfo::new(env!("CARGO_PKG_VERSION")))
        .grace_window(Duration::from_millis(cmd.grace_ms));

    if cmd.unmounted {
        config = config.storage_probe(|| false);
    }

    if cmd.report {
        let report_path = cmd.storage_root.join(REPORT_FILE);
        config = config.remote_report(make_remote_report(move |fault| {
            std::fs::write(&report_path, fault.message())?;
            Ok(())
        }));
    }

    let interceptor = Arc::new(FaultInterceptor::new(config));
    let _handler = CrashHandler::attach(interceptor)?;

    let flavor = SadnessFlavor::from(cmd.flavor);

    let mut threads = Vec::new();

    for _ in 0..4 {
        threads.push(std::thread::spawn(move || {
            std::thread::sleep(Duration::MAX);
        }));
    }

    if cmd.second_fault {
        std::thread::Builder::new()
            .name("sad-thread".to_owned())
            .spawn(move || sad(flavor))?;

        std::thread::sleep(Duration::from_millis(cmd.grace_ms / 5));
        panic!("{SECOND_FAULT}");
    } else if cmd.use_thread {
        let _ = std::thread::Builder::new()
            .name("sad-thread".to_owned())
            .spawn(move || sad(flavor))?
            .join();
    } else {
        flavor.make_sad();
    }

    anyhow::bail!("we should have faulted and been killed");
}

#[inline(never)]
fn sad(flavor: SadnessFlavor) {
    flavor.make_sad()
}

fn main() {
    // We want this program to crash and write a crash log, it _shouldn't_
    // have errors that prevent that from happening, so emit an error code if
    // we do encounter an error so that we can fail the test
    if let Err(e) = real_main() {
        eprintln!("error: {:#}", e);

        // When killed, there is no exit code at all, at least on unixes
        #[allow(clippy::exit)]
        std::process::exit(222);
    }
}
