use crate::{
    config::Config,
    fault::{Fault, FaultRecord, ThreadInfo},
    notify::{self, Notifier},
    recorder::CrashRecorder,
    report::RemoteReport,
    terminate::Terminator,
};
use parking_lot::RwLock;
use std::{
    cell::Cell,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

/// The name of the threads the crash log is written and the fault reported on
pub const STEP_THREAD_NAME: &str = "crash-step";

thread_local! {
    static STEP_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running a single step of fault handling
pub(crate) fn enter_step_thread() {
    STEP_THREAD.set(true);
}

/// Whether the current thread runs a single step of fault handling, a panic
/// on such a thread must be allowed to unwind so the step can be abandoned
#[inline]
pub(crate) fn on_step_thread() -> bool {
    STEP_THREAD.get()
}

/// Runs the step on its own thread and waits for it to finish.
///
/// The fault being handled may itself be a panic, in which case a panic raised
/// by the step on the faulting thread would abort the process. On a separate
/// thread it unwinds and is caught like any other.
fn isolate<R, F>(step: F) -> Option<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    let mut step = Some(step);

    let joined = std::thread::scope(|s| {
        std::thread::Builder::new()
            .name(STEP_THREAD_NAME.to_owned())
            .spawn_scoped(s, || {
                enter_step_thread();
                step.take().map(|step| catch_unwind(AssertUnwindSafe(step)))
            })
            .map(|handle| handle.join())
    });

    match joined {
        Ok(Ok(Some(Ok(output)))) => Some(output),
        Ok(_) => {
            log::error!("crash handling step panicked");
            None
        }
        Err(e) => {
            log::error!("unable to spawn {STEP_THREAD_NAME} thread, running in place: {e}");
            step.take()
                .and_then(|step| catch_unwind(AssertUnwindSafe(step)).ok())
        }
    }
}

/// Handles the first unhandled fault of the process.
///
/// The fault is written to stderr and to a crash log, forwarded to the remote
/// reporter if there is one, and a notice is shown to the user before the
/// process is killed. Each of those steps is isolated from the others, a
/// failure in one is logged and the next step runs regardless. Termination
/// always happens.
pub struct FaultInterceptor {
    recorder: CrashRecorder,
    remote_report: RwLock<Option<Arc<dyn RemoteReport>>>,
    remote_report_enabled: bool,
    notifier: Arc<dyn Notifier>,
    notice: String,
    grace_window: Duration,
    terminator: Box<dyn Terminator>,
    handled: AtomicBool,
}

impl FaultInterceptor {
    pub fn new(config: Config) -> Self {
        let mut recorder = CrashRecorder::new(config.crash_dir);
        if let Some(device_info) = config.device_info {
            recorder = recorder.with_device_info(device_info);
        }
        if let Some(probe) = config.storage_probe {
            recorder = recorder.with_storage_probe(probe);
        }

        Self {
            recorder,
            remote_report: RwLock::new(config.remote_report),
            remote_report_enabled: config.remote_report_enabled,
            notifier: config.notifier,
            notice: config.notice,
            grace_window: config.grace_window,
            terminator: config.terminator,
            handled: AtomicBool::new(false),
        }
    }

    /// Sets the reporter faults are forwarded to, replacing any previous one.
    ///
    /// This must be done before a fault can occur, and has no effect if
    /// reporting was disabled in the [`Config`].
    pub fn configure_remote_report(&self, report: Arc<dyn RemoteReport>) {
        *self.remote_report.write() = Some(report);
    }

    #[inline]
    pub fn recorder(&self) -> &CrashRecorder {
        &self.recorder
    }

    /// Handles a fault that occurred on the specified thread, and then
    /// terminates the process.
    ///
    /// Only the first call does anything, a fault raised while another is
    /// being handled, eg. from a second thread, is only logged and `false` is
    /// returned. The crash log is written and the fault reported on a
    /// [`STEP_THREAD_NAME`] thread each.
    pub fn intercept(&self, thread: ThreadInfo, cause: Fault) -> bool {
        if self.handled.swap(true, Ordering::SeqCst) {
            log::warn!("thread '{thread}' faulted while another fault was being handled: {cause}");
            return false;
        }

        let record = FaultRecord::new(thread, cause);

        {
            let mut stderr = std::io::stderr().lock();
            let _ = record.write_trace(&mut stderr);
        }

        isolate(|| self.recorder.persist(&record));
        isolate(|| self.report(&record.cause));

        if let Err(e) = notify::spawn_notice(self.notifier.clone(), self.notice.clone()) {
            log::error!("unable to spawn crash notice thread: {e:#}");
        }

        std::thread::sleep(self.grace_window);

        self.terminator.terminate();
        true
    }

    fn report(&self, fault: &Fault) {
        if !self.remote_report_enabled {
            return;
        }

        // Don't hold the lock while the reporter runs
        let Some(report) = self.remote_report.read().clone() else {
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| report.on_crash(fault))) {
            Ok(Ok(())) => log::debug!("fault forwarded to remote reporter"),
            Ok(Err(e)) => log::error!("remote reporter failed: {e:#}"),
            Err(_) => log::error!("remote reporter panicked"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        CrashDir, DeviceSnapshot, Error, make_remote_report, notify::DEFAULT_NOTICE,
    };
    use parking_lot::Mutex;
    use std::{
        fs,
        path::{Path, PathBuf},
        sync::mpsc,
    };

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum Step {
        Persist,
        Report,
        Terminate,
    }

    #[derive(Clone, Default)]
    struct Steps(Arc<Mutex<Vec<Step>>>);

    impl Steps {
        fn push(&self, step: Step) {
            self.0.lock().push(step);
        }

        fn taken(&self) -> Vec<Step> {
            self.0.lock().clone()
        }

        fn probe(&self, available: bool) -> impl Fn() -> bool + Send + Sync + use<> {
            let steps = self.clone();
            move || {
                steps.push(Step::Persist);
                available
            }
        }

        fn reporter(&self) -> Arc<dyn RemoteReport> {
            let steps = self.clone();
            make_remote_report(move |_fault| {
                steps.push(Step::Report);
                Ok(())
            })
        }
    }

    struct RecordTermination(Steps);

    impl Terminator for RecordTermination {
        fn terminate(&self) {
            self.0.push(Step::Terminate);
        }
    }

    fn config(dir: impl Into<CrashDir>, steps: &Steps) -> Config {
        Config::new(dir)
            .grace_window(Duration::ZERO)
            .notifier(|_: &str| -> Result<(), Error> { Ok(()) })
            .terminator(RecordTermination(steps.clone()))
    }

    fn fault(message: &str) -> Fault {
        Fault::new(message)
    }

    fn log_files(dir: &Path) -> Vec<PathBuf> {
        match fs::read_dir(dir) {
            Ok(rd) => rd.map(|entry| entry.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn reports_after_persisting() {
        let td = tempfile::tempdir().unwrap();
        let steps = Steps::default();

        let interceptor = FaultInterceptor::new(
            config(td.path(), &steps)
                .storage_probe(steps.probe(true))
                .remote_report(steps.reporter()),
        );

        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(steps.taken(), [Step::Persist, Step::Report, Step::Terminate]);
        assert_eq!(log_files(td.path()).len(), 1);
    }

    #[test]
    fn no_reporter() {
        let td = tempfile::tempdir().unwrap();
        let steps = Steps::default();

        let interceptor =
            FaultInterceptor::new(config(td.path(), &steps).storage_probe(steps.probe(true)));
        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(steps.taken(), [Step::Persist, Step::Terminate]);
    }

    #[test]
    fn reporting_disabled() {
        let td = tempfile::tempdir().unwrap();
        let steps = Steps::default();

        let interceptor = FaultInterceptor::new(
            config(td.path(), &steps)
                .storage_probe(steps.probe(true))
                .remote_report(steps.reporter())
                .remote_report_enabled(false),
        );
        interceptor.configure_remote_report(steps.reporter());
        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(steps.taken(), [Step::Persist, Step::Terminate]);
    }

    #[test]
    fn late_bound_reporter() {
        let td = tempfile::tempdir().unwrap();
        let steps = Steps::default();

        let interceptor =
            FaultInterceptor::new(config(td.path(), &steps).storage_probe(steps.probe(true)));
        interceptor.configure_remote_report(steps.reporter());
        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(steps.taken(), [Step::Persist, Step::Report, Step::Terminate]);
    }

    #[test]
    fn reporter_receives_raw_fault() {
        let td = tempfile::tempdir().unwrap();
        let steps = Steps::default();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);

        let interceptor = FaultInterceptor::new(config(td.path(), &steps).remote_report(
            make_remote_report(move |fault| {
                tx.lock().send(fault.message().to_owned())?;
                Ok(())
            }),
        ));
        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), ["boom"]);
    }

    #[test]
    fn steps_run_on_their_own_thread() {
        let td = tempfile::tempdir().unwrap();
        let steps = Steps::default();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);

        let interceptor = FaultInterceptor::new(config(td.path(), &steps).remote_report(
            make_remote_report(move |_fault| {
                let thread = std::thread::current().name().map(str::to_owned);
                tx.lock().send((thread, on_step_thread()))?;
                Ok(())
            }),
        ));
        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            [(Some(STEP_THREAD_NAME.to_owned()), true)]
        );
        assert!(!on_step_thread());
    }

    #[test]
    fn only_first_fault_is_handled() {
        let td = tempfile::tempdir().unwrap();
        let steps = Steps::default();

        let interceptor = FaultInterceptor::new(
            config(td.path(), &steps)
                .storage_probe(steps.probe(true))
                .remote_report(steps.reporter()),
        );

        assert!(interceptor.intercept(ThreadInfo::current(), fault("first")));
        assert!(!interceptor.intercept(ThreadInfo::current(), fault("second")));

        assert_eq!(steps.taken(), [Step::Persist, Step::Report, Step::Terminate]);
    }

    #[test]
    fn failures_still_terminate() {
        let td = tempfile::tempdir().unwrap();
        let blocker = td.path().join("blocked");
        fs::write(&blocker, b"not a directory").unwrap();

        let steps = Steps::default();
        let failing = make_remote_report(|_fault| Err("connection refused".into()));

        let interceptor = FaultInterceptor::new(
            config(blocker.join("Log"), &steps)
                .storage_probe(steps.probe(true))
                .remote_report(failing)
                .notifier(|_: &str| -> Result<(), Error> { Err(Error::Notify("no display".to_owned())) }),
        );
        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(steps.taken(), [Step::Persist, Step::Terminate]);
        assert_eq!(log_files(td.path()), [blocker]);
    }

    #[test]
    fn panics_still_terminate() {
        let td = tempfile::tempdir().unwrap();
        let steps = Steps::default();

        let probe_steps = steps.clone();
        let interceptor = FaultInterceptor::new(
            config(td.path(), &steps)
                .storage_probe(move || -> bool {
                    probe_steps.push(Step::Persist);
                    panic!("probe exploded");
                })
                .remote_report(make_remote_report(|_fault| panic!("reporter exploded")))
                .notifier(|_: &str| -> Result<(), Error> { panic!("notifier exploded") }),
        );
        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(steps.taken(), [Step::Persist, Step::Terminate]);
        assert!(log_files(td.path()).is_empty());
    }

    #[test]
    fn default_crash_scenario() {
        let td = tempfile::tempdir().unwrap();
        let steps = Steps::default();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);

        let snapshot = DeviceSnapshot {
            manufacturer: "Embarkment".to_owned(),
            device_name: "pixel-9000".to_owned(),
            system_version: "Linux 6.1.0".to_owned(),
            device_id: "0123456789abcdef".to_owned(),
            app_version: "4.2.0".to_owned(),
        };

        let interceptor = FaultInterceptor::new(
            config(CrashDir::nested(td.path(), "", ""), &steps)
                .device_info(snapshot.clone())
                .notifier(move |notice: &str| {
                    tx.lock()
                        .send(notice.to_owned())
                        .map_err(|e| Error::Notify(e.to_string()))
                }),
        );

        let crash_dir = td.path().join("DefaultCrash").join("Log");
        assert_eq!(interceptor.recorder().directory(), crash_dir);
        assert!(!crash_dir.exists());

        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(steps.taken(), [Step::Terminate]);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            DEFAULT_NOTICE
        );

        let logs = log_files(&crash_dir);
        assert_eq!(logs.len(), 1);

        let name = logs[0].file_name().unwrap().to_str().unwrap();
        let stem = name.strip_suffix(".log").unwrap();
        assert_eq!(stem.len(), 12);
        assert!(stem.chars().all(|c| c.is_ascii_digit()));

        let contents = fs::read_to_string(&logs[0]).unwrap();
        for value in [
            &snapshot.manufacturer,
            &snapshot.device_name,
            &snapshot.system_version,
            &snapshot.device_id,
            &snapshot.app_version,
        ] {
            assert!(contents.contains(value.as_str()), "missing {value}");
        }
        assert!(contents.contains("\nboom\n"));
        assert!(contents.contains(file!()));
    }

    #[test]
    fn unmounted_scenario() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path().join("sdcard");
        let steps = Steps::default();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);

        let interceptor = FaultInterceptor::new(
            config(CrashDir::nested(&root, "", ""), &steps).notifier(move |notice: &str| {
                tx.lock()
                    .send(notice.to_owned())
                    .map_err(|e| Error::Notify(e.to_string()))
            }),
        );
        interceptor.intercept(ThreadInfo::current(), fault("boom"));

        assert_eq!(steps.taken(), [Step::Terminate]);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(!root.exists());
    }
}
