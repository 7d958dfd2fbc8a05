use crate::{
    device::DeviceInfo,
    notify::{DEFAULT_NOTICE, Notifier, StderrNotifier},
    recorder::{CrashDir, StorageProbe},
    report::RemoteReport,
    terminate::{ProcessKiller, Terminator},
};
use std::{sync::Arc, time::Duration};

/// The default amount of time the faulting thread waits for the notice to be
/// shown before the process is terminated
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(3);

/// The configuration of a [`crate::FaultInterceptor`], fixed once it is
/// constructed.
///
/// ```no_run
/// use crash_logger::{Config, CrashDir, HostDeviceInfo};
///
/// let config = Config::new(CrashDir::nested("/sdcard", "MyApp", ""))
///     .device_info(HostDeviceInfo::new(env!("CARGO_PKG_VERSION")));
/// ```
pub struct Config {
    pub(crate) crash_dir: CrashDir,
    pub(crate) device_info: Option<Box<dyn DeviceInfo>>,
    pub(crate) storage_probe: Option<Box<dyn StorageProbe>>,
    pub(crate) remote_report: Option<Arc<dyn RemoteReport>>,
    pub(crate) remote_report_enabled: bool,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) notice: String,
    pub(crate) grace_window: Duration,
    pub(crate) terminator: Box<dyn Terminator>,
}

impl Config {
    /// Creates a configuration that writes bare traces to the specified
    /// directory, shows the notice on stderr and kills the process after
    /// [`DEFAULT_GRACE_WINDOW`]
    pub fn new(crash_dir: impl Into<CrashDir>) -> Self {
        Self {
            crash_dir: crash_dir.into(),
            device_info: None,
            storage_probe: None,
            remote_report: None,
            remote_report_enabled: true,
            notifier: Arc::new(StderrNotifier),
            notice: DEFAULT_NOTICE.to_owned(),
            grace_window: DEFAULT_GRACE_WINDOW,
            terminator: Box::new(ProcessKiller),
        }
    }

    /// Writes a header of device metadata at the top of each crash log
    pub fn device_info(mut self, device_info: impl DeviceInfo + 'static) -> Self {
        self.device_info = Some(Box::new(device_info));
        self
    }

    /// Overrides how the availability of the storage medium is determined,
    /// see [`crate::CrashRecorder::new`] for the default
    pub fn storage_probe(mut self, probe: impl StorageProbe + 'static) -> Self {
        self.storage_probe = Some(Box::new(probe));
        self
    }

    /// Forwards faults to the specified reporter, see also
    /// [`Self::remote_report_enabled`]
    pub fn remote_report(mut self, report: Arc<dyn RemoteReport>) -> Self {
        self.remote_report = Some(report);
        self
    }

    /// Whether a configured reporter is called at all, defaults to `true`.
    ///
    /// This is independent of the reporter itself, disabling reporting
    /// suppresses a reporter set either here or later via
    /// [`crate::FaultInterceptor::configure_remote_report`].
    pub fn remote_report_enabled(mut self, enabled: bool) -> Self {
        self.remote_report_enabled = enabled;
        self
    }

    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// The message shown to the user, defaults to [`DEFAULT_NOTICE`]
    pub fn notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = notice.into();
        self
    }

    pub fn grace_window(mut self, grace_window: Duration) -> Self {
        self.grace_window = grace_window;
        self
    }

    /// Replaces how the process is terminated, this is only meant for tests
    pub fn terminator(mut self, terminator: impl Terminator + 'static) -> Self {
        self.terminator = Box::new(terminator);
        self
    }
}
