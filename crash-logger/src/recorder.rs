use crate::{Error, device::DeviceInfo, fault::FaultRecord};
use std::{
    fs,
    io::{self, LineWriter, Write},
    panic::{AssertUnwindSafe, catch_unwind},
    path::{Path, PathBuf},
};

/// The application folder used when a [`CrashDir::Nested`] is given an empty
/// name
pub const DEFAULT_APP_FOLDER: &str = "DefaultCrash";
/// The crash folder used when a [`CrashDir::Nested`] is given an empty name
pub const DEFAULT_CRASH_FOLDER: &str = "Log";

/// Wraps every header line so the block is easy to grep for
const DELIMITER: &str = "------------";
const BANNER: &str = "Crash Environment Info";

/// Where crash logs are written
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CrashDir {
    /// Logs are written directly to this directory
    Path(PathBuf),
    /// Logs are written to `<root>/<app_folder>/<crash_folder>`, where `root`
    /// is the mount point of the storage medium
    Nested {
        root: PathBuf,
        app_folder: String,
        crash_folder: String,
    },
}

impl CrashDir {
    /// Creates a nested layout, empty folder names are replaced with
    /// [`DEFAULT_APP_FOLDER`] and [`DEFAULT_CRASH_FOLDER`] respectively
    pub fn nested(root: impl Into<PathBuf>, app_folder: &str, crash_folder: &str) -> Self {
        fn or_default(name: &str, default: &str) -> String {
            let name = if name.is_empty() { default } else { name };
            name.to_owned()
        }

        Self::Nested {
            root: root.into(),
            app_folder: or_default(app_folder, DEFAULT_APP_FOLDER),
            crash_folder: or_default(crash_folder, DEFAULT_CRASH_FOLDER),
        }
    }

    /// The full path of the directory logs are written to
    pub fn resolve(&self) -> PathBuf {
        match self {
            Self::Path(path) => path.clone(),
            Self::Nested {
                root,
                app_folder,
                crash_folder,
            } => root.join(app_folder).join(crash_folder),
        }
    }

    /// The path whose availability determines if logs can be written at all
    pub fn storage_root(&self) -> &Path {
        match self {
            Self::Path(path) => path,
            Self::Nested { root, .. } => root,
        }
    }
}

impl From<PathBuf> for CrashDir {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for CrashDir {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_owned())
    }
}

/// Reports whether the storage medium that holds the crash directory can
/// currently be written to
pub trait StorageProbe: Send + Sync {
    fn is_available(&self) -> bool;
}

impl<F> StorageProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_available(&self) -> bool {
        self()
    }
}

/// Storage that is assumed to always be present
pub struct AlwaysAvailable;

impl StorageProbe for AlwaysAvailable {
    fn is_available(&self) -> bool {
        true
    }
}

/// Storage is available if its mount point exists and is a directory
pub struct MountPoint(pub PathBuf);

impl StorageProbe for MountPoint {
    fn is_available(&self) -> bool {
        self.0.is_dir()
    }
}

/// Writes a single crash log per [`FaultRecord`]
pub struct CrashRecorder {
    dir: CrashDir,
    device_info: Option<Box<dyn DeviceInfo>>,
    storage: Box<dyn StorageProbe>,
}

impl CrashRecorder {
    /// Creates a recorder that writes bare traces to the specified directory.
    ///
    /// A [`CrashDir::Nested`] layout is only written to while its root is
    /// mounted, a [`CrashDir::Path`] is always considered available.
    pub fn new(dir: CrashDir) -> Self {
        let storage: Box<dyn StorageProbe> = match &dir {
            CrashDir::Path(_) => Box::new(AlwaysAvailable),
            CrashDir::Nested { root, .. } => Box::new(MountPoint(root.clone())),
        };

        Self {
            dir,
            device_info: None,
            storage,
        }
    }

    /// Writes a header of device metadata before each trace
    #[inline]
    pub fn with_device_info(mut self, device_info: Box<dyn DeviceInfo>) -> Self {
        self.device_info = Some(device_info);
        self
    }

    #[inline]
    pub fn with_storage_probe(mut self, probe: Box<dyn StorageProbe>) -> Self {
        self.storage = probe;
        self
    }

    /// The directory crash logs are written to
    #[inline]
    pub fn directory(&self) -> PathBuf {
        self.dir.resolve()
    }

    /// Writes the crash log for the record, returning its path.
    ///
    /// This never fails or panics, any error is logged and `None` is returned
    /// instead.
    pub fn persist(&self, record: &FaultRecord) -> Option<PathBuf> {
        match catch_unwind(AssertUnwindSafe(|| self.write_log(record))) {
            Ok(Ok(path)) => {
                log::info!("wrote crash log to {}", path.display());
                Some(path)
            }
            Ok(Err(Error::StorageUnavailable(root))) => {
                log::warn!(
                    "storage at {} is unavailable, crash log not written",
                    root.display()
                );
                None
            }
            Ok(Err(e)) => {
                log::error!("failed to write crash log: {e:#}");
                None
            }
            Err(_) => {
                log::error!("panicked while writing crash log");
                None
            }
        }
    }

    /// Writes the crash log for the record, returning its path.
    ///
    /// The directory is created if it doesn't exist. A log with the same name,
    /// ie. from a crash in the same minute, is overwritten.
    pub fn write_log(&self, record: &FaultRecord) -> Result<PathBuf, Error> {
        if !self.storage.is_available() {
            return Err(Error::StorageUnavailable(self.dir.storage_root().to_owned()));
        }

        let dir = self.dir.resolve();
        if !dir.is_dir() {
            fs::create_dir_all(&dir).map_err(|source| Error::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }

        // Gather the header before touching the file, so a failing device
        // info provider doesn't leave a partial log behind
        let mut header = Vec::new();
        if let Some(device_info) = &self.device_info {
            write_header(&mut header, device_info.as_ref())?;
        }

        let path = dir.join(record.file_name());

        {
            let mut file = fs::File::create(&path)?;
            file.write_all(&header)?;
            file.flush()?;
        }

        let mut trace = LineWriter::new(fs::OpenOptions::new().append(true).open(&path)?);
        record.write_trace(&mut trace)?;

        Ok(path)
    }
}

fn write_header<W: Write>(w: &mut W, device_info: &dyn DeviceInfo) -> io::Result<()> {
    writeln!(w, "{DELIMITER}{BANNER}{DELIMITER}")?;

    let fields = [
        ("Manufacturer", device_info.manufacturer()),
        ("DeviceName", device_info.device_name()),
        ("SystemVersion", device_info.system_version()),
        ("DeviceId", device_info.device_id()),
        ("AppVersion", device_info.app_version()),
    ];

    for (label, value) in fields {
        writeln!(w, "{DELIMITER}{label}: {value}{DELIMITER}")?;
    }

    writeln!(w, "{DELIMITER}{BANNER}{DELIMITER}")?;
    writeln!(w)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        device::DeviceSnapshot,
        fault::{Fault, ThreadInfo},
    };

    fn record(message: &str) -> FaultRecord {
        FaultRecord::new(ThreadInfo::current(), Fault::new(message))
    }

    fn snapshot() -> DeviceSnapshot {
        DeviceSnapshot {
            manufacturer: "Embarkment".to_owned(),
            device_name: "pixel-9000".to_owned(),
            system_version: "Linux 6.1.0".to_owned(),
            device_id: "0123456789abcdef".to_owned(),
            app_version: "4.2.0".to_owned(),
        }
    }

    fn log_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn nested_defaults() {
        let dir = CrashDir::nested("/sdcard", "", "");
        assert_eq!(dir.resolve(), Path::new("/sdcard/DefaultCrash/Log"));
        assert_eq!(dir.storage_root(), Path::new("/sdcard"));

        let dir = CrashDir::nested("/sdcard", "MyApp", "");
        assert_eq!(dir.resolve(), Path::new("/sdcard/MyApp/Log"));

        let dir = CrashDir::nested("/sdcard", "", "crashes");
        assert_eq!(dir.resolve(), Path::new("/sdcard/DefaultCrash/crashes"));
    }

    #[test]
    fn creates_missing_directories() {
        let td = tempfile::tempdir().unwrap();
        let recorder = CrashRecorder::new(CrashDir::nested(td.path(), "", ""));

        let record = record("boom");
        let path = recorder.persist(&record).expect("crash log should be written");

        let expected_dir = td.path().join("DefaultCrash").join("Log");
        assert_eq!(path.parent(), Some(expected_dir.as_path()));
        assert_eq!(log_files(&expected_dir), [expected_dir.join(record.file_name())]);
    }

    #[test]
    fn directory_creation_failure() {
        let td = tempfile::tempdir().unwrap();
        let blocker = td.path().join("blocked");
        fs::write(&blocker, b"not a directory").unwrap();

        let recorder = CrashRecorder::new(CrashDir::Path(blocker.join("Log")));
        let record = record("boom");

        assert!(matches!(
            recorder.write_log(&record),
            Err(Error::CreateDir { .. })
        ));
        assert!(recorder.persist(&record).is_none());
        assert_eq!(log_files(td.path()), [blocker]);
    }

    #[test]
    fn storage_unavailable() {
        let td = tempfile::tempdir().unwrap();
        let recorder = CrashRecorder::new(CrashDir::nested(td.path(), "", ""))
            .with_storage_probe(Box::new(|| false));

        assert!(recorder.persist(&record("boom")).is_none());
        assert!(log_files(td.path()).is_empty());
    }

    #[test]
    fn unmounted_root() {
        let td = tempfile::tempdir().unwrap();
        let root = td.path().join("sdcard");
        let recorder = CrashRecorder::new(CrashDir::nested(&root, "", ""));

        assert!(matches!(
            recorder.write_log(&record("boom")),
            Err(Error::StorageUnavailable(r)) if r == root
        ));
        assert!(!root.exists());
    }

    #[test]
    fn header_and_trace() {
        let td = tempfile::tempdir().unwrap();
        let recorder = CrashRecorder::new(CrashDir::Path(td.path().to_owned()))
            .with_device_info(Box::new(snapshot()));

        let path = recorder.persist(&record("boom")).unwrap();
        let contents = fs::read_to_string(path).unwrap();

        let expected_header = "\
------------Crash Environment Info------------
------------Manufacturer: Embarkment------------
------------DeviceName: pixel-9000------------
------------SystemVersion: Linux 6.1.0------------
------------DeviceId: 0123456789abcdef------------
------------AppVersion: 4.2.0------------
------------Crash Environment Info------------

thread '";

        assert!(contents.starts_with(expected_header), "{contents}");
        assert!(contents.contains("\nboom\n"));
        assert!(contents.contains(file!()));
        assert!(contents.contains("stack backtrace:"));
    }

    #[test]
    fn failing_device_info_leaves_no_log() {
        struct Exploding;

        impl DeviceInfo for Exploding {
            fn manufacturer(&self) -> String {
                panic!("device info exploded")
            }
            fn device_name(&self) -> String {
                String::new()
            }
            fn system_version(&self) -> String {
                String::new()
            }
            fn device_id(&self) -> String {
                String::new()
            }
            fn app_version(&self) -> String {
                String::new()
            }
        }

        let td = tempfile::tempdir().unwrap();
        let recorder = CrashRecorder::new(CrashDir::Path(td.path().to_owned()))
            .with_device_info(Box::new(Exploding));

        assert!(recorder.persist(&record("boom")).is_none());
        assert!(log_files(td.path()).is_empty());
    }

    #[test]
    fn bare_trace() {
        let td = tempfile::tempdir().unwrap();
        let recorder = CrashRecorder::new(CrashDir::Path(td.path().to_owned()));

        let path = recorder.persist(&record("boom")).unwrap();
        let contents = fs::read_to_string(path).unwrap();

        assert!(contents.starts_with("thread '"));
        assert!(!contents.contains(DELIMITER));
        assert!(contents.contains("\nboom\n"));
    }

    #[test]
    fn overwrites_log_from_same_minute() {
        let td = tempfile::tempdir().unwrap();
        let recorder = CrashRecorder::new(CrashDir::Path(td.path().to_owned()));

        let first = record("first");
        let mut second = record("second");
        second.timestamp = first.timestamp;

        let first_path = recorder.persist(&first).unwrap();
        let second_path = recorder.persist(&second).unwrap();
        assert_eq!(first_path, second_path);

        let contents = fs::read_to_string(second_path).unwrap();
        assert!(contents.contains("\nsecond\n"));
        assert!(!contents.contains("\nfirst\n"));
        assert_eq!(log_files(td.path()).len(), 1);
    }
}
