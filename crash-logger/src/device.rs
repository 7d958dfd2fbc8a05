//! Metadata about the device and application, used to enrich the header of a
//! crash log.
//!
//! Every value is best-effort, an empty string is written when a value cannot
//! be determined.

/// Supplies the environment details written at the top of a crash log
pub trait DeviceInfo: Send + Sync {
    fn manufacturer(&self) -> String;
    fn device_name(&self) -> String;
    fn system_version(&self) -> String;
    /// A value that uniquely identifies this device
    fn device_id(&self) -> String;
    fn app_version(&self) -> String;
}

/// A fixed set of values, eg. collected by the host at startup
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub manufacturer: String,
    pub device_name: String,
    pub system_version: String,
    pub device_id: String,
    pub app_version: String,
}

impl DeviceSnapshot {
    /// Takes a snapshot of another provider's current values
    pub fn capture(info: &dyn DeviceInfo) -> Self {
        Self {
            manufacturer: info.manufacturer(),
            device_name: info.device_name(),
            system_version: info.system_version(),
            device_id: info.device_id(),
            app_version: info.app_version(),
        }
    }
}

impl DeviceInfo for DeviceSnapshot {
    fn manufacturer(&self) -> String {
        self.manufacturer.clone()
    }

    fn device_name(&self) -> String {
        self.device_name.clone()
    }

    fn system_version(&self) -> String {
        self.system_version.clone()
    }

    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn app_version(&self) -> String {
        self.app_version.clone()
    }
}

/// Queries the host the process is running on.
///
/// Values are read lazily when the crash log is written, the app version is
/// supplied by the application since only it knows it, eg.
/// `HostDeviceInfo::new(env!("CARGO_PKG_VERSION"))`
pub struct HostDeviceInfo {
    app_version: String,
}

impl HostDeviceInfo {
    pub fn new(app_version: impl Into<String>) -> Self {
        Self {
            app_version: app_version.into(),
        }
    }
}

impl DeviceInfo for HostDeviceInfo {
    fn manufacturer(&self) -> String {
        read_trimmed("/sys/class/dmi/id/sys_vendor")
    }

    fn device_name(&self) -> String {
        let product = read_trimmed("/sys/class/dmi/id/product_name");
        if product.is_empty() {
            hostname()
        } else {
            product
        }
    }

    fn system_version(&self) -> String {
        system_version()
    }

    fn device_id(&self) -> String {
        let id = read_trimmed("/etc/machine-id");
        if id.is_empty() {
            read_trimmed("/var/lib/dbus/machine-id")
        } else {
            id
        }
    }

    fn app_version(&self) -> String {
        self.app_version.clone()
    }
}

fn read_trimmed(path: &str) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_owned())
        .unwrap_or_default()
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        #[allow(unsafe_code)]
        fn hostname() -> String {
            let mut buf = [0u8; 256];
            // SAFETY: the buffer is valid for its full length, and the result
            // is only read up to the first nul
            let r = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
            if r != 0 {
                return String::new();
            }

            let len = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
            String::from_utf8_lossy(&buf[..len]).into_owned()
        }

        #[allow(unsafe_code)]
        fn system_version() -> String {
            fn field(chars: &[libc::c_char]) -> String {
                let bytes: Vec<u8> = chars
                    .iter()
                    .take_while(|c| **c != 0)
                    .map(|c| *c as u8)
                    .collect();
                String::from_utf8_lossy(&bytes).into_owned()
            }

            // SAFETY: utsname is plain old data and is fully written by uname
            // on success
            let uts = unsafe {
                let mut uts: libc::utsname = std::mem::zeroed();
                if libc::uname(&mut uts) != 0 {
                    return String::new();
                }
                uts
            };

            format!("{} {}", field(&uts.sysname), field(&uts.release))
        }
    } else {
        fn hostname() -> String {
            std::env::var("COMPUTERNAME").unwrap_or_default()
        }

        fn system_version() -> String {
            std::env::consts::OS.to_owned()
        }
    }
}
