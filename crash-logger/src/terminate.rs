/// Ends the process once a fault has been handled.
///
/// [`ProcessKiller`] is the only implementation that should be used outside
/// of tests, the trait exists so the sequence leading up to termination can be
/// observed without the observer dying.
pub trait Terminator: Send + Sync {
    fn terminate(&self);
}

/// Kills the current process at the OS level, no destructors, `atexit`
/// handlers or further panic handling run
pub struct ProcessKiller;

impl Terminator for ProcessKiller {
    fn terminate(&self) {
        kill_process();
    }
}

/// Kills the current process.
///
/// If the OS refuses, the process is aborted instead.
#[allow(unsafe_code)]
pub fn kill_process() -> ! {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            // SAFETY: sending a signal to ourselves has no memory safety
            // implications
            unsafe {
                libc::kill(libc::getpid(), libc::SIGKILL);
            }
        } else if #[cfg(target_os = "windows")] {
            use windows_sys::Win32::System::Threading::{GetCurrentProcess, TerminateProcess};

            // SAFETY: GetCurrentProcess returns a pseudo handle that is always
            // valid for the current process
            unsafe {
                TerminateProcess(GetCurrentProcess(), 1);
            }
        }
    }

    std::process::abort();
}
