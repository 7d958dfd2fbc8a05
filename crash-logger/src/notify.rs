use crate::Error;
use std::{
    io::Write,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

/// The notice shown to the user before the process is terminated
pub const DEFAULT_NOTICE: &str = "The application has encountered an error and will now exit...";

/// The name of the thread the notice is shown on
pub const NOTIFY_THREAD_NAME: &str = "crash-notify";

/// Surfaces the crash notice to the user.
///
/// This is run on its own thread, as the faulting thread can't be relied on to
/// still be responsive, and is given the grace window to do its work before
/// the process is terminated regardless.
pub trait Notifier: Send + Sync {
    fn show(&self, notice: &str) -> Result<(), Error>;
}

impl<F> Notifier for F
where
    F: Fn(&str) -> Result<(), Error> + Send + Sync,
{
    fn show(&self, notice: &str) -> Result<(), Error> {
        self(notice)
    }
}

/// Writes the notice to stderr
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn show(&self, notice: &str) -> Result<(), Error> {
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{notice}")?;
        Ok(())
    }
}

/// Shows the notice on a detached thread, only a failure to spawn the thread
/// is returned, failures to show the notice are logged by the thread itself
pub(crate) fn spawn_notice(notifier: Arc<dyn Notifier>, notice: String) -> Result<(), Error> {
    std::thread::Builder::new()
        .name(NOTIFY_THREAD_NAME.to_owned())
        .spawn(move || {
            crate::interceptor::enter_step_thread();

            match catch_unwind(AssertUnwindSafe(|| notifier.show(&notice))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("{e:#}"),
                Err(_) => log::error!("panicked while showing crash notice"),
            }
        })?;

    Ok(())
}
