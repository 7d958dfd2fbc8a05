use crate::Fault;
use std::sync::Arc;

/// The error a [`RemoteReport`] can fail with, it is only ever logged
pub type ReportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// User implemented trait for forwarding a fault off the device, eg. to a
/// crash reporting service.
///
/// How, and if, the fault is sent is entirely up to the implementation. The
/// [`crate::FaultInterceptor`] calls [`Self::on_crash`] at most once, after
/// the crash log has been written, on the faulting thread. No timeout is
/// applied, so an implementation that blocks delays process termination.
pub trait RemoteReport: Send + Sync {
    /// Method invoked when a crash occurs
    fn on_crash(&self, fault: &Fault) -> Result<(), ReportError>;
}

/// Creates a [`RemoteReport`] using the supplied closure as the implementation.
#[inline]
pub fn make_remote_report<F>(closure: F) -> Arc<dyn RemoteReport>
where
    F: Send + Sync + Fn(&Fault) -> Result<(), ReportError> + 'static,
{
    struct Wrapper<F> {
        inner: F,
    }

    impl<F> RemoteReport for Wrapper<F>
    where
        F: Send + Sync + Fn(&Fault) -> Result<(), ReportError>,
    {
        fn on_crash(&self, fault: &Fault) -> Result<(), ReportError> {
            (self.inner)(fault)
        }
    }

    Arc::new(Wrapper { inner: closure })
}
