use crate::{
    Error,
    fault::{Fault, ThreadInfo},
    interceptor::{FaultInterceptor, on_step_thread},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

static ATTACHED: AtomicBool = AtomicBool::new(false);

/// The process-wide panic hook that hands faults to a [`FaultInterceptor`]
pub struct CrashHandler {
    interceptor: Arc<FaultInterceptor>,
}

impl CrashHandler {
    /// Attaches the interceptor as the panic hook, replacing the current hook.
    ///
    /// This should be done as early as possible, faults raised before the
    /// handler is attached are not recorded. Only one handler can be attached
    /// at a time, and the handler is detached when it is dropped, so keep it
    /// alive for as long as faults should be recorded.
    ///
    /// A thread that panics while another fault is being handled is blocked
    /// until the process is terminated, rather than being allowed to unwind
    /// and possibly exit the process first.
    pub fn attach(interceptor: Arc<FaultInterceptor>) -> Result<Self, Error> {
        if ATTACHED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::HandlerAlreadyInstalled);
        }

        let hooked = interceptor.clone();
        std::panic::set_hook(Box::new(move |info| {
            let fault = Fault::from_panic(info);
            if !hooked.intercept(ThreadInfo::current(), fault) && !on_step_thread() {
                loop {
                    std::thread::park();
                }
            }
        }));

        Ok(Self { interceptor })
    }

    /// Detaches the handler, restoring the default panic hook.
    ///
    /// This is done automatically when this [`CrashHandler`] is dropped.
    #[inline]
    pub fn detach(self) {}

    #[inline]
    pub fn interceptor(&self) -> &Arc<FaultInterceptor> {
        &self.interceptor
    }

    /// Handles a fault that did not originate from a panic, eg. a fatal error
    /// the application cannot recover from, exactly as if it was a panic on
    /// the current thread.
    ///
    /// With the default terminator this does not return.
    #[inline]
    pub fn simulate_fault(&self, fault: Fault) {
        self.interceptor.intercept(ThreadInfo::current(), fault);
    }
}

impl Drop for CrashHandler {
    fn drop(&mut self) {
        // The hook can't be changed while panicking
        if !std::thread::panicking() {
            drop(std::panic::take_hook());
        }

        ATTACHED.store(false, Ordering::SeqCst);
    }
}
