use chrono::{DateTime, Local};
use std::{
    backtrace::Backtrace,
    fmt, io,
    panic::{Location, PanicHookInfo},
    thread::{Thread, ThreadId},
};

/// The kind reported for faults that originate from a panic
pub const PANIC_KIND: &str = "panic";

/// The pattern used to name crash logs, eg. `202401241730`
pub const LOG_NAME_FORMAT: &str = "%Y%m%d%H%M";

/// The extension of every crash log
pub const LOG_EXTENSION: &str = "log";

/// The location in source where a fault was raised
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl From<&Location<'_>> for SourceLocation {
    fn from(loc: &Location<'_>) -> Self {
        Self {
            file: loc.file().to_owned(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// An unhandled fault, ie. the panic (or fatal error) that is about to take
/// the process down.
///
/// The backtrace is captured when the fault is constructed, so construct it
/// as close to the fault as possible.
#[derive(Debug)]
pub struct Fault {
    kind: String,
    message: String,
    location: Option<SourceLocation>,
    causes: Vec<String>,
    backtrace: Backtrace,
}

impl Fault {
    /// Creates a fault with just a message, the location is the caller's
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: PANIC_KIND.to_owned(),
            message: message.into(),
            location: Some(Location::caller().into()),
            causes: Vec::new(),
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Creates a fault from the information handed to a panic hook.
    ///
    /// `&str` and `String` payloads are used as the message. A boxed
    /// [`std::error::Error`] payload (eg. from [`std::panic::panic_any`]) also
    /// contributes its chain of sources as causes.
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();

        let (message, causes) = if let Some(s) = payload.downcast_ref::<&str>() {
            ((*s).to_owned(), Vec::new())
        } else if let Some(s) = payload.downcast_ref::<String>() {
            (s.clone(), Vec::new())
        } else if let Some(err) =
            payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync + 'static>>()
        {
            (err.to_string(), source_chain(err.source()))
        } else {
            ("Box<dyn Any>".to_owned(), Vec::new())
        };

        Self {
            kind: PANIC_KIND.to_owned(),
            message,
            location: info.location().map(SourceLocation::from),
            causes,
            backtrace: Backtrace::force_capture(),
        }
    }

    /// Creates a fault from a fatal error, the kind is the error's type name
    /// and its sources become the chained causes
    #[track_caller]
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self {
            kind: std::any::type_name::<E>().to_owned(),
            message: err.to_string(),
            location: Some(Location::caller().into()),
            causes: source_chain(err.source()),
            backtrace: Backtrace::force_capture(),
        }
    }

    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    /// The rendered chain of causes, outermost first
    #[inline]
    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    #[inline]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[inline]
    fn is_panic(&self) -> bool {
        self.kind == PANIC_KIND
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

fn source_chain(mut source: Option<&(dyn std::error::Error + 'static)>) -> Vec<String> {
    let mut causes = Vec::new();
    while let Some(err) = source {
        causes.push(err.to_string());
        source = err.source();
    }
    causes
}

/// Identifies the thread a fault occurred on
#[derive(Clone, Debug)]
pub struct ThreadInfo {
    pub name: Option<String>,
    pub id: ThreadId,
}

impl ThreadInfo {
    #[inline]
    pub fn current() -> Self {
        Self::from(&std::thread::current())
    }
}

impl From<&Thread> for ThreadInfo {
    fn from(thread: &Thread) -> Self {
        Self {
            name: thread.name().map(str::to_owned),
            id: thread.id(),
        }
    }
}

impl fmt::Display for ThreadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or("<unnamed>"))
    }
}

/// A single incident, the fault plus where and when it happened
#[derive(Debug)]
pub struct FaultRecord {
    pub thread: ThreadInfo,
    pub cause: Fault,
    pub timestamp: DateTime<Local>,
}

impl FaultRecord {
    /// Creates a record stamped with the current local time
    pub fn new(thread: ThreadInfo, cause: Fault) -> Self {
        Self {
            thread,
            cause,
            timestamp: Local::now(),
        }
    }

    /// The name of the crash log for this record, eg. `202401241730.log`
    pub fn file_name(&self) -> String {
        format!(
            "{}.{LOG_EXTENSION}",
            self.timestamp.format(LOG_NAME_FORMAT)
        )
    }

    /// Renders the fault the same way the default panic hook does, followed
    /// by any causes and the full backtrace
    pub fn write_trace<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        let verb = if self.cause.is_panic() {
            "panicked"
        } else {
            "faulted"
        };

        match &self.cause.location {
            Some(loc) => writeln!(w, "thread '{}' {verb} at {loc}:", self.thread)?,
            None => writeln!(w, "thread '{}' {verb}:", self.thread)?,
        }

        if self.cause.is_panic() {
            writeln!(w, "{}", self.cause.message)?;
        } else {
            writeln!(w, "{}", self.cause)?;
        }

        if !self.cause.causes.is_empty() {
            writeln!(w, "Caused by:")?;
            for (i, cause) in self.cause.causes.iter().enumerate() {
                writeln!(w, "{i:>5}: {cause}")?;
            }
        }

        writeln!(w, "stack backtrace:")?;
        writeln!(w, "{}", self.cause.backtrace)?;
        w.flush()
    }
}
