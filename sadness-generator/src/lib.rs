//! Various ways to make your program sad, ie. to raise the unhandled faults
//! that a crash handler is expected to record.

use std::{error::Error, fmt};

/// The message of the [`SadnessFlavor::Panic`] flavor
pub const SAD_MESSAGE: &str = "boom";

/// The ways we can make a program sad
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SadnessFlavor {
    /// `panic!` with a string message
    Panic,
    /// Panics with a boxed error that has a chain of sources
    ErrorPayload,
    /// Unwraps a `None`
    Unwrap,
    /// Indexes past the end of a slice
    OutOfBounds,
    /// Divides an integer by zero
    DivideByZero,
    /// Panics with a payload that is neither a string nor an error
    OpaquePayload,
}

impl SadnessFlavor {
    /// Raises the fault for this flavor
    pub fn make_sad(self) -> ! {
        match self {
            Self::Panic => raise_panic(),
            Self::ErrorPayload => raise_error_payload(),
            Self::Unwrap => raise_unwrap(),
            Self::OutOfBounds => raise_out_of_bounds(),
            Self::DivideByZero => raise_divide_by_zero(),
            Self::OpaquePayload => raise_opaque_payload(),
        }
    }

    /// The message the fault is expected to be reported with
    pub fn message(self) -> &'static str {
        match self {
            Self::Panic => SAD_MESSAGE,
            Self::ErrorPayload => "failed to save the game",
            Self::Unwrap => "called `Option::unwrap()` on a `None` value",
            Self::OutOfBounds => "index out of bounds: the len is 3 but the index is 10",
            Self::DivideByZero => "attempt to divide by zero",
            Self::OpaquePayload => "Box<dyn Any>",
        }
    }

    /// The causes the fault is expected to be reported with, outermost first
    pub fn causes(self) -> &'static [&'static str] {
        match self {
            Self::ErrorPayload => &["the save directory is read-only", "permission denied"],
            _ => &[],
        }
    }
}

impl fmt::Display for SadnessFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Panic => "panic",
            Self::ErrorPayload => "error-payload",
            Self::Unwrap => "unwrap",
            Self::OutOfBounds => "out-of-bounds",
            Self::DivideByZero => "divide-by-zero",
            Self::OpaquePayload => "opaque-payload",
        })
    }
}

/// An error with a source, and possibly a source of its own
#[derive(Debug)]
pub struct Sadness {
    what: &'static str,
    source: Option<Box<Sadness>>,
}

impl Sadness {
    /// Builds a chain of errors, outermost first
    pub fn chain(whats: &[&'static str]) -> Option<Self> {
        whats.iter().rev().fold(None, |source, what| {
            Some(Self {
                what: *what,
                source: source.map(Box::new),
            })
        })
    }
}

impl fmt::Display for Sadness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.what)
    }
}

impl Error for Sadness {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|s| s as &(dyn Error + 'static))
    }
}

/// Panics with [`SAD_MESSAGE`]
pub fn raise_panic() -> ! {
    panic!("{SAD_MESSAGE}");
}

/// Panics with a boxed [`Sadness`] that has 2 sources
pub fn raise_error_payload() -> ! {
    let flavor = SadnessFlavor::ErrorPayload;

    let mut whats = vec![flavor.message()];
    whats.extend_from_slice(flavor.causes());

    let err: Box<dyn Error + Send + Sync> =
        Box::new(Sadness::chain(&whats).expect("chain is not empty"));
    std::panic::panic_any(err);
}

pub fn raise_unwrap() -> ! {
    let nothing: Option<u32> = std::hint::black_box(None);
    let _ = nothing.unwrap();
    unreachable!("unwrapped a None");
}

pub fn raise_out_of_bounds() -> ! {
    let items = std::hint::black_box(vec![1u8, 2, 3]);
    let index = std::hint::black_box(10);
    println!("we are crashing by indexing out of bounds: {}", items[index]);
    unreachable!("indexed out of bounds");
}

pub fn raise_divide_by_zero() -> ! {
    let divisor = std::hint::black_box(0u32);
    println!("we are crashing by dividing by zero: {}", 1 / divisor);
    unreachable!("divided by zero");
}

/// Panics with a payload the panic machinery knows nothing about
pub fn raise_opaque_payload() -> ! {
    std::panic::panic_any(42u32);
}
