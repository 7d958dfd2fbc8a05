// BEGIN - Embark standard lints v6 for Rust 1.55+
// do not change or add/remove here, but one can add exceptions after this section
// for more info see: <https://github.com/EmbarkStudios/rust-ecosystem/issues/59>
#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::flat_map_option,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::from_iter_instead_of_collect,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_digit_groups,
    clippy::large_stack_arrays,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_on_vec_items,
    clippy::match_same_arms,
    clippy::match_wild_err_arm,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mismatched_target_os,
    clippy::missing_enforced_import_renames,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::needless_for_each,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::rc_mutex,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::single_match_else,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
// END - Embark standard lints v6 for Rust 1.55+
// crate-specific exceptions:

//! [`CrashHandler`] records the first unhandled fault of a process to a crash
//! log and then terminates the process.
//!
//! # Sequence
//!
//! When a thread panics the attached [`FaultInterceptor`] runs the following
//! steps on the panicking thread, in order
//!
//! 1. The fault is written to stderr.
//! 2. A crash log is written by the [`CrashRecorder`], unless the storage
//!    medium is unavailable.
//! 3. The fault is handed to the [`RemoteReport`], if one is configured and
//!    reporting is enabled.
//! 4. A notice is shown to the user by the [`Notifier`], on a detached thread.
//! 5. The thread sleeps for the grace window, giving the notice time to show.
//! 6. The process is killed.
//!
//! A failure in any of the first 5 steps is logged and does not prevent the
//! following steps from running, the process is always terminated.
//!
//! # Crash logs
//!
//! One log is written per crash, named after the local time of the crash, eg.
//! `202401241730.log`. If a [`DeviceInfo`] is configured the log starts with a
//! header block
//!
//! ```text
//! ------------Crash Environment Info------------
//! ------------Manufacturer: <manufacturer>------------
//! ------------DeviceName: <device name>------------
//! ------------SystemVersion: <os version>------------
//! ------------DeviceId: <device id>------------
//! ------------AppVersion: <app version>------------
//! ------------Crash Environment Info------------
//!
//! ```
//!
//! followed by the same trace the default panic hook prints, plus any chained
//! causes and the full backtrace.
//!
//! ```no_run
//! use crash_logger::{Config, CrashDir, CrashHandler, FaultInterceptor, HostDeviceInfo};
//! use std::sync::Arc;
//!
//! let interceptor = Arc::new(FaultInterceptor::new(
//!     Config::new(CrashDir::nested("/sdcard", "MyApp", "Log"))
//!         .device_info(HostDeviceInfo::new(env!("CARGO_PKG_VERSION"))),
//! ));
//!
//! let _handler = CrashHandler::attach(interceptor).expect("failed to attach crash handler");
//! ```

mod config;
mod device;
mod error;
mod fault;
mod handler;
mod interceptor;
mod notify;
mod recorder;
mod report;
mod terminate;

pub use config::{Config, DEFAULT_GRACE_WINDOW};
pub use device::{DeviceInfo, DeviceSnapshot, HostDeviceInfo};
pub use error::Error;
pub use fault::{
    Fault, FaultRecord, LOG_EXTENSION, LOG_NAME_FORMAT, PANIC_KIND, SourceLocation, ThreadInfo,
};
pub use handler::CrashHandler;
pub use interceptor::{FaultInterceptor, STEP_THREAD_NAME};
pub use notify::{DEFAULT_NOTICE, NOTIFY_THREAD_NAME, Notifier, StderrNotifier};
pub use recorder::{
    AlwaysAvailable, CrashDir, CrashRecorder, DEFAULT_APP_FOLDER, DEFAULT_CRASH_FOLDER,
    MountPoint, StorageProbe,
};
pub use report::{RemoteReport, ReportError, make_remote_report};
pub use terminate::{ProcessKiller, Terminator, kill_process};
