//! External process execution for miniwerk.
//!
//! Certificates are obtained by running third-party tools (`certbot`,
//! `mkcert`). This crate wraps those calls:
//!
//! - **No shell invocation**: programs get an explicit argument vector
//! - **Argument validation**: NUL and line breaks are rejected up front
//! - **Allowlist enforcement**: only [`AllowedProgram`]s can be started
//! - **Bounded runtime**: every call is killed after [`DEFAULT_TIMEOUT`]
//!
//! Output of every call is logged through `tracing`; non-zero exits are
//! logged at error level together with the captured streams.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
mod error;

pub use command::{
    validate_argument, validate_program_path, AllowedProgram, CommandError, CommandOutput,
    SafeCommand, DEFAULT_TIMEOUT,
};
pub use error::{ValidationError, ValidationErrorKind};
