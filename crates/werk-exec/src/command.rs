//! Safe command execution for the certificate tooling.
//!
//! [`SafeCommand`] never goes through a shell: the program and every
//! argument are handed to the OS as a vector, so values such as domain
//! lists or e-mail addresses cannot be reinterpreted as shell syntax.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), werk_exec::CommandError> {
//! use werk_exec::{AllowedProgram, SafeCommand};
//!
//! let output = SafeCommand::new(AllowedProgram::Mkcert)
//!     .arg("-CAROOT")
//!     .run_checked()
//!     .await?;
//!
//! println!("CA root: {}", output.stdout_lossy().trim());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command as TokioCommand;
use tracing::{debug, error, info, warn};

use crate::error::ValidationError;

/// Hard limit for a single external process call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Programs that are explicitly allowed to be executed.
///
/// Adding new programs requires explicit code changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AllowedProgram {
    /// The `certbot` ACME client.
    Certbot,
    /// The `mkcert` local development CA.
    Mkcert,
}

impl AllowedProgram {
    /// Get the default program name, resolved through `PATH`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certbot => "certbot",
            Self::Mkcert => "mkcert",
        }
    }
}

impl fmt::Display for AllowedProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during safe command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Validation of a command argument failed.
    #[error("argument validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// The process could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// The command that was attempted.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process did not finish in time and was killed.
    #[error("command '{command}' timed out after {timeout_secs}s")]
    Timeout {
        /// The command that was executed.
        command: String,
        /// The limit that was exceeded.
        timeout_secs: u64,
    },

    /// The command returned a non-zero exit code.
    #[error("command '{command}' exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        /// The command that was executed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },
}

impl CommandError {
    /// Create a non-zero exit error.
    #[must_use]
    pub fn non_zero_exit(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::NonZeroExit {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Exit code of the failed process, if it ran to completion.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Check if this is a validation error.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::ValidationFailed(_))
    }
}

/// Characters that are never allowed in command arguments.
const FORBIDDEN_CHARS: &[char] = &[
    '\0', // Null byte
    '\n', // Newline (can break argument parsing)
    '\r', // Carriage return
];

/// Validate a command argument.
///
/// # Errors
///
/// Returns an error if the argument contains forbidden characters.
pub fn validate_argument(arg: &str, field_name: &str) -> Result<(), ValidationError> {
    for c in arg.chars() {
        if FORBIDDEN_CHARS.contains(&c) {
            return Err(ValidationError::shell_injection(field_name, c));
        }
    }

    Ok(())
}

/// Validate a program path.
///
/// # Errors
///
/// Returns an error if the path contains dangerous patterns.
pub fn validate_program_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::empty("program_path"));
    }

    if path.contains("..") {
        return Err(ValidationError::path_traversal("program_path", ".."));
    }

    for c in path.chars() {
        if FORBIDDEN_CHARS.contains(&c) || matches!(c, ';' | '&' | '|' | '$' | '`') {
            return Err(ValidationError::shell_injection("program_path", c));
        }
    }

    Ok(())
}

/// Output from a completed command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: Vec<u8>,
    /// Standard error.
    pub stderr: Vec<u8>,
    /// Exit status code (0 for success, -1 when killed by a signal).
    pub exit_code: i32,
}

impl CommandOutput {
    /// Get stdout as a UTF-8 string, replacing invalid characters.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Get stderr as a UTF-8 string, replacing invalid characters.
    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Check if the command succeeded (exit code 0).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A safe command builder that validates all inputs.
///
/// This builder ensures:
/// - Only allowlisted programs can be executed
/// - All arguments are validated before execution
/// - No shell is invoked (arguments are passed directly)
/// - The child is killed once the timeout elapses
#[derive(Debug)]
pub struct SafeCommand {
    program: AllowedProgram,
    program_path: Option<String>,
    args: Vec<String>,
    validation_errors: Vec<ValidationError>,
    timeout: Duration,
}

impl SafeCommand {
    /// Create a new safe command for the given program.
    #[must_use]
    pub fn new(program: AllowedProgram) -> Self {
        Self {
            program,
            program_path: None,
            args: Vec::new(),
            validation_errors: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a custom path for the program instead of searching `PATH`.
    ///
    /// The path is validated for safety.
    #[must_use]
    pub fn with_program_path(mut self, path: &str) -> Self {
        match validate_program_path(path) {
            Ok(()) => self.program_path = Some(path.to_string()),
            Err(e) => self.validation_errors.push(e),
        }
        self
    }

    /// Add a single argument to the command.
    #[must_use]
    pub fn arg(mut self, arg: &str) -> Self {
        match validate_argument(arg, "argument") {
            Ok(()) => self.args.push(arg.to_string()),
            Err(e) => self.validation_errors.push(e),
        }
        self
    }

    /// Add multiple arguments to the command.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let arg = arg.as_ref();
            match validate_argument(arg, "argument") {
                Ok(()) => self.args.push(arg.to_string()),
                Err(e) => self.validation_errors.push(e),
            }
        }
        self
    }

    /// Override the execution timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if there are any validation errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }

    /// Get any validation errors that occurred.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.validation_errors
    }

    /// The program that will be executed.
    #[must_use]
    pub fn program(&self) -> &str {
        self.program_path.as_deref().unwrap_or(self.program.as_str())
    }

    /// The validated argument vector.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.args
    }

    /// Build the command description for logging.
    #[must_use]
    pub fn description(&self) -> String {
        if self.args.is_empty() {
            return self.program().to_string();
        }
        format!("{} {}", self.program(), self.args.join(" "))
    }

    /// Execute the command and return its output regardless of exit status.
    ///
    /// Stderr is logged at warn level when non-empty, stdout at info. A
    /// non-zero exit is logged at error level together with both streams.
    ///
    /// # Errors
    ///
    /// Returns an error if validation failed, the process could not be
    /// spawned, or it did not finish within the timeout.
    pub async fn run(self) -> Result<CommandOutput, CommandError> {
        let description = self.description();
        let program = self.program().to_string();
        let Self {
            args,
            validation_errors,
            timeout,
            ..
        } = self;

        if let Some(error) = validation_errors.into_iter().next() {
            return Err(CommandError::ValidationFailed(error));
        }

        let mut cmd = TokioCommand::new(&program);
        cmd.args(&args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!(command = %description, timeout_secs = timeout.as_secs(), "spawning process");

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CommandError::Spawn {
                    command: description,
                    source,
                });
            }
            Err(_) => {
                error!(command = %description, timeout_secs = timeout.as_secs(), "process timed out");
                return Err(CommandError::Timeout {
                    command: description,
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        let result = CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code().unwrap_or(-1),
        };

        let stderr = result.stderr_lossy();
        let stdout = result.stdout_lossy();
        if !stderr.trim().is_empty() {
            warn!(command = %description, stderr = %stderr.trim_end(), "process wrote to stderr");
        }
        info!(command = %description, stdout = %stdout.trim_end(), "process finished");

        if !result.success() {
            error!(
                command = %description,
                exit_code = result.exit_code,
                stdout = %stdout.trim_end(),
                stderr = %stderr.trim_end(),
                "process returned nonzero exit code"
            );
        }

        Ok(result)
    }

    /// Execute the command, treating a non-zero exit as an error.
    ///
    /// # Errors
    ///
    /// Same as [`SafeCommand::run`], plus [`CommandError::NonZeroExit`].
    pub async fn run_checked(self) -> Result<CommandOutput, CommandError> {
        let description = self.description();
        let output = self.run().await?;
        if !output.success() {
            return Err(CommandError::non_zero_exit(
                description,
                output.exit_code,
                output.stderr_lossy(),
            ));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationErrorKind;
    use test_case::test_case;

    #[test_case("--flag" ; "flag")]
    #[test_case("--key=value" ; "key value")]
    #[test_case("" ; "empty")]
    #[test_case("a.example.com b.example.com" ; "space separated domains")]
    #[test_case("$(cmd);" ; "shell syntax is inert without a shell")]
    fn validate_argument_accepts(arg: &str) {
        assert!(validate_argument(arg, "arg").is_ok());
    }

    #[test_case("value\0" ; "null byte")]
    #[test_case("line1\nline2" ; "newline")]
    #[test_case("text\r" ; "carriage return")]
    fn validate_argument_rejects(arg: &str) {
        let err = validate_argument(arg, "arg").unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::ShellInjection { .. }));
    }

    #[test]
    fn validate_program_path_valid() {
        assert!(validate_program_path("/usr/bin/certbot").is_ok());
        assert!(validate_program_path("mkcert").is_ok());
    }

    #[test]
    fn validate_program_path_empty() {
        assert!(validate_program_path("").is_err());
    }

    #[test]
    fn validate_program_path_traversal() {
        let err = validate_program_path("../../../bin/sh").unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::PathTraversal { .. }));
    }

    #[test]
    fn validate_program_path_injection() {
        assert!(validate_program_path("program; rm -rf /").is_err());
        assert!(validate_program_path("program | cat /etc/passwd").is_err());
        assert!(validate_program_path("$(whoami)").is_err());
    }

    #[test]
    fn safe_command_builder() {
        let cmd = SafeCommand::new(AllowedProgram::Certbot)
            .arg("certonly")
            .arg("--standalone");

        assert!(!cmd.has_errors());
        assert_eq!(cmd.argv(), ["certonly", "--standalone"]);
        assert_eq!(cmd.program(), "certbot");
        assert_eq!(cmd.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn safe_command_with_invalid_arg() {
        let cmd = SafeCommand::new(AllowedProgram::Mkcert)
            .arg("--cert-file")
            .arg("cert\0.pem");

        assert!(cmd.has_errors());
        assert_eq!(cmd.errors().len(), 1);
        assert_eq!(cmd.argv().len(), 1);
    }

    #[test]
    fn safe_command_with_program_path() {
        let cmd = SafeCommand::new(AllowedProgram::Mkcert).with_program_path("/opt/bin/mkcert");
        assert_eq!(cmd.program(), "/opt/bin/mkcert");

        let cmd = SafeCommand::new(AllowedProgram::Mkcert).with_program_path("../../bin/sh");
        assert!(cmd.has_errors());
        assert_eq!(cmd.program(), "mkcert");
    }

    #[test]
    fn command_description() {
        let cmd = SafeCommand::new(AllowedProgram::Mkcert)
            .args(["--ecdsa", "example.com", "mtls.example.com"]);
        assert_eq!(cmd.description(), "mkcert --ecdsa example.com mtls.example.com");

        let bare = SafeCommand::new(AllowedProgram::Certbot);
        assert_eq!(bare.description(), "certbot");
    }

    #[test]
    fn allowed_program_as_str() {
        assert_eq!(AllowedProgram::Certbot.as_str(), "certbot");
        assert_eq!(AllowedProgram::Mkcert.to_string(), "mkcert");
    }

    #[test]
    fn command_output_methods() {
        let output = CommandOutput {
            stdout: b"hello".to_vec(),
            stderr: b"warning".to_vec(),
            exit_code: 0,
        };

        assert!(output.success());
        assert_eq!(output.stdout_lossy(), "hello");
        assert_eq!(output.stderr_lossy(), "warning");
    }

    #[test]
    fn non_zero_exit_reports_code() {
        let err = CommandError::non_zero_exit("certbot certonly", 2, "boom");
        assert_eq!(err.exit_code(), Some(2));
        assert_eq!(err.to_string(), "command 'certbot certonly' exited with code 2: boom");
        assert!(!err.is_validation_error());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_captures_output_and_exit_code() {
        let output = SafeCommand::new(AllowedProgram::Mkcert)
            .with_program_path("sh")
            .args(["-c", "echo out; echo err 1>&2; exit 3"])
            .run()
            .await
            .unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout_lossy().trim(), "out");
        assert_eq!(output.stderr_lossy().trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_checked_rejects_nonzero_exit() {
        let err = SafeCommand::new(AllowedProgram::Certbot)
            .with_program_path("sh")
            .args(["-c", "echo nope 1>&2; exit 4"])
            .run_checked()
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(4));
        assert!(err.to_string().contains("nope"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_times_out() {
        let err = SafeCommand::new(AllowedProgram::Certbot)
            .with_program_path("sh")
            .args(["-c", "sleep 5"])
            .timeout(Duration::from_millis(100))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Timeout { .. }));
    }

    #[tokio::test]
    async fn run_reports_spawn_failure() {
        let err = SafeCommand::new(AllowedProgram::Certbot)
            .with_program_path("/nonexistent/definitely-not-certbot")
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn run_refuses_invalid_arguments() {
        let err = SafeCommand::new(AllowedProgram::Certbot)
            .arg("bad\narg")
            .run()
            .await
            .unwrap_err();

        assert!(err.is_validation_error());
    }
}
