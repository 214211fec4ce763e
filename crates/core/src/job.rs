use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stacktrace::Stacktrace;

/// Opaque identifier handed out by `submit`, unique per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Allocate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First eight hex digits, for thread names and log prefixes.
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

// ── JobError ─────────────────────────────────────────────────────────

/// A failure raised by a job, carried back to the submitter as data.
///
/// `kind` names the failure class (`"ValueError"`, `"RuntimeError"`,
/// `"Panic"`, ...) and `message` the detail. Two errors compare equal when
/// both match; the printable stacktrace and the identity token are ignored.
///
/// The token identifies one particular raised error. The
/// [`StacktraceCarrier`](crate::StacktraceCarrier) uses it to recognise, at
/// the top-level panic hook, the error whose context it captured last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    kind: String,
    message: String,
    #[serde(default)]
    stacktrace: Option<Stacktrace>,
    token: Uuid,
}

impl JobError {
    pub const RUNTIME: &'static str = "RuntimeError";
    pub const PANIC: &'static str = "Panic";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stacktrace: None,
            token: Uuid::new_v4(),
        }
    }

    /// A generic `RuntimeError`.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(Self::RUNTIME, message)
    }

    /// The error synthesized for a worker that exited abnormally without
    /// reporting anything itself.
    pub fn exit_code(code: i32) -> Self {
        Self::runtime(format!("exit code = {code}"))
    }

    /// Convert a panic payload.
    ///
    /// A payload that already is a `JobError` (re-raised through
    /// [`StacktraceCarrier::raise`](crate::StacktraceCarrier::raise)) is
    /// returned unchanged. String payloads become a `Panic` error.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        if let Some(error) = payload.downcast_ref::<JobError>() {
            return error.clone();
        }
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(Self::PANIC, message)
    }

    /// Attach printable context.
    pub fn with_stacktrace(mut self, stacktrace: Stacktrace) -> Self {
        self.stacktrace = Some(stacktrace);
        self
    }

    /// Attach printable context unless the error already carries some.
    pub fn attach_stacktrace(mut self, stacktrace: Option<Stacktrace>) -> Self {
        if self.stacktrace.is_none() {
            self.stacktrace = stacktrace;
        }
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stacktrace(&self) -> Option<&Stacktrace> {
        self.stacktrace.as_ref()
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// One-line `kind: message` summary.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.kind, self.message)
    }

    /// Full diagnostic text: the stacktrace printout, if any, followed by
    /// the one-line summary.
    pub fn report(&self) -> String {
        let mut out = String::new();
        if let Some(stacktrace) = &self.stacktrace {
            for line in stacktrace.printout() {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out.push_str(&self.summary());
        out
    }
}

impl PartialEq for JobError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for JobError {}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for JobError {}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        Self::new("IOError", err.to_string())
    }
}

impl From<String> for JobError {
    fn from(message: String) -> Self {
        Self::runtime(message)
    }
}

impl From<&str> for JobError {
    fn from(message: &str) -> Self {
        Self::runtime(message)
    }
}

// ── JobResult ────────────────────────────────────────────────────────

/// Outcome of one job: exactly one is produced per submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobResult<T> {
    Success { value: T },
    Error { error: JobError },
}

impl<T> JobResult<T> {
    pub fn success(value: T) -> Self {
        Self::Success { value }
    }

    pub fn error(error: JobError) -> Self {
        Self::Error { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value } => Some(value),
            Self::Error { .. } => None,
        }
    }

    pub fn err(&self) -> Option<&JobError> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, JobError> {
        match self {
            Self::Success { value } => Ok(value),
            Self::Error { error } => Err(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> JobResult<U> {
        match self {
            Self::Success { value } => JobResult::Success { value: f(value) },
            Self::Error { error } => JobResult::Error { error },
        }
    }
}

impl<T> From<Result<T, JobError>> for JobResult<T> {
    fn from(result: Result<T, JobError>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::error(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_are_distinct() {
        let ids: HashSet<JobId> = (0..1000).map(|_| JobId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn short_id_is_prefix() {
        let id = JobId::new();
        assert_eq!(id.short().len(), 8);
        assert!(id.as_uuid().simple().to_string().starts_with(&id.short()));
    }

    #[test]
    fn equality_ignores_token_and_stacktrace() {
        let a = JobError::new("ValueError", "boom");
        let b = JobError::new("ValueError", "boom")
            .with_stacktrace(Stacktrace::from_stderr("somewhere"));
        assert_ne!(a.token(), b.token());
        assert_eq!(a, b);
        assert_ne!(a, JobError::new("ValueError", "bang"));
        assert_ne!(a, JobError::new("TypeError", "boom"));
    }

    #[test]
    fn exit_code_message() {
        let err = JobError::exit_code(9);
        assert!(err.is_kind(JobError::RUNTIME));
        assert_eq!(err.message(), "exit code = 9");
        assert_eq!(err.to_string(), "RuntimeError: exit code = 9");
    }

    #[test]
    fn from_panic_payloads() {
        let static_str: Box<dyn Any + Send> = Box::new("static boom");
        assert_eq!(JobError::from_panic(static_str.as_ref()).message(), "static boom");

        let owned: Box<dyn Any + Send> = Box::new(format!("boom {}", 7));
        let err = JobError::from_panic(owned.as_ref());
        assert!(err.is_kind(JobError::PANIC));
        assert_eq!(err.message(), "boom 7");

        let original = JobError::new("ValueError", "raised");
        let token = original.token();
        let reraised: Box<dyn Any + Send> = Box::new(original);
        let err = JobError::from_panic(reraised.as_ref());
        assert_eq!(err.token(), token);
        assert!(err.is_kind("ValueError"));

        let opaque: Box<dyn Any + Send> = Box::new(42u8);
        assert!(JobError::from_panic(opaque.as_ref()).is_kind(JobError::PANIC));
    }

    #[test]
    fn attach_keeps_existing_stacktrace() {
        let first = Stacktrace::from_stderr("first");
        let err = JobError::runtime("x")
            .with_stacktrace(first.clone())
            .attach_stacktrace(Some(Stacktrace::from_stderr("second")));
        assert_eq!(err.stacktrace(), Some(&first));
    }

    #[test]
    fn report_lists_context_before_summary() {
        let err = JobError::new("ValueError", "boom")
            .with_stacktrace(Stacktrace::from_stderr("  at job 3"));
        let report = err.report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines, vec!["Stacktrace:", "  at job 3", "ValueError: boom"]);
    }

    #[test]
    fn result_accessors() {
        let ok: JobResult<u32> = JobResult::success(4);
        assert!(ok.is_success());
        assert_eq!(ok.value(), Some(&4));
        assert_eq!(ok.clone().map(|v| v * 2).into_result(), Ok(8));

        let failed: JobResult<u32> = Err(JobError::runtime("nope")).into();
        assert!(failed.is_error());
        assert_eq!(failed.err().map(JobError::message), Some("nope"));
        assert!(failed.into_result().is_err());
    }
}
