//! Printable failure context that survives a worker boundary.
//!
//! A Rust backtrace only exists on the thread that panicked, at the moment
//! it panicked. To keep a job failure diagnosable once it has been handed
//! back to the manager (possibly from another process), the context is
//! turned into plain text lines right at the panic site:
//!
//! - **in-thread**: the panic hook installed by [`StacktraceCarrier::enable`]
//!   captures the backtrace while the panicking frame is still live and
//!   stores it as lines for [`capture_panic`] to pick up;
//! - **cross-process**: those lines travel inside the serialized
//!   [`JobError`], and at the manager they stand in for the native
//!   backtrace when the error is displayed or re-raised.
//!
//! The carrier is an explicit context object. The panic hook it installs is
//! process-wide state, installed and removed only through
//! [`StacktraceCarrier::enable`] / [`StacktraceCarrier::disable`].

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::job::JobError;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

const BACKTRACE_HEADER: &str = "Backtrace (most recent call first):";
const STDERR_HEADER: &str = "Stacktrace:";

// ── Stacktrace ───────────────────────────────────────────────────────

/// Failure context reduced to printable lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stacktrace {
    header: String,
    lines: Vec<String>,
}

impl Stacktrace {
    /// Render a live backtrace. Must be called on the failing thread.
    pub fn from_backtrace(backtrace: &Backtrace) -> Self {
        Self::from_lines(backtrace.to_string().lines().map(str::to_owned).collect())
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            header: BACKTRACE_HEADER.to_string(),
            lines,
        }
    }

    /// Context that only exists as captured error output.
    pub fn from_stderr(message: impl Into<String>) -> Self {
        Self {
            header: STDERR_HEADER.to_string(),
            lines: vec![message.into()],
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Header followed by the context lines.
    pub fn printout(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.lines.len() + 1);
        out.push(self.header.clone());
        out.extend(self.lines.iter().cloned());
        out
    }
}

impl fmt::Display for Stacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)?;
        for line in &self.lines {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}

// ── Panic capture ────────────────────────────────────────────────────

thread_local! {
    /// `Some` while this thread runs inside `capture_panic`. The inner value
    /// is the context recorded by the hook at the panic site.
    static CAPTURE: RefCell<Option<Option<Stacktrace>>> = const { RefCell::new(None) };
}

/// Run `f`, catching a panic together with the context captured at the
/// panic site.
///
/// The context is only available while the carrier hook is enabled;
/// otherwise the second element is `None` and the default hook reports the
/// panic as usual.
pub fn capture_panic<R>(f: impl FnOnce() -> R) -> (std::thread::Result<R>, Option<Stacktrace>) {
    let outer = CAPTURE.with(|slot| slot.replace(Some(None)));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    let captured = CAPTURE.with(|slot| slot.replace(outer)).flatten();

    match outcome {
        Ok(value) => (Ok(value), None),
        Err(payload) => (Err(payload), captured),
    }
}

/// Record context if the panicking thread is inside `capture_panic`.
fn record_in_scope() -> bool {
    CAPTURE
        .try_with(|slot| match slot.try_borrow_mut() {
            Ok(mut slot) => match slot.as_mut() {
                Some(trace) => {
                    *trace = Some(Stacktrace::from_backtrace(&Backtrace::force_capture()));
                    true
                }
                None => false,
            },
            Err(_) => false,
        })
        .unwrap_or(false)
}

// ── StacktraceCarrier ────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct LastException {
    token: Uuid,
    printout: Vec<String>,
}

/// Holds the last failure whose context must stay printable, and owns the
/// top-level panic hook that prints it.
///
/// Cloning yields another handle to the same slot.
#[derive(Debug, Clone, Default)]
pub struct StacktraceCarrier {
    last: Arc<Mutex<Option<LastException>>>,
}

struct InstalledHook {
    previous: Arc<PanicHook>,
}

static INSTALLED: Mutex<Option<InstalledHook>> = Mutex::new(None);

fn installed() -> MutexGuard<'static, Option<InstalledHook>> {
    INSTALLED.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StacktraceCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<LastException>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember `error` and its printable context as the last failure.
    pub fn set_last_exception(&self, error: &JobError) {
        let printout = error
            .stacktrace()
            .map(Stacktrace::printout)
            .unwrap_or_default();
        *self.slot() = Some(LastException {
            token: error.token(),
            printout,
        });
    }

    /// Identity token and printout of the last recorded failure.
    pub fn exc_info(&self) -> Option<(Uuid, Vec<String>)> {
        self.slot()
            .as_ref()
            .map(|last| (last.token, last.printout.clone()))
    }

    pub fn clear(&self) {
        *self.slot() = None;
    }

    /// Record `error` as the last failure and re-raise it as a panic whose
    /// payload is the error itself.
    pub fn raise(&self, error: JobError) -> ! {
        self.set_last_exception(&error);
        panic::panic_any(error)
    }

    /// Install the carrier's panic hook. Returns `false` if a carrier hook
    /// is already installed, in which case nothing changes.
    pub fn enable(&self) -> bool {
        let mut installed = installed();
        if installed.is_some() {
            return false;
        }

        let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
        let chained = Arc::clone(&previous);
        let carrier = self.clone();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            report_panic(&carrier, &chained, info)
        }));

        *installed = Some(InstalledHook { previous });
        self.clear();
        debug!("stacktrace hook installed");
        true
    }

    /// Restore the hook that was active before [`enable`](Self::enable).
    /// Returns `false` if no carrier hook was installed.
    pub fn disable(&self) -> bool {
        let Some(hook) = installed().take() else {
            return false;
        };

        let previous = hook.previous;
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| (**previous)(info)));
        self.clear();
        debug!("stacktrace hook removed");
        true
    }

    pub fn is_enabled() -> bool {
        installed().is_some()
    }
}

fn report_panic(carrier: &StacktraceCarrier, previous: &PanicHook, info: &PanicHookInfo<'_>) {
    if record_in_scope() {
        return;
    }

    if let Some(error) = info.payload().downcast_ref::<JobError>() {
        if let Some((token, printout)) = carrier.exc_info() {
            if token == error.token() {
                let mut report = String::new();
                for line in printout {
                    report.push_str(&line);
                    report.push('\n');
                }
                report.push_str(&error.summary());
                eprintln!("{report}");
                return;
            }
        }
    }

    previous(info);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printout_starts_with_header() {
        let trace = Stacktrace::from_lines(vec!["frame 0".into(), "frame 1".into()]);
        assert_eq!(trace.header(), BACKTRACE_HEADER);
        assert_eq!(trace.printout(), vec![BACKTRACE_HEADER, "frame 0", "frame 1"]);
        assert_eq!(trace.to_string(), format!("{BACKTRACE_HEADER}\nframe 0\nframe 1"));
    }

    #[test]
    fn stderr_form_keeps_message() {
        let trace = Stacktrace::from_stderr("worker said: boom");
        assert_eq!(trace.header(), STDERR_HEADER);
        assert_eq!(trace.lines(), ["worker said: boom".to_string()]);
    }

    #[test]
    fn capture_passes_values_through() {
        let (outcome, trace) = capture_panic(|| 6 * 7);
        assert_eq!(outcome.unwrap(), 42);
        assert!(trace.is_none());
    }

    #[test]
    fn capture_catches_panics() {
        let (outcome, _trace) = capture_panic(|| -> u8 { panic!("job exploded") });
        let payload = outcome.unwrap_err();
        assert_eq!(JobError::from_panic(payload.as_ref()).message(), "job exploded");
    }

    #[test]
    fn last_exception_tracks_identity() {
        let carrier = StacktraceCarrier::new();
        assert!(carrier.exc_info().is_none());

        let err = JobError::new("ValueError", "boom")
            .with_stacktrace(Stacktrace::from_stderr("line 1"));
        carrier.set_last_exception(&err);

        let (token, printout) = carrier.exc_info().unwrap();
        assert_eq!(token, err.token());
        assert_eq!(printout, vec![STDERR_HEADER, "line 1"]);

        let other = carrier.clone();
        other.clear();
        assert!(carrier.exc_info().is_none());
    }

    #[test]
    fn raise_panics_with_the_error() {
        let carrier = StacktraceCarrier::new();
        let err = JobError::new("ValueError", "reraised");
        let token = err.token();

        let (outcome, _) = capture_panic(|| -> u8 { carrier.raise(err) });
        let payload = outcome.unwrap_err();
        let raised = payload.downcast_ref::<JobError>().unwrap();
        assert_eq!(raised.token(), token);
        assert_eq!(carrier.exc_info().unwrap().0, token);
    }

    // The hook is process-wide, so every check that toggles it lives here.
    #[test]
    fn hook_lifecycle() {
        let carrier = StacktraceCarrier::new();

        assert!(carrier.enable());
        assert!(!carrier.enable(), "second enable must be a no-op");
        assert!(StacktraceCarrier::is_enabled());

        let (outcome, trace) = capture_panic(|| -> u8 { panic!("with context") });
        assert!(outcome.is_err());
        let trace = trace.expect("hook records context inside capture_panic");
        assert_eq!(trace.header(), BACKTRACE_HEADER);
        assert!(!trace.lines().is_empty());

        assert!(carrier.disable());
        assert!(!carrier.disable(), "second disable must be a no-op");
        assert!(!StacktraceCarrier::is_enabled());
        assert!(carrier.exc_info().is_none());
    }
}
