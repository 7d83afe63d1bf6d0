//! Fault boundary: converts a panic inside a public operation into a
//! [`RuntimeFault`] value instead of letting it unwind into the caller.
//!
//! A chained panic hook records the backtrace at the panic site in a
//! thread-local slot; [`boundary`] picks it up after `catch_unwind` returns.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use thiserror::Error;

thread_local! {
    static LAST_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static TRACE_HOOK: Once = Once::new();

/// A recovered panic, with the trace captured where it happened.
#[derive(Debug, Clone, Error)]
#[error("panic in {operation}: {message}\n{trace}")]
pub struct RuntimeFault {
    operation: &'static str,
    message: String,
    trace: String,
}

impl RuntimeFault {
    pub fn new(operation: &'static str, message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            trace: trace.into(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &str {
        &self.trace
    }
}

/// Install the trace-recording panic hook. Idempotent; the previously
/// installed hook still runs after the trace is recorded.
pub fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let next = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            LAST_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            next(info);
        }));
    });
}

/// Run `op`, turning any panic into `E::from(RuntimeFault)`.
///
/// Declared errors pass through untouched. The fault is logged at `error`
/// level before it is returned.
pub fn boundary<T, E, F>(operation: &'static str, op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<RuntimeFault>,
{
    install_trace_hook();
    LAST_TRACE.with(|slot| slot.borrow_mut().take());

    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => result,
        Err(payload) => {
            let trace = LAST_TRACE
                .with(|slot| slot.borrow_mut().take())
                .unwrap_or_else(|| Backtrace::force_capture().to_string());
            let fault = RuntimeFault::new(operation, panic_message(payload.as_ref()), trace);
            tracing::error!(
                operation,
                message = %fault.message(),
                "recovered panic at operation boundary"
            );
            Err(fault.into())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
