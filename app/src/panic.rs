//! Process panic hook for the binary.
//!
//! Logs the panic through tracing, then hands over to the previous hook.
//! The fault-boundary trace hook is installed underneath so contained panics
//! still carry their backtrace.

use std::any::Any;
use std::panic;
use std::sync::Once;

static INSTALLED: Once = Once::new();

pub fn install() {
    rl_types::install_trace_hook();
    INSTALLED.call_once(|| {
        let next = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();
            tracing::error!(
                thread = thread.name().unwrap_or("<unnamed>"),
                %location,
                "panic: {}",
                payload_message(info.payload())
            );
            next(info);
        }));
    });
}

fn payload_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_message_reads_both_string_kinds() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(payload_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(payload_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(payload_message(boxed.as_ref()), "<non-string payload>");
    }
}
