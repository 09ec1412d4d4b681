//! Application-facing log sink.
//!
//! Entity code writes free-text lines with `Sim::log`. They go to whichever
//! [`LogSink`] is installed, and are dropped when none is.

use tracing::info;

use crate::time::Time;

pub trait LogSink {
    fn log(&self, time: Time, message: &str);
}

impl<F: Fn(Time, &str)> LogSink for F {
    fn log(&self, time: Time, message: &str) {
        self(time, message)
    }
}

/// Forwards application lines to `tracing` under the `kairos::app` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, time: Time, message: &str) {
        info!(target: "kairos::app", time, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Sim;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tracing_test::traced_test;

    #[test]
    fn lines_are_dropped_without_a_sink() {
        let sim = Sim::new();
        sim.log("nobody listens");
    }

    #[test]
    fn closure_sink_sees_time_and_message() {
        let sim = Sim::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        sim.set_logger(move |time: Time, line: &str| sink.borrow_mut().push((time, line.to_owned())));
        sim.advance(4);
        sim.log("hello");
        sim.clear_logger();
        sim.log("ignored");
        assert_eq!(*seen.borrow(), vec![(4, "hello".to_owned())]);
    }

    #[traced_test]
    #[test]
    fn tracing_sink_forwards_to_subscriber() {
        let sim = Sim::new();
        sim.set_logger(TracingSink);
        sim.log("routed through tracing");
        assert!(logs_contain("routed through tracing"));
    }
}
