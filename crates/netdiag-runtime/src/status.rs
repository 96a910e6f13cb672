use crate::traits::{StatusReporter, StepOutcome};
use std::io::Write;
use std::sync::Mutex;
use std::time::Instant;
use tracing::info;

/// Prints each step's name when it starts and a line prefixed with a check
/// or cross mark when it finishes
pub struct ConsoleStatus {
    out: Mutex<Box<dyn Write + Send>>,
    started: Mutex<Option<Instant>>,
}

impl ConsoleStatus {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }

    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
            started: Mutex::new(None),
        }
    }

    fn print_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();
    }
}

impl Default for ConsoleStatus {
    fn default() -> Self {
        Self::new()
    }
}

fn mark(outcome: StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Success => "\u{2705}",
        StepOutcome::Failure => "\u{274c}",
    }
}

impl StatusReporter for ConsoleStatus {
    fn start(&self, step: &str) {
        info!("{}...", step);
        self.print_line(&format!("{}...", step));
        *self.started.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    fn stop(&self, step: &str, outcome: StepOutcome) {
        if let Some(started) = self.started.lock().unwrap_or_else(|e| e.into_inner()).take() {
            info!("{} finished in {:?}", step, started.elapsed());
        }
        self.print_line(&format!("{} {}", mark(outcome), step));
    }
}

/// Discards all progress output
pub struct SilentStatus;

impl StatusReporter for SilentStatus {
    fn start(&self, _step: &str) {}

    fn stop(&self, _step: &str, _outcome: StepOutcome) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_step_name_printed_on_start() {
        let buf = SharedBuf::default();
        let status = ConsoleStatus::with_writer(buf.clone());

        status.start("Checking CNI");
        assert_eq!(buf.contents(), "Checking CNI...\n");

        status.stop("Checking CNI", StepOutcome::Failure);
        assert_eq!(buf.contents(), "Checking CNI...\n❌ Checking CNI\n");
    }

    #[test]
    fn test_marks() {
        assert_eq!(mark(StepOutcome::Success), "✅");
        assert_eq!(mark(StepOutcome::Failure), "❌");
    }
}
