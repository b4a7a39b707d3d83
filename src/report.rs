//! Operator-facing console output.
//!
//! Library code never prints; the binary hands a [`Reporter`] to its
//! dispatch layer instead. Colour is chosen when the reporter is built, so
//! there is no process-wide colour switch to initialise.

use colored::{Color, Colorize};

/// Sink for operator-facing messages.
pub trait Reporter {
    /// An operation completed.
    fn report_success(&self, msg: &str);
    /// An operation failed.
    fn report_error(&self, msg: &str);
    /// Neutral output (listings, status payloads).
    fn report_info(&self, msg: &str);
}

/// Writes success and info to stdout and errors to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
    color: bool,
}

impl ConsoleReporter {
    /// `color = false` prints plain text.
    pub fn new(color: bool) -> Self {
        ConsoleReporter { color }
    }

    fn paint(&self, msg: &str, color: Color) -> String {
        if self.color {
            msg.color(color).to_string()
        } else {
            msg.to_string()
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report_success(&self, msg: &str) {
        println!("{}", self.paint(msg, Color::Green));
    }

    fn report_error(&self, msg: &str) {
        eprintln!("{}", self.paint(msg, Color::Red));
    }

    fn report_info(&self, msg: &str) {
        println!("{}", self.paint(msg, Color::Cyan));
    }
}
