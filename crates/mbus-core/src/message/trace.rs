//! Append-only trace of decisions attached to a message.

use serde::Serialize;
use std::fmt;

/// Ordered log of notes recorded while a message travels through the bus.
/// Surfaced to the caller together with the terminal reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Trace {
    lines: Vec<String>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line.
    pub fn add(&mut self, note: impl Into<String>) {
        self.lines.push(note.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True when any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Format a delay in seconds with at most microsecond precision and no
/// trailing zeros (`0`, `0.01`, `1.5`).
pub fn format_seconds(secs: f64) -> String {
    let fixed = format!("{:.6}", secs);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_string(),
        s => s.to_string(),
    }
}

/// The trace line recorded when a message is scheduled for its `retry`-th resend.
pub fn retry_line(retry: u32, delay_secs: f64) -> String {
    format!("retry {} in {}", retry, format_seconds(delay_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_seconds_strips_trailing_zeros() {
        assert_eq!(format_seconds(0.0), "0");
        assert_eq!(format_seconds(0.01), "0.01");
        assert_eq!(format_seconds(1.0), "1");
        assert_eq!(format_seconds(10.0), "10");
        assert_eq!(format_seconds(1.25), "1.25");
    }

    #[test]
    fn format_seconds_hides_float_noise() {
        // 0.01 * 3 is 0.030000000000000002 in binary floating point.
        assert_eq!(format_seconds(0.01 * 3.0), "0.03");
        assert_eq!(format_seconds(3.0 / 50.0), "0.06");
    }

    #[test]
    fn retry_line_format() {
        assert_eq!(retry_line(1, 0.01), "retry 1 in 0.01");
        assert_eq!(retry_line(1, 0.0), "retry 1 in 0");
    }

    #[test]
    fn display_joins_lines() {
        let mut t = Trace::new();
        t.add("first");
        t.add(retry_line(1, 0.5));
        assert_eq!(t.to_string(), "first\nretry 1 in 0.5");
        assert!(t.contains("retry 1 in 0.5"));
        assert!(!t.contains("retry 2"));
        assert_eq!(t.len(), 2);
    }
}
