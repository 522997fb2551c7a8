//! Fatal error boundary for process entry points.
//!
//! Library functions return `Result`. Binaries route the top-level call
//! through [`run_guarded`] so any failure ends the process the same way.

use std::fmt::Display;

/// Run `operation`, returning its value on success.
///
/// On failure a single `Error: …` line is written to stderr and the process
/// exits with status 1.
pub fn run_guarded<T, E: Display>(operation: impl FnOnce() -> Result<T, E>) -> T {
    match operation() {
        Ok(value) => value,
        Err(err) => exit_with_error(err),
    }
}

/// Print `err` as one line on stderr and exit with status 1
pub fn exit_with_error(err: impl Display) -> ! {
    let message = err.to_string();
    eprintln!("Error: {}", single_line(&message));
    std::process::exit(1);
}

fn single_line(message: &str) -> String {
    message.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_guarded_returns_value() {
        let value = run_guarded(|| Ok::<_, std::io::Error>(42));
        assert_eq!(value, 42);
    }

    #[test]
    fn test_single_line_joins_lines() {
        assert_eq!(single_line("unexpected token\n  at line 3\n"), "unexpected token at line 3");
        assert_eq!(single_line("plain"), "plain");
    }
}
