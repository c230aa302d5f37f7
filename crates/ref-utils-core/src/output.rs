//! Colored verdict lines on stdout

use colored::{ColoredString, Colorize};

/// Severity of a verdict line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Green, something passed
    Ok,
    /// Yellow, worth a look
    Warn,
    /// Red, something failed
    Err,
}

/// Wrap `message` in the ANSI color for `level`
#[must_use]
pub fn paint(level: Level, message: &str) -> ColoredString {
    match level {
        Level::Ok => message.green(),
        Level::Warn => message.yellow(),
        Level::Err => message.red(),
    }
}

/// Print a green line
pub fn print_ok(message: impl AsRef<str>) {
    println!("{}", paint(Level::Ok, message.as_ref()));
}

/// Print a yellow line
pub fn print_warn(message: impl AsRef<str>) {
    println!("{}", paint(Level::Warn, message.as_ref()));
}

/// Print a red line
pub fn print_err(message: impl AsRef<str>) {
    println!("{}", paint(Level::Err, message.as_ref()));
}

/// Indent every line of `text` by four spaces
#[must_use]
pub fn indent_block(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_ansi_colors() {
        colored::control::set_override(true);
        assert_eq!(paint(Level::Ok, "ok").to_string(), "\u{1b}[32mok\u{1b}[0m");
        assert_eq!(paint(Level::Warn, "warn").to_string(), "\u{1b}[33mwarn\u{1b}[0m");
        assert_eq!(paint(Level::Err, "err").to_string(), "\u{1b}[31merr\u{1b}[0m");
    }

    #[test]
    fn indent_block_prefixes_each_line() {
        assert_eq!(
            indent_block("a.py:1:0: C0114\na.py:2:0: W0611"),
            "    a.py:1:0: C0114\n    a.py:2:0: W0611"
        );
        assert_eq!(indent_block(""), "");
    }
}
