//! ANSI SGR helpers.
//!
//! Covers the small set of escape sequences the rest of the crate's demos
//! and tests reach for: reset, bold, and the eight standard foreground
//! colours. Not a terminal-capability library -- callers who need cursor
//! positioning or 256-colour ramps should reach for a dedicated crate.

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const UNDERLINE: &str = "\x1b[4m";

pub const BLACK: &str = "\x1b[30m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";
pub const WHITE: &str = "\x1b[37m";

/// Wraps `text` in `code` and a trailing reset.
pub fn colorize(code: &str, text: &str) -> String {
    format!("{code}{text}{RESET}")
}

pub fn red(text: &str) -> String {
    colorize(RED, text)
}

pub fn green(text: &str) -> String {
    colorize(GREEN, text)
}

pub fn yellow(text: &str) -> String {
    colorize(YELLOW, text)
}

pub fn bold(text: &str) -> String {
    colorize(BOLD, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_and_resets() {
        assert_eq!(red("x"), "\x1b[31mx\x1b[0m");
        assert_eq!(bold("y"), "\x1b[1my\x1b[0m");
    }
}
