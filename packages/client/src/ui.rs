//! Terminal output helpers for the client.

use std::io::Write;

/// Redisplay the prompt after printing a line
pub fn redisplay_prompt(username: &str) {
    print!("{}> ", username);
    std::io::stdout().flush().ok();
}

/// Print a line above the prompt
pub fn show(line: &str, username: &str) {
    print!("\r{}\n", line);
    redisplay_prompt(username);
}
