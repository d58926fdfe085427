//! Shared utilities.

use std::borrow::Cow;
use std::path::Path;

/// Render a program and its arguments as a single shell-quoted line.
///
/// Only used for log output; commands are never executed through a shell.
pub fn render_command_line<S: AsRef<str>>(program: &Path, args: &[S]) -> String {
    let mut line = shell_escape::escape(program.to_string_lossy()).into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&shell_escape::escape(Cow::Borrowed(arg.as_ref())));
    }
    line
}
