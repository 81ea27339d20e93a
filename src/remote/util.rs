//! Utility functions for path manipulation and shell quoting.

use std::borrow::Cow;

use shell_escape::unix::escape;

/// Expands a leading `~/` prefix to the user's home directory.
///
/// If the `HOME` environment variable is not set, the function returns the
/// input string unchanged.
///
/// # Examples
///
/// ```
/// # use volsnap::remote::expand_tilde;
/// assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

/// Shell-escapes a single word for interpolation into a remote command.
#[must_use]
pub fn quote(value: &str) -> Cow<'_, str> {
    escape(value.into())
}
