//! Parsing of `scheme://user@host:port/` remote host descriptors.
//!
//! Only the authority (`user@host:port`) is read; scheme and path are
//! discarded. The parser is hand-written because descriptors may omit the
//! scheme (`//core@st01:22/` or plain `core@st01`), which URL parsers reject
//! as relative references.

use std::fmt;

use thiserror::Error;

const DEFAULT_SSH_PORT: u16 = 22;

/// Errors raised while parsing a host descriptor.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HostParseError {
    /// Raised when the descriptor is empty or only whitespace.
    #[error("host descriptor must not be empty")]
    Empty,
    /// Raised when the descriptor names no host.
    #[error("host descriptor `{descriptor}` does not name a host")]
    MissingHost {
        /// Descriptor as supplied.
        descriptor: String,
    },
    /// Raised when the user part before `@` is empty.
    #[error("host descriptor `{descriptor}` has an empty user")]
    EmptyUser {
        /// Descriptor as supplied.
        descriptor: String,
    },
    /// Raised when the port is not a valid non-zero TCP port.
    #[error("host descriptor `{descriptor}` has an invalid port `{port}`")]
    InvalidPort {
        /// Descriptor as supplied.
        descriptor: String,
        /// Port text that failed to parse.
        port: String,
    },
    /// Raised when an IPv6 literal is not enclosed in brackets.
    #[error("host descriptor `{descriptor}` must bracket IPv6 addresses, e.g. `[::1]`")]
    UnbracketedIpv6 {
        /// Descriptor as supplied.
        descriptor: String,
    },
}

/// SSH endpoint the executor connects to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteHost {
    /// Login user.
    pub user: String,
    /// Hostname or address, without IPv6 brackets.
    pub host: String,
    /// SSH port.
    pub port: u16,
}

impl RemoteHost {
    /// Parses a descriptor such as `ssh://core@st01.example.com:22/`.
    ///
    /// The scheme and trailing path are optional, so `//core@st01:2222/` and
    /// `core@st01` are accepted too. `default_user` applies when the
    /// descriptor carries no user, and the port defaults to 22.
    ///
    /// # Errors
    ///
    /// Returns [`HostParseError`] when the descriptor is malformed.
    pub fn parse(descriptor: &str, default_user: &str) -> Result<Self, HostParseError> {
        let trimmed = descriptor.trim();
        if trimmed.is_empty() {
            return Err(HostParseError::Empty);
        }

        let without_scheme = match trimmed.split_once("://") {
            Some((_, rest)) => rest,
            None => trimmed.strip_prefix("//").unwrap_or(trimmed),
        };
        let authority = without_scheme.split('/').next().unwrap_or_default();

        let (user, host_port) = match authority.rsplit_once('@') {
            Some((user, _)) if user.is_empty() => {
                return Err(HostParseError::EmptyUser {
                    descriptor: trimmed.to_owned(),
                });
            }
            Some((user, rest)) => (user.to_owned(), rest),
            None => (default_user.to_owned(), authority),
        };

        let (host, port_text) = split_host_port(host_port, trimmed)?;
        if host.is_empty() {
            return Err(HostParseError::MissingHost {
                descriptor: trimmed.to_owned(),
            });
        }

        let port = match port_text {
            None => DEFAULT_SSH_PORT,
            Some(text) => parse_port(text, trimmed)?,
        };

        Ok(Self {
            user,
            host: host.to_owned(),
            port,
        })
    }

    /// Returns the `user@host` login argument for `ssh`.
    #[must_use]
    pub fn login(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Returns the `user@host:path` destination argument for `rsync`.
    #[must_use]
    pub fn rsync_target(&self, path: &str) -> String {
        if self.host.contains(':') {
            format!("{}@[{}]:{path}", self.user, self.host)
        } else {
            format!("{}@{}:{path}", self.user, self.host)
        }
    }
}

impl fmt::Display for RemoteHost {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(formatter, "{}@[{}]:{}", self.user, self.host, self.port)
        } else {
            write!(formatter, "{}@{}:{}", self.user, self.host, self.port)
        }
    }
}

fn split_host_port<'a>(
    host_port: &'a str,
    descriptor: &str,
) -> Result<(&'a str, Option<&'a str>), HostParseError> {
    if let Some(bracketed) = host_port.strip_prefix('[') {
        let Some((host, rest)) = bracketed.split_once(']') else {
            return Err(HostParseError::MissingHost {
                descriptor: descriptor.to_owned(),
            });
        };
        return Ok((host, rest.strip_prefix(':')));
    }

    match host_port.split_once(':') {
        Some((_, port)) if port.contains(':') => Err(HostParseError::UnbracketedIpv6 {
            descriptor: descriptor.to_owned(),
        }),
        Some((host, port)) => Ok((host, Some(port))),
        None => Ok((host_port, None)),
    }
}

fn parse_port(text: &str, descriptor: &str) -> Result<u16, HostParseError> {
    match text.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(HostParseError::InvalidPort {
            descriptor: descriptor.to_owned(),
            port: text.to_owned(),
        }),
    }
}
