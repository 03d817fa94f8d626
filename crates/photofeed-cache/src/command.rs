//! Typed cache commands and replies.
//!
//! Only the hash and list commands the feed needs are modelled. Every backend receives commands as
//! [`Command`] values and answers with [`Reply`] values, so the typed caches never look at raw
//! protocol data.

use std::fmt;

use crate::error::{CacheError, Result};

/// A single cache command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set a hash field only if it does not exist. Replies `1` if it was set.
    HSetNx {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
        /// Field value.
        value: String,
    },
    /// Set a hash field. Replies `1` if the field is new.
    HSet {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
        /// Field value.
        value: String,
    },
    /// Delete a hash field. Replies the number of removed fields.
    HDel {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
    },
    /// Increment an integer hash field. Replies the new value.
    HIncrBy {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
        /// Increment.
        delta: i64,
    },
    /// Read a hash field.
    HGet {
        /// Hash key.
        key: String,
        /// Field name.
        field: String,
    },
    /// Read several hash fields; absent ones come back as nil.
    HMGet {
        /// Hash key.
        key: String,
        /// Field names.
        fields: Vec<String>,
    },
    /// Number of fields in a hash.
    HLen {
        /// Hash key.
        key: String,
    },
    /// Push values onto the head of a list, one after another. Replies the new length.
    LPush {
        /// List key.
        key: String,
        /// Values; the last one ends up at the head.
        values: Vec<String>,
    },
    /// Keep only the inclusive index range `start..=stop` of a list.
    LTrim {
        /// List key.
        key: String,
        /// First index kept.
        start: i64,
        /// Last index kept; negative counts from the tail.
        stop: i64,
    },
    /// Read the inclusive index range `start..=stop` of a list.
    LRange {
        /// List key.
        key: String,
        /// First index.
        start: i64,
        /// Last index; negative counts from the tail.
        stop: i64,
    },
    /// Length of a list.
    LLen {
        /// List key.
        key: String,
    },
    /// Liveness check.
    Ping,
}

impl Command {
    /// The protocol name of the command.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::HSetNx { .. } => "HSETNX",
            Self::HSet { .. } => "HSET",
            Self::HDel { .. } => "HDEL",
            Self::HIncrBy { .. } => "HINCRBY",
            Self::HGet { .. } => "HGET",
            Self::HMGet { .. } => "HMGET",
            Self::HLen { .. } => "HLEN",
            Self::LPush { .. } => "LPUSH",
            Self::LTrim { .. } => "LTRIM",
            Self::LRange { .. } => "LRANGE",
            Self::LLen { .. } => "LLEN",
            Self::Ping => "PING",
        }
    }
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Absent value.
    Nil,
    /// Integer reply.
    Int(i64),
    /// Bulk string reply.
    Data(String),
    /// Status reply such as `OK` or `PONG`.
    Status(String),
    /// Array reply.
    Array(Vec<Reply>),
    /// Error reply for this command only; the rest of the pipeline is unaffected.
    Error(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Int(n) => write!(f, "(integer) {n}"),
            Self::Data(s) => write!(f, "{s:?}"),
            Self::Status(s) => f.write_str(s),
            Self::Array(items) => write!(f, "array of {}", items.len()),
            Self::Error(e) => write!(f, "(error) {e}"),
        }
    }
}

impl Reply {
    fn unexpected(self, command: &'static str) -> CacheError {
        match self {
            Self::Error(message) => CacheError::Command(message),
            other => CacheError::UnexpectedReply {
                command,
                reply: other.to_string(),
            },
        }
    }

    /// Decode an integer reply.
    ///
    /// # Errors
    ///
    /// Returns an error for error replies and non-integer replies.
    pub fn into_int(self, command: &'static str) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(n),
            other => Err(other.unexpected(command)),
        }
    }

    /// Decode an optional string reply.
    ///
    /// # Errors
    ///
    /// Returns an error for error replies and non-string replies.
    pub fn into_opt_string(self, command: &'static str) -> Result<Option<String>> {
        match self {
            Self::Nil => Ok(None),
            Self::Data(s) | Self::Status(s) => Ok(Some(s)),
            other => Err(other.unexpected(command)),
        }
    }

    /// Decode an array of optional strings, as returned by `HMGET`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply or any element has the wrong shape.
    pub fn into_opt_strings(self, command: &'static str) -> Result<Vec<Option<String>>> {
        match self {
            Self::Array(items) => items
                .into_iter()
                .map(|item| item.into_opt_string(command))
                .collect(),
            other => Err(other.unexpected(command)),
        }
    }

    /// Decode an array of strings, as returned by `LRANGE`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply or any element has the wrong shape.
    pub fn into_strings(self, command: &'static str) -> Result<Vec<String>> {
        match self {
            Self::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Self::Data(s) | Self::Status(s) => Ok(s),
                    other => Err(other.unexpected(command)),
                })
                .collect(),
            other => Err(other.unexpected(command)),
        }
    }

    /// Accept any non-error reply.
    ///
    /// # Errors
    ///
    /// Returns an error for error replies.
    pub fn into_ok(self, command: &'static str) -> Result<()> {
        match self {
            Self::Error(_) => Err(self.unexpected(command)),
            _ => Ok(()),
        }
    }
}

/// An ordered batch of commands sent in one round trip.
///
/// Replies come back in the same order, one per command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty pipeline with room for `capacity` commands.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Append a command.
    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the pipeline is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The queued commands.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Consume the pipeline, returning its commands.
    #[must_use]
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

impl From<Command> for Pipeline {
    fn from(command: Command) -> Self {
        Self {
            commands: vec![command],
        }
    }
}
