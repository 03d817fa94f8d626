//! The cache backend seam.

use async_trait::async_trait;

use crate::command::{Command, Pipeline, Reply};
use crate::error::{CacheError, Result};

/// A cache server that executes pipelines of commands.
///
/// Implementations must preserve order: the reply at index `i` answers the command at index `i`.
/// A per-command failure is reported as [`Reply::Error`] in its slot; an `Err` means the whole
/// round trip failed and no reply is known.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Execute every command of `pipeline` in one round trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<Reply>>;

    /// Execute a single command.
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the server rejects the command.
    async fn query(&self, command: Command) -> Result<Reply> {
        let name = command.name();
        let reply = self
            .execute(Pipeline::from(command))
            .await?
            .into_iter()
            .next()
            .ok_or(CacheError::UnexpectedReply {
                command: name,
                reply: "no reply".to_string(),
            })?;
        match reply {
            Reply::Error(message) => Err(CacheError::Command(message)),
            reply => Ok(reply),
        }
    }

    /// Check that the backend answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn ping(&self) -> Result<()> {
        self.query(Command::Ping).await?.into_ok("PING")
    }
}

/// Check that a backend returned one reply per command.
pub(crate) fn expect_replies(
    command: &'static str,
    expected: usize,
    replies: Vec<Reply>,
) -> Result<Vec<Reply>> {
    if replies.len() == expected {
        Ok(replies)
    } else {
        Err(CacheError::UnexpectedReply {
            command,
            reply: format!("{} replies for {expected} commands", replies.len()),
        })
    }
}
