//! Redis-backed cache.
//!
//! One multiplexed [`ConnectionManager`] is shared by every caller. It is dialled on first use and
//! reconnects on its own after a dropped connection; a failed call is reported to the caller and
//! the next call dials again.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Value;
use tokio::sync::OnceCell;

use crate::backend::{expect_replies, CacheBackend};
use crate::command::{Command, Pipeline, Reply};
use crate::error::{CacheError, Result};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// A cache backend talking to a Redis-compatible server.
pub struct RedisCache {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl RedisCache {
    /// Create a backend for `url` (`redis://[:password@]host:port[/db]`).
    ///
    /// No connection is made until the first command.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
            timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                tracing::info!(
                    addr = %self.client.get_connection_info().addr,
                    "Connecting to cache"
                );
                ConnectionManager::new(self.client.clone()).await
            })
            .await?;
        Ok(manager.clone())
    }

    async fn run(&self, pipeline: Pipeline) -> Result<Vec<Reply>> {
        let expected = pipeline.len();
        let first = pipeline.commands().first().map_or("PIPELINE", Command::name);

        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for command in pipeline.into_commands() {
            pipe.add_command(to_cmd(command));
        }

        let values: Vec<Value> = pipe.query_async(&mut conn).await?;
        expect_replies(first, expected, values.into_iter().map(to_reply).collect())
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<Reply>> {
        if pipeline.is_empty() {
            return Ok(Vec::new());
        }
        tokio::time::timeout(self.timeout, self.run(pipeline))
            .await
            .map_err(|_| CacheError::Timeout(self.timeout))?
    }
}

fn to_cmd(command: Command) -> redis::Cmd {
    let mut cmd = redis::cmd(command.name());
    match command {
        Command::HSetNx { key, field, value } | Command::HSet { key, field, value } => {
            cmd.arg(key).arg(field).arg(value);
        }
        Command::HDel { key, field } | Command::HGet { key, field } => {
            cmd.arg(key).arg(field);
        }
        Command::HIncrBy { key, field, delta } => {
            cmd.arg(key).arg(field).arg(delta);
        }
        Command::HMGet { key, fields } => {
            cmd.arg(key).arg(fields);
        }
        Command::HLen { key } | Command::LLen { key } => {
            cmd.arg(key);
        }
        Command::LPush { key, values } => {
            cmd.arg(key).arg(values);
        }
        Command::LTrim { key, start, stop } | Command::LRange { key, start, stop } => {
            cmd.arg(key).arg(start).arg(stop);
        }
        Command::Ping => {}
    }
    cmd
}

fn to_reply(value: Value) -> Reply {
    match value {
        Value::Nil => Reply::Nil,
        Value::Int(n) => Reply::Int(n),
        Value::BulkString(bytes) => Reply::Data(String::from_utf8_lossy(&bytes).into_owned()),
        Value::SimpleString(status) => Reply::Status(status),
        Value::Okay => Reply::Status("OK".to_string()),
        Value::Array(items) | Value::Set(items) => {
            Reply::Array(items.into_iter().map(to_reply).collect())
        }
        Value::ServerError(err) => Reply::Error(format!("{err:?}")),
        other => Reply::Error(format!("unsupported reply: {other:?}")),
    }
}
