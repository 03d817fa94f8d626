//! Display-name cache.

use std::sync::Arc;

use photofeed_core::UserId;

use crate::backend::{expect_replies, CacheBackend};
use crate::command::{Command, Pipeline, Reply};
use crate::error::Result;
use crate::keys::{name_key, NAME_FIELD};

/// Typed access to cached display names.
#[derive(Clone)]
pub struct NameCache {
    backend: Arc<dyn CacheBackend>,
}

impl NameCache {
    /// Create a name cache on top of `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Store the display name of `user_id`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn set_name(&self, user_id: &UserId, name: &str) -> Result<()> {
        self.backend
            .query(Command::HSet {
                key: name_key(user_id),
                field: NAME_FIELD.to_string(),
                value: name.to_string(),
            })
            .await?
            .into_ok("HSET")
    }

    /// Look up the display names of `user_ids` in one round trip.
    ///
    /// The result is positionally aligned with the input; unknown users map to an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn get_names(&self, user_ids: &[UserId]) -> Result<Vec<String>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipeline = Pipeline::with_capacity(user_ids.len());
        for user_id in user_ids {
            pipeline.push(Command::HGet {
                key: name_key(user_id),
                field: NAME_FIELD.to_string(),
            });
        }

        let replies = expect_replies("HGET", user_ids.len(), self.backend.execute(pipeline).await?)?;
        Ok(user_ids
            .iter()
            .zip(replies)
            .map(|(user_id, reply)| decode_name(user_id, reply))
            .collect())
    }
}

fn decode_name(user_id: &UserId, reply: Reply) -> String {
    match reply.into_opt_string("HGET") {
        Ok(name) => name.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Unreadable display name");
            String::new()
        }
    }
}
