//! In-process cache backend.
//!
//! `MemoryCache` answers the same commands as a Redis server with the same semantics, including
//! `WRONGTYPE` errors when a list command hits a hash. It is used when no cache server is configured
//! and throughout the test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::backend::CacheBackend;
use crate::command::{Command, Pipeline, Reply};
use crate::error::Result;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const NOT_INTEGER: &str = "ERR hash value is not an integer";

#[derive(Debug)]
enum Entry {
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
}

/// A cache backend held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    data: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(
                    lock_kind = "mutex.lock",
                    result = "poisoned_recovered",
                    "Recovered from poisoned cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<Reply>> {
        let mut data = self.lock();
        Ok(pipeline
            .into_commands()
            .into_iter()
            .map(|command| apply(&mut data, command))
            .collect())
    }
}

// =============================================================================
// Command semantics
// =============================================================================

fn apply(data: &mut HashMap<String, Entry>, command: Command) -> Reply {
    match command {
        Command::HSetNx { key, field, value } => with_hash_mut(data, key, |hash| {
            if hash.contains_key(&field) {
                Reply::Int(0)
            } else {
                hash.insert(field, value);
                Reply::Int(1)
            }
        }),
        Command::HSet { key, field, value } => with_hash_mut(data, key, |hash| {
            Reply::Int(i64::from(hash.insert(field, value).is_none()))
        }),
        Command::HDel { key, field } => {
            let reply = match data.get_mut(&key) {
                None => Reply::Int(0),
                Some(Entry::Hash(hash)) => Reply::Int(i64::from(hash.remove(&field).is_some())),
                Some(Entry::List(_)) => return Reply::Error(WRONGTYPE.to_string()),
            };
            remove_if_empty(data, &key);
            reply
        }
        Command::HIncrBy { key, field, delta } => with_hash_mut(data, key, |hash| {
            let current = match hash.get(&field).map(|v| v.parse::<i64>()) {
                None => 0,
                Some(Ok(n)) => n,
                Some(Err(_)) => return Reply::Error(NOT_INTEGER.to_string()),
            };
            match current.checked_add(delta) {
                Some(next) => {
                    hash.insert(field, next.to_string());
                    Reply::Int(next)
                }
                None => Reply::Error("ERR increment or decrement would overflow".to_string()),
            }
        }),
        Command::HGet { key, field } => match data.get(&key) {
            None => Reply::Nil,
            Some(Entry::Hash(hash)) => hash.get(&field).cloned().map_or(Reply::Nil, Reply::Data),
            Some(Entry::List(_)) => Reply::Error(WRONGTYPE.to_string()),
        },
        Command::HMGet { key, fields } => match data.get(&key) {
            None => Reply::Array(fields.iter().map(|_| Reply::Nil).collect()),
            Some(Entry::Hash(hash)) => Reply::Array(
                fields
                    .iter()
                    .map(|f| hash.get(f).cloned().map_or(Reply::Nil, Reply::Data))
                    .collect(),
            ),
            Some(Entry::List(_)) => Reply::Error(WRONGTYPE.to_string()),
        },
        Command::HLen { key } => match data.get(&key) {
            None => Reply::Int(0),
            Some(Entry::Hash(hash)) => Reply::Int(len_i64(hash.len())),
            Some(Entry::List(_)) => Reply::Error(WRONGTYPE.to_string()),
        },
        Command::LPush { key, values } => {
            let entry = data
                .entry(key)
                .or_insert_with(|| Entry::List(VecDeque::new()));
            match entry {
                Entry::List(list) => {
                    for value in values {
                        list.push_front(value);
                    }
                    Reply::Int(len_i64(list.len()))
                }
                Entry::Hash(_) => Reply::Error(WRONGTYPE.to_string()),
            }
        }
        Command::LTrim { key, start, stop } => {
            match data.get_mut(&key) {
                None => {}
                Some(Entry::List(list)) => match normalize_range(start, stop, list.len()) {
                    Some((first, last)) => {
                        list.truncate(last + 1);
                        list.drain(..first);
                    }
                    None => list.clear(),
                },
                Some(Entry::Hash(_)) => return Reply::Error(WRONGTYPE.to_string()),
            }
            remove_if_empty(data, &key);
            Reply::Status("OK".to_string())
        }
        Command::LRange { key, start, stop } => match data.get(&key) {
            None => Reply::Array(Vec::new()),
            Some(Entry::List(list)) => {
                let items = normalize_range(start, stop, list.len()).map_or_else(Vec::new, |(first, last)| {
                    list.range(first..=last)
                        .cloned()
                        .map(Reply::Data)
                        .collect()
                });
                Reply::Array(items)
            }
            Some(Entry::Hash(_)) => Reply::Error(WRONGTYPE.to_string()),
        },
        Command::LLen { key } => match data.get(&key) {
            None => Reply::Int(0),
            Some(Entry::List(list)) => Reply::Int(len_i64(list.len())),
            Some(Entry::Hash(_)) => Reply::Error(WRONGTYPE.to_string()),
        },
        Command::Ping => Reply::Status("PONG".to_string()),
    }
}

fn with_hash_mut(
    data: &mut HashMap<String, Entry>,
    key: String,
    f: impl FnOnce(&mut HashMap<String, String>) -> Reply,
) -> Reply {
    match data
        .entry(key)
        .or_insert_with(|| Entry::Hash(HashMap::new()))
    {
        Entry::Hash(hash) => f(hash),
        Entry::List(_) => Reply::Error(WRONGTYPE.to_string()),
    }
}

/// Redis deletes keys whose hash or list becomes empty.
fn remove_if_empty(data: &mut HashMap<String, Entry>, key: &str) {
    let empty = match data.get(key) {
        Some(Entry::Hash(hash)) => hash.is_empty(),
        Some(Entry::List(list)) => list.is_empty(),
        None => false,
    };
    if empty {
        data.remove(key);
    }
}

fn len_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

/// Resolve an inclusive, possibly negative index range against a list of `len` items.
fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len_i64(len);
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(cache: &MemoryCache, command: Command) -> Reply {
        cache.execute(Pipeline::from(command)).await.unwrap().remove(0)
    }

    fn lrange_all(key: &str) -> Command {
        Command::LRange {
            key: key.into(),
            start: 0,
            stop: -1,
        }
    }

    #[tokio::test]
    async fn hsetnx_sets_once() {
        let cache = MemoryCache::new();
        let set = |value: &str| Command::HSetNx {
            key: "IM:A.1".into(),
            field: "date".into(),
            value: value.into(),
        };
        assert_eq!(run(&cache, set("10")).await, Reply::Int(1));
        assert_eq!(run(&cache, set("20")).await, Reply::Int(0));
        assert_eq!(
            run(
                &cache,
                Command::HGet {
                    key: "IM:A.1".into(),
                    field: "date".into()
                }
            )
            .await,
            Reply::Data("10".into())
        );
    }

    #[tokio::test]
    async fn lpush_puts_last_value_at_head() {
        let cache = MemoryCache::new();
        run(
            &cache,
            Command::LPush {
                key: "TL:A".into(),
                values: vec!["A.1".into(), "A.2".into()],
            },
        )
        .await;
        assert_eq!(
            run(&cache, lrange_all("TL:A")).await,
            Reply::Array(vec![Reply::Data("A.2".into()), Reply::Data("A.1".into())])
        );
    }

    #[tokio::test]
    async fn ltrim_keeps_inclusive_range() {
        let cache = MemoryCache::new();
        run(
            &cache,
            Command::LPush {
                key: "TL:A".into(),
                values: (1..=5).map(|i| format!("A.{i}")).collect(),
            },
        )
        .await;
        run(
            &cache,
            Command::LTrim {
                key: "TL:A".into(),
                start: 0,
                stop: 2,
            },
        )
        .await;
        let items = run(&cache, lrange_all("TL:A"))
            .await
            .into_strings("LRANGE")
            .unwrap();
        assert_eq!(items, vec!["A.5", "A.4", "A.3"]);
    }

    #[tokio::test]
    async fn wrong_type_is_a_per_command_error() {
        let cache = MemoryCache::new();
        let mut pipeline = Pipeline::new();
        pipeline
            .push(Command::HSet {
                key: "TL:A".into(),
                field: "x".into(),
                value: "1".into(),
            })
            .push(Command::LPush {
                key: "TL:A".into(),
                values: vec!["A.1".into()],
            })
            .push(Command::LLen { key: "TL:B".into() });

        let replies = cache.execute(pipeline).await.unwrap();
        assert_eq!(replies[0], Reply::Int(1));
        assert!(matches!(&replies[1], Reply::Error(e) if e.starts_with("WRONGTYPE")));
        assert_eq!(replies[2], Reply::Int(0));
    }

    #[tokio::test]
    async fn empty_hash_is_removed() {
        let cache = MemoryCache::new();
        run(
            &cache,
            Command::HSet {
                key: "IM:A.1".into(),
                field: "B".into(),
                value: "1".into(),
            },
        )
        .await;
        run(
            &cache,
            Command::HDel {
                key: "IM:A.1".into(),
                field: "B".into(),
            },
        )
        .await;
        // The key is gone, so it may now hold a list.
        assert_eq!(
            run(
                &cache,
                Command::LPush {
                    key: "IM:A.1".into(),
                    values: vec!["x".into()]
                }
            )
            .await,
            Reply::Int(1)
        );
    }

    #[test]
    fn range_normalization() {
        assert_eq!(normalize_range(0, -1, 5), Some((0, 4)));
        assert_eq!(normalize_range(0, 1999, 5), Some((0, 4)));
        assert_eq!(normalize_range(-2, -1, 5), Some((3, 4)));
        assert_eq!(normalize_range(3, 1, 5), None);
        assert_eq!(normalize_range(0, -1, 0), None);
    }
}
