//! Read path: paginated timelines.
//!
//! A page is cut from the viewer's feed list after the cursor, skipping repeated photos and photos
//! flagged more than the threshold allows, then joined against the metadata and name caches.
//! Failures of the join degrade the entries instead of failing the page.

use std::collections::HashMap;

use photofeed_cache::{FeedLists, MetadataCache, NameCache, PhotoSnapshot};
use photofeed_core::{
    Cursor, FeedPolicy, PhotoId, TimelineEntry, TimelinePage, UserId, MISSING_DATE,
};

use crate::error::ApiError;

/// Builds timeline pages from the caches.
#[derive(Clone)]
pub struct TimelineReader {
    feeds: FeedLists,
    metadata: MetadataCache,
    names: NameCache,
    policy: FeedPolicy,
}

impl TimelineReader {
    /// Create a reader.
    #[must_use]
    pub fn new(
        feeds: FeedLists,
        metadata: MetadataCache,
        names: NameCache,
        policy: FeedPolicy,
    ) -> Self {
        Self {
            feeds,
            metadata,
            names,
            policy,
        }
    }

    /// Read one page of `viewer`'s timeline.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unavailable`] if the feed list itself cannot be read.
    pub async fn get_timeline(
        &self,
        viewer: &UserId,
        cursor: &Cursor,
    ) -> Result<TimelinePage, ApiError> {
        let feed = self.feeds.scan(viewer).await?;
        let candidates = page_candidates(&feed, cursor);
        let page_size = self.policy.page_size.max(1);

        let mut selected: Vec<(PhotoId, PhotoSnapshot)> = Vec::with_capacity(page_size);
        for chunk in candidates.chunks(page_size) {
            let snapshots = match self.metadata.snapshots(chunk, viewer).await {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    tracing::warn!(viewer = %viewer, error = %e, "Metadata join failed");
                    vec![PhotoSnapshot::default(); chunk.len()]
                }
            };

            for (photo_id, snapshot) in chunk.iter().zip(snapshots) {
                if self.policy.is_suppressed(snapshot.flags) {
                    tracing::debug!(photo_id = %photo_id, flags = snapshot.flags, "Suppressed");
                    continue;
                }
                selected.push((photo_id.clone(), snapshot));
                if selected.len() == page_size {
                    break;
                }
            }
            if selected.len() == page_size {
                break;
            }
        }

        let posters: Vec<UserId> = selected.iter().map(|(p, _)| p.poster().clone()).collect();
        let names = match self.names.get_names(&posters).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(viewer = %viewer, error = %e, "Name join failed");
                vec![String::new(); posters.len()]
            }
        };

        let entries: Vec<TimelineEntry> = selected
            .into_iter()
            .zip(names)
            .map(|((photo_id, snapshot), name)| TimelineEntry {
                created: snapshot.created.unwrap_or(MISSING_DATE),
                user_id: photo_id.poster().clone(),
                name,
                photo_id,
                likes: snapshot.likes,
                i_like: snapshot.viewer_likes,
            })
            .collect();

        let next_cursor = entries.last().map(|e| e.photo_id.clone());
        Ok(TimelinePage {
            entries,
            next_cursor,
        })
    }
}

/// Photos after `cursor` that are the first occurrence of their ID in `feed`.
///
/// Skipping every repeat, not only repeats within one page, keeps pages disjoint: a page can
/// only end on a first occurrence, and the next page resumes right after it.
fn page_candidates(feed: &[PhotoId], cursor: &Cursor) -> Vec<PhotoId> {
    let mut first_seen: HashMap<&PhotoId, usize> = HashMap::with_capacity(feed.len());
    for (index, photo_id) in feed.iter().enumerate() {
        first_seen.entry(photo_id).or_insert(index);
    }

    let start = cursor.start_index(feed);
    feed.iter()
        .enumerate()
        .skip(start)
        .filter(|(index, photo_id)| first_seen.get(photo_id) == Some(index))
        .map(|(_, photo_id)| photo_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use photofeed_cache::{CacheBackend, MemoryCache};

    struct Fixture {
        reader: TimelineReader,
        feeds: FeedLists,
        metadata: MetadataCache,
        names: NameCache,
    }

    fn fixture(page_size: usize) -> Fixture {
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryCache::new());
        let policy = FeedPolicy {
            page_size,
            ..FeedPolicy::default()
        };
        let feeds = FeedLists::new(backend.clone(), policy.feed_capacity);
        let metadata = MetadataCache::new(backend.clone());
        let names = NameCache::new(backend);
        Fixture {
            reader: TimelineReader::new(feeds.clone(), metadata.clone(), names.clone(), policy),
            feeds,
            metadata,
            names,
        }
    }

    fn user(s: &str) -> UserId {
        s.parse().unwrap()
    }

    fn photo(s: &str) -> PhotoId {
        s.parse().unwrap()
    }

    /// Append oldest first so the feed reads `newest_first`.
    async fn seed(f: &Fixture, viewer: &UserId, newest_first: &[&str]) {
        for id in newest_first.iter().rev() {
            f.feeds.append(viewer, &photo(id)).await.unwrap();
        }
    }

    fn page_ids(page: &TimelinePage) -> Vec<String> {
        page.entries.iter().map(|e| e.photo_id.to_string()).collect()
    }

    #[test]
    fn candidates_skip_every_repeat() {
        let feed: Vec<PhotoId> = ["A.1", "B.1", "A.1", "C.1"].iter().map(|s| photo(s)).collect();
        let all: Vec<String> = page_candidates(&feed, &Cursor::Start)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(all, vec!["A.1", "B.1", "C.1"]);

        let after_b: Vec<String> = page_candidates(&feed, &Cursor::After(photo("B.1")))
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(after_b, vec!["C.1"]);
    }

    #[tokio::test]
    async fn pages_follow_the_cursor() {
        let f = fixture(2);
        let v = user("V");
        seed(&f, &v, &["A.1", "A.2", "A.3", "A.4", "A.5"]).await;

        let first = f.reader.get_timeline(&v, &Cursor::Start).await.unwrap();
        assert_eq!(page_ids(&first), vec!["A.1", "A.2"]);
        assert_eq!(first.next_cursor, Some(photo("A.2")));

        let second = f
            .reader
            .get_timeline(&v, &Cursor::After(photo("A.2")))
            .await
            .unwrap();
        assert_eq!(page_ids(&second), vec!["A.3", "A.4"]);

        let third = f
            .reader
            .get_timeline(&v, &Cursor::After(photo("A.4")))
            .await
            .unwrap();
        assert_eq!(page_ids(&third), vec!["A.5"]);

        let done = f
            .reader
            .get_timeline(&v, &Cursor::After(photo("A.5")))
            .await
            .unwrap();
        assert!(done.entries.is_empty());
        assert_eq!(done.next_cursor, None);
    }

    #[tokio::test]
    async fn concatenated_pages_reproduce_filtered_feed() {
        let f = fixture(3);
        let v = user("V");
        let feed = ["A.1", "B.1", "A.1", "C.1", "D.1", "B.1", "E.1", "F.1", "G.1"];
        seed(&f, &v, &feed).await;
        f.metadata.flag(&photo("D.1")).await.unwrap();
        f.metadata.flag(&photo("D.1")).await.unwrap();

        let mut seen = Vec::new();
        let mut cursor = Cursor::Start;
        for _ in 0..10 {
            let page = f.reader.get_timeline(&v, &cursor).await.unwrap();
            seen.extend(page_ids(&page));
            match page.next_cursor {
                Some(next) => cursor = Cursor::After(next),
                None => break,
            }
        }
        assert_eq!(seen, vec!["A.1", "B.1", "C.1", "E.1", "F.1", "G.1"]);
    }

    #[tokio::test]
    async fn single_flag_is_not_suppressed() {
        let f = fixture(10);
        let v = user("V");
        seed(&f, &v, &["A.1", "A.2"]).await;
        f.metadata.flag(&photo("A.1")).await.unwrap();
        f.metadata.flag(&photo("A.2")).await.unwrap();
        f.metadata.flag(&photo("A.2")).await.unwrap();

        let page = f.reader.get_timeline(&v, &Cursor::Start).await.unwrap();
        assert_eq!(page_ids(&page), vec!["A.1"]);
    }

    #[tokio::test]
    async fn entries_join_metadata_and_names() {
        let f = fixture(10);
        let v = user("V");
        seed(&f, &v, &["A.1", "B.1"]).await;
        f.metadata.create_if_absent(&photo("A.1"), 1_400_000_000).await.unwrap();
        f.metadata.like(&photo("A.1"), &v).await.unwrap();
        f.metadata.like(&photo("A.1"), &user("X")).await.unwrap();
        f.names.set_name(&user("A"), "Ann").await.unwrap();

        let page = f.reader.get_timeline(&v, &Cursor::Start).await.unwrap();
        let a = &page.entries[0];
        assert_eq!(a.created, 1_400_000_000);
        assert_eq!(a.name, "Ann");
        assert_eq!(a.likes, 2);
        assert!(a.i_like);

        // No metadata and no name: defaults.
        let b = &page.entries[1];
        assert_eq!(b.created, MISSING_DATE);
        assert_eq!(b.name, "");
        assert_eq!(b.likes, 0);
        assert!(!b.i_like);
    }

    #[tokio::test]
    async fn unknown_cursor_restarts_and_empty_feed_is_exhausted() {
        let f = fixture(10);
        let v = user("V");

        let empty = f.reader.get_timeline(&v, &Cursor::Start).await.unwrap();
        assert_eq!(empty, TimelinePage::empty());

        seed(&f, &v, &["A.1"]).await;
        let page = f
            .reader
            .get_timeline(&v, &Cursor::After(photo("Z.9")))
            .await
            .unwrap();
        assert_eq!(page_ids(&page), vec!["A.1"]);
    }
}
