//! Lecture lookup cache.

use std::time::Duration;

use moka::future::Cache;

use attendance_core::{Lecture, LectureId};

/// Maximum cached lectures.
const LECTURE_CACHE_MAX_CAPACITY: u64 = 10_000;

/// TTL cache of single-lecture lookups, owned by a `Database` handle.
///
/// Only hits are stored. Writes through the owning handle invalidate the
/// entry; writes made by another process show up once the TTL expires.
#[derive(Clone)]
pub struct LectureCache {
    cache: Cache<LectureId, Lecture>,
}

impl LectureCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(LECTURE_CACHE_MAX_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, id: LectureId) -> Option<Lecture> {
        self.cache.get(&id).await
    }

    pub async fn insert(&self, lecture: Lecture) {
        self.cache.insert(lecture.id, lecture).await;
    }

    pub async fn invalidate(&self, id: LectureId) {
        self.cache.invalidate(&id).await;
    }
}
