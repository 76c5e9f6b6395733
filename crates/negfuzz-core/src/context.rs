//! Run-wide correlation state shared by every worker
//!
//! Successful POST bodies are kept per path so a later DELETE test can pick up
//! the identifier of a resource that really exists. Successful DELETEs are
//! remembered so a stateful check can verify the resources are gone.

use std::collections::{BTreeSet, VecDeque};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

/// Default number of POST bodies kept per path.
pub const DEFAULT_MAX_STORED_POSTS: usize = 10;

#[derive(Debug)]
pub struct GlobalContext {
    max_stored_posts: usize,
    post_successful_responses: DashMap<String, VecDeque<String>>,
    successful_deletes: Mutex<BTreeSet<String>>,
    generated_examples_cache: DashMap<String, Vec<Value>>,
}

impl Default for GlobalContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STORED_POSTS)
    }
}

impl GlobalContext {
    /// `max_stored_posts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_stored_posts: usize) -> Self {
        Self {
            max_stored_posts: max_stored_posts.max(1),
            post_successful_responses: DashMap::new(),
            successful_deletes: Mutex::new(BTreeSet::new()),
            generated_examples_cache: DashMap::new(),
        }
    }

    // ── POST → DELETE correlation ──

    /// Remember a successful POST body under its contract path. The oldest entry
    /// is evicted once the per-path queue is full.
    pub fn record_post_success(&self, path: &str, body: impl Into<String>) {
        let mut queue = self
            .post_successful_responses
            .entry(path.to_string())
            .or_default();
        if queue.len() >= self.max_stored_posts {
            queue.pop_front();
        }
        queue.push_back(body.into());
    }

    /// Take the most recent POST body stored for the collection that
    /// `delete_path` belongs to (`/items/{id}` → `/items`). Each body is
    /// handed out at most once.
    #[must_use]
    pub fn consume_post_for_delete(&self, delete_path: &str) -> Option<String> {
        let collection = sibling_collection_path(delete_path);
        self.post_successful_responses
            .get_mut(collection)
            .and_then(|mut queue| queue.pop_back())
    }

    /// Number of POST bodies currently stored for `path`.
    #[must_use]
    pub fn stored_posts(&self, path: &str) -> usize {
        self.post_successful_responses
            .get(path)
            .map_or(0, |q| q.len())
    }

    // ── Deleted resources ──

    pub fn record_successful_delete(&self, url: impl Into<String>) {
        self.successful_deletes.lock().insert(url.into());
    }

    /// Return every recorded delete URL and forget them.
    #[must_use]
    pub fn drain_successful_deletes(&self) -> BTreeSet<String> {
        std::mem::take(&mut *self.successful_deletes.lock())
    }

    /// Remove and return the recorded delete URLs accepted by `wanted`, under
    /// one lock. The others stay for later callers.
    #[must_use]
    pub fn take_successful_deletes(&self, wanted: impl Fn(&str) -> bool) -> BTreeSet<String> {
        let mut deletes = self.successful_deletes.lock();
        let (taken, kept): (BTreeSet<String>, BTreeSet<String>) =
            std::mem::take(&mut *deletes).into_iter().partition(|url| wanted(url));
        *deletes = kept;
        taken
    }

    // ── Example cache ──

    pub fn cache_examples(&self, path: &str, examples: Vec<Value>) {
        self.generated_examples_cache
            .insert(path.to_string(), examples);
    }

    #[must_use]
    pub fn cached_examples(&self, path: &str) -> Option<Vec<Value>> {
        self.generated_examples_cache.get(path).map(|e| e.clone())
    }
}

/// Collection path for an item path: the trailing `/{param}` segment removed.
/// Paths without a trailing parameter are returned unchanged.
#[must_use]
pub fn sibling_collection_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, last)) if last.starts_with('{') && last.ends_with('}') => {
            if parent.is_empty() { "/" } else { parent }
        }
        _ => trimmed,
    }
}

/// `name` followed by its camelCase, snake_case and kebab-case spellings,
/// without duplicates.
#[must_use]
pub fn name_variants(name: &str) -> Vec<String> {
    let words = split_words(name);
    let camel: String = words
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
        .collect();
    let mut out = vec![name.to_string()];
    for candidate in [camel, words.join("_"), words.join("-")] {
        if !candidate.is_empty() && !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn post_queue_is_bounded() {
        let ctx = GlobalContext::new(2);
        ctx.record_post_success("/items", "a");
        ctx.record_post_success("/items", "b");
        ctx.record_post_success("/items", "c");
        assert_eq!(ctx.stored_posts("/items"), 2);
        assert_eq!(ctx.consume_post_for_delete("/items/{id}").as_deref(), Some("c"));
        assert_eq!(ctx.consume_post_for_delete("/items/{id}").as_deref(), Some("b"));
        assert_eq!(ctx.consume_post_for_delete("/items/{id}"), None);
    }

    #[test]
    fn consume_without_post_is_empty() {
        let ctx = GlobalContext::default();
        assert_eq!(ctx.consume_post_for_delete("/items/{id}"), None);
    }

    #[test]
    fn deletes_drain_once() {
        let ctx = GlobalContext::default();
        ctx.record_successful_delete("http://h/items/1");
        ctx.record_successful_delete("http://h/items/1");
        ctx.record_successful_delete("http://h/items/2");
        assert_eq!(ctx.drain_successful_deletes().len(), 2);
        assert!(ctx.drain_successful_deletes().is_empty());
    }

    #[test]
    fn take_leaves_unwanted_deletes() {
        let ctx = GlobalContext::default();
        ctx.record_successful_delete("http://h/pets/1");
        ctx.record_successful_delete("http://h/owners/2");
        let pets = ctx.take_successful_deletes(|url| url.contains("/pets/"));
        assert_eq!(pets.len(), 1);
        assert!(pets.contains("http://h/pets/1"));
        assert!(ctx.take_successful_deletes(|url| url.contains("/pets/")).is_empty());
        let left = ctx.drain_successful_deletes();
        assert!(left.contains("http://h/owners/2"));
    }

    #[test]
    fn concurrent_takes_see_every_delete() {
        let ctx = GlobalContext::default();
        for i in 0..100 {
            ctx.record_successful_delete(format!("http://h/pets/{i}"));
            ctx.record_successful_delete(format!("http://h/owners/{i}"));
        }
        let (pets, owners) = std::thread::scope(|s| {
            let pets = s.spawn(|| ctx.take_successful_deletes(|url| url.contains("/pets/")));
            let owners = s.spawn(|| ctx.take_successful_deletes(|url| url.contains("/owners/")));
            (pets.join().unwrap(), owners.join().unwrap())
        });
        assert_eq!(pets.len(), 100);
        assert_eq!(owners.len(), 100);
        assert!(ctx.drain_successful_deletes().is_empty());
    }

    #[test]
    fn example_cache() {
        let ctx = GlobalContext::default();
        assert!(ctx.cached_examples("/pets").is_none());
        ctx.cache_examples("/pets", vec![serde_json::json!({"name": "rex"})]);
        assert_eq!(ctx.cached_examples("/pets").unwrap().len(), 1);
    }

    #[test]
    fn sibling_paths() {
        assert_eq!(sibling_collection_path("/items/{id}"), "/items");
        assert_eq!(sibling_collection_path("/stores/{sid}/items/{id}/"), "/stores/{sid}/items");
        assert_eq!(sibling_collection_path("/{id}"), "/");
        assert_eq!(sibling_collection_path("/items"), "/items");
    }

    #[test]
    fn variants_of_names() {
        assert_eq!(name_variants("petId"), vec!["petId", "pet_id", "pet-id"]);
        assert_eq!(name_variants("pet_id"), vec!["pet_id", "petId", "pet-id"]);
        assert_eq!(name_variants("id"), vec!["id"]);
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let ctx = Arc::new(GlobalContext::new(1000));
        std::thread::scope(|s| {
            for t in 0..8 {
                let ctx = Arc::clone(&ctx);
                s.spawn(move || {
                    for i in 0..50 {
                        ctx.record_post_success("/items", format!("{t}-{i}"));
                    }
                });
            }
        });
        assert_eq!(ctx.stored_posts("/items"), 400);

        let taken = std::sync::Mutex::new(Vec::new());
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    while let Some(body) = ctx.consume_post_for_delete("/items/{id}") {
                        taken.lock().unwrap().push(body);
                    }
                });
            }
        });
        let mut taken = taken.into_inner().unwrap();
        taken.sort();
        taken.dedup();
        assert_eq!(taken.len(), 400);
    }
}
