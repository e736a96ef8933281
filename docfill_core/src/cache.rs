//! Shared template cache with single-flight downloads.
//!
//! Every request asks the source for the current generation of its key. A
//! cached copy with the same generation is returned directly. Otherwise the
//! first request for a key downloads it while later requests for the same key
//! wait on the download instead of starting their own.
//!
//! A waiter returns whatever the download it waited on stored, even when the
//! template changed again in the meantime and the stored generation differs
//! from the one the waiter observed. When that download failed the waiter
//! gets [`DocfillError::FetchAborted`] and never blocks again on it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Condvar;
use parking_lot::Mutex;

use crate::DocfillError;
use crate::DocfillResult;
use crate::Generation;
use crate::TemplateSource;

/// A cached template.
#[derive(Debug, Clone)]
pub struct CacheEntry {
	/// Generation reported by the download that stored the entry.
	pub generation: Generation,
	/// The template package.
	pub bytes: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct CacheState {
	entries: HashMap<String, CacheEntry>,
	/// Key → id of the download currently running for it.
	in_flight: HashMap<String, u64>,
	/// Key → id of the download that stored its current entry.
	stored_by: HashMap<String, u64>,
	next_flight: u64,
}

/// Process-wide template cache. Entries are replaced when their generation
/// changes and are never evicted otherwise.
#[derive(Debug)]
pub struct TemplateCache<S> {
	source: S,
	state: Mutex<CacheState>,
	finished: Condvar,
}

impl<S: TemplateSource> TemplateCache<S> {
	pub fn new(source: S) -> Self {
		Self {
			source,
			state: Mutex::new(CacheState::default()),
			finished: Condvar::new(),
		}
	}

	pub fn source(&self) -> &S {
		&self.source
	}

	/// Return the bytes of `key`, downloading them at most once per
	/// generation no matter how many callers ask concurrently.
	pub fn get(&self, key: &str) -> DocfillResult<Arc<[u8]>> {
		let generation = self.source.fetch_metadata(key)?;
		let mut state = self.state.lock();

		if let Some(entry) = fresh_entry(&state, key, &generation) {
			tracing::debug!(key, %generation, "template cache hit");
			return Ok(entry);
		}

		if let Some(&flight) = state.in_flight.get(key) {
			tracing::debug!(key, %generation, "waiting for template download");
			while state.in_flight.get(key) == Some(&flight) {
				self.finished.wait(&mut state);
			}

			return stored_since(&state, key, flight)
				.ok_or_else(|| DocfillError::FetchAborted(key.to_string()));
		}

		let id = state.next_flight;
		state.next_flight += 1;
		state.in_flight.insert(key.to_string(), id);
		drop(state);

		let flight = Flight {
			cache: self,
			key,
			id,
		};

		tracing::info!(key, %generation, "downloading template");
		let (bytes, generation) = self.source.fetch(key)?;
		let bytes: Arc<[u8]> = bytes.into();
		flight.finish(Some(CacheEntry {
			generation,
			bytes: Arc::clone(&bytes),
		}));

		Ok(bytes)
	}

	/// The cached entry for `key`, whatever its generation.
	pub fn entry(&self, key: &str) -> Option<CacheEntry> {
		self.state.lock().entries.get(key).cloned()
	}

	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.lock().entries.is_empty()
	}
}

fn fresh_entry(state: &CacheState, key: &str, generation: &Generation) -> Option<Arc<[u8]>> {
	state
		.entries
		.get(key)
		.filter(|entry| &entry.generation == generation)
		.map(|entry| Arc::clone(&entry.bytes))
}

/// The entry for `key` if download `flight`, or a later one, stored it.
fn stored_since(state: &CacheState, key: &str, flight: u64) -> Option<Arc<[u8]>> {
	state
		.stored_by
		.get(key)
		.filter(|&&id| id >= flight)
		.and_then(|_| state.entries.get(key))
		.map(|entry| Arc::clone(&entry.bytes))
}

/// Marks a running download. Dropping it, whether the download stored an
/// entry, returned an error or panicked, releases every waiter.
struct Flight<'a, S> {
	cache: &'a TemplateCache<S>,
	key: &'a str,
	id: u64,
}

impl<S> Flight<'_, S> {
	fn finish(&self, entry: Option<CacheEntry>) {
		let mut state = self.cache.state.lock();
		if let Some(entry) = entry {
			state.entries.insert(self.key.to_string(), entry);
			state.stored_by.insert(self.key.to_string(), self.id);
		}
		if state.in_flight.get(self.key) == Some(&self.id) {
			state.in_flight.remove(self.key);
		}
		self.cache.finished.notify_all();
	}
}

impl<S> Drop for Flight<'_, S> {
	fn drop(&mut self) {
		self.finish(None);
	}
}
