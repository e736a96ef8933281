use std::collections::HashMap;
use std::fmt;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use parking_lot::RwLock;

use crate::DocfillError;
use crate::DocfillResult;

/// Version tag of a stored template. Two fetches of the same key return the
/// same generation only if the bytes are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Generation(pub String);

impl fmt::Display for Generation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Generation {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<u64> for Generation {
	fn from(value: u64) -> Self {
		Self(value.to_string())
	}
}

/// Where template bytes come from. Implementations are shared between render
/// workers.
pub trait TemplateSource: Send + Sync {
	/// The current generation of `key` without transferring its bytes.
	fn fetch_metadata(&self, key: &str) -> DocfillResult<Generation>;

	/// The bytes of `key` together with the generation they belong to.
	fn fetch(&self, key: &str) -> DocfillResult<(Vec<u8>, Generation)>;
}

/// Templates stored as files below a root directory. The generation is
/// derived from the file size and modification time.
#[derive(Debug, Clone)]
pub struct DirectorySource {
	root: PathBuf,
}

impl DirectorySource {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn resolve(&self, key: &str) -> DocfillResult<PathBuf> {
		let relative = Path::new(key);
		let escapes = relative
			.components()
			.any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));

		if key.is_empty() || escapes {
			return Err(fetch_error(
				key,
				"template keys must be relative paths inside the template directory",
			));
		}

		Ok(self.root.join(relative))
	}
}

impl TemplateSource for DirectorySource {
	fn fetch_metadata(&self, key: &str) -> DocfillResult<Generation> {
		let path = self.resolve(key)?;
		let metadata = std::fs::metadata(&path).map_err(|e| fetch_error(key, e))?;
		Ok(fingerprint(&metadata))
	}

	fn fetch(&self, key: &str) -> DocfillResult<(Vec<u8>, Generation)> {
		let path = self.resolve(key)?;
		let bytes = std::fs::read(&path).map_err(|e| fetch_error(key, e))?;
		let metadata = std::fs::metadata(&path).map_err(|e| fetch_error(key, e))?;
		Ok((bytes, fingerprint(&metadata)))
	}
}

fn fingerprint(metadata: &std::fs::Metadata) -> Generation {
	let modified_unix_ms = metadata
		.modified()
		.ok()
		.and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
		.map_or(0, |duration| duration.as_millis().try_into().unwrap_or(u64::MAX));

	Generation(format!("{}-{modified_unix_ms}", metadata.len()))
}

/// Templates held in memory. Every [`MemorySource::insert`] bumps the
/// generation of the key.
#[derive(Debug, Default)]
pub struct MemorySource {
	entries: RwLock<HashMap<String, (Vec<u8>, u64)>>,
}

impl MemorySource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Store `bytes` under `key` and return the new generation.
	pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Generation {
		let mut entries = self.entries.write();
		let entry = entries.entry(key.into()).or_insert_with(|| (Vec::new(), 0));
		entry.0 = bytes.into();
		entry.1 += 1;
		Generation::from(entry.1)
	}
}

impl TemplateSource for MemorySource {
	fn fetch_metadata(&self, key: &str) -> DocfillResult<Generation> {
		self.entries
			.read()
			.get(key)
			.map(|(_, generation)| Generation::from(*generation))
			.ok_or_else(|| fetch_error(key, "no such template"))
	}

	fn fetch(&self, key: &str) -> DocfillResult<(Vec<u8>, Generation)> {
		self.entries
			.read()
			.get(key)
			.map(|(bytes, generation)| (bytes.clone(), Generation::from(*generation)))
			.ok_or_else(|| fetch_error(key, "no such template"))
	}
}

pub(crate) fn fetch_error(key: &str, reason: impl fmt::Display) -> DocfillError {
	DocfillError::Fetch {
		key: key.to_string(),
		reason: reason.to_string(),
	}
}
