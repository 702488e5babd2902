//! On-disk layout of one durable namespace.
//!
//! Layout: `<base_path>/<scope>/entries.json` holds a JSON array of entry
//! records sorted by key; `<base_path>/<scope>/tag_index.json` holds the
//! tag index together with the SHA-256 digest of the `entries.json` bytes
//! it was derived from.
//!
//! Both files are replaced atomically: the new content is written to a
//! temp file in the same directory and renamed over the old one. The index
//! goes first, so `entries.json` only changes once both writes can land. A
//! failure between the two renames leaves an index whose digest names
//! entries that never reached disk, which the next load detects and
//! repairs.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use memscope_core::obs::{emit_index_rebuilt, emit_namespace_quarantined};
use memscope_core::{MemoryEntry, MemoryError, MemoryResult, Scope, TagIndex};

pub(crate) const ENTRIES_FILE: &str = "entries.json";
pub(crate) const TAG_INDEX_FILE: &str = "tag_index.json";

#[derive(Debug, Serialize, Deserialize)]
struct TagIndexFile {
    entries_digest: String,
    index: TagIndex,
}

/// Namespace contents as read from disk.
#[derive(Debug, Default)]
pub(crate) struct LoadedNamespace {
    pub entries: BTreeMap<String, MemoryEntry>,
    pub tags: TagIndex,
}

fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `bytes` to `dir/name` via temp file + rename.
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> MemoryResult<()> {
    let target = dir.join(name);
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MemoryError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| MemoryError::io(tmp.path(), e))?;
    tmp.persist(&target)
        .map_err(|e| MemoryError::io(&target, e.error))?;
    Ok(())
}

fn encode_index(entries_digest: String, tags: &TagIndex) -> MemoryResult<Vec<u8>> {
    let file = TagIndexFile {
        entries_digest,
        index: tags.clone(),
    };
    serde_json::to_vec_pretty(&file).map_err(|e| MemoryError::serialization(TAG_INDEX_FILE, e))
}

/// Persist a namespace. Blocking; run it off the async executor.
pub(crate) fn save_blocking(
    dir: &Path,
    entries: &BTreeMap<String, MemoryEntry>,
    tags: &TagIndex,
) -> MemoryResult<()> {
    let records: Vec<&MemoryEntry> = entries.values().collect();
    let entries_bytes =
        serde_json::to_vec_pretty(&records).map_err(|e| MemoryError::serialization(ENTRIES_FILE, e))?;
    let index_bytes = encode_index(digest_hex(&entries_bytes), tags)?;

    fs::create_dir_all(dir).map_err(|e| MemoryError::io(dir, e))?;
    write_atomic(dir, TAG_INDEX_FILE, &index_bytes)?;
    write_atomic(dir, ENTRIES_FILE, &entries_bytes)?;
    debug!(dir = %dir.display(), entries = entries.len(), "Namespace persisted");
    Ok(())
}

fn decode_entries(bytes: &[u8], scope: Scope) -> MemoryResult<BTreeMap<String, MemoryEntry>> {
    let records: Vec<MemoryEntry> =
        serde_json::from_slice(bytes).map_err(|e| MemoryError::serialization(ENTRIES_FILE, e))?;

    let mut entries = BTreeMap::new();
    for record in records {
        if record.scope != scope {
            return Err(MemoryError::serialization(
                ENTRIES_FILE,
                format!(
                    "entry '{}' is recorded under scope {} in the {} namespace",
                    record.key, record.scope, scope
                ),
            ));
        }
        if let Some(previous) = entries.insert(record.key.clone(), record) {
            warn!(key = %previous.key, scope = %scope, "Duplicate key in namespace file, keeping the later record");
        }
    }
    Ok(entries)
}

/// Move a corrupt file aside as `<name>.corrupt-<unix millis>`.
fn quarantine(path: &Path) -> MemoryResult<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ENTRIES_FILE.to_string());
    let moved = path.with_file_name(format!(
        "{file_name}.corrupt-{}",
        Utc::now().timestamp_millis()
    ));
    fs::rename(path, &moved).map_err(|e| MemoryError::io(path, e))?;
    Ok(moved)
}

/// Outcome of checking the persisted tag index against the entries.
enum IndexCheck {
    Valid(TagIndex),
    Rebuild(&'static str),
}

fn check_index(dir: &Path, entries_digest: &str, entries: &BTreeMap<String, MemoryEntry>) -> IndexCheck {
    let bytes = match fs::read(dir.join(TAG_INDEX_FILE)) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return IndexCheck::Rebuild("missing"),
        Err(_) => return IndexCheck::Rebuild("unreadable"),
    };
    let file: TagIndexFile = match serde_json::from_slice(&bytes) {
        Ok(file) => file,
        Err(_) => return IndexCheck::Rebuild("corrupt"),
    };
    if file.entries_digest != entries_digest {
        return IndexCheck::Rebuild("stale digest");
    }
    if !file.index.is_consistent_with(entries.values()) {
        return IndexCheck::Rebuild("inconsistent");
    }
    IndexCheck::Valid(file.index)
}

/// Load a durable namespace. Blocking; run it off the async executor.
///
/// A missing `entries.json` is an empty namespace. A corrupt one is a
/// `Serialization` error unless `quarantine_corrupt` is set, in which case
/// the file is moved aside and the namespace starts empty. The tag index
/// is rebuilt and rewritten whenever it is missing or does not match the
/// entries.
pub(crate) fn load_blocking(
    label: &str,
    dir: &Path,
    scope: Scope,
    quarantine_corrupt: bool,
) -> MemoryResult<LoadedNamespace> {
    let entries_path = dir.join(ENTRIES_FILE);
    let bytes = match fs::read(&entries_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(namespace = %label, "No namespace file yet, starting empty");
            return Ok(LoadedNamespace::default());
        }
        Err(e) => return Err(MemoryError::io(&entries_path, e)),
    };

    let entries = match decode_entries(&bytes, scope) {
        Ok(entries) => entries,
        Err(err) if quarantine_corrupt => {
            let moved = quarantine(&entries_path)?;
            emit_namespace_quarantined(label, &moved.display().to_string(), &err);
            // The index described the quarantined file.
            if let Err(e) = fs::remove_file(dir.join(TAG_INDEX_FILE)) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(MemoryError::io(dir.join(TAG_INDEX_FILE), e));
                }
            }
            return Ok(LoadedNamespace::default());
        }
        Err(err) => return Err(err),
    };

    let entries_digest = digest_hex(&bytes);
    let tags = match check_index(dir, &entries_digest, &entries) {
        IndexCheck::Valid(tags) => tags,
        IndexCheck::Rebuild(reason) => {
            let rebuilt = TagIndex::rebuild(entries.values());
            emit_index_rebuilt(label, reason, rebuilt.len());
            write_atomic(dir, TAG_INDEX_FILE, &encode_index(entries_digest, &rebuilt)?)?;
            rebuilt
        }
    };

    Ok(LoadedNamespace { entries, tags })
}
