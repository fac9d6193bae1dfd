//! Remote object key scheme.
//!
//! ```text
//! uploads/{dataset_id}/{base}-chunk-{index}.{ext}   one chunk of a large file
//! uploads/{dataset_id}/{record_id}.{ext}            a whole file
//! ```
//!
//! The key is the only link between remote objects and records: a chunked
//! file's content is the index-ordered concatenation of every chunk object that
//! shares its dataset prefix, base name and extension.

use std::sync::LazyLock;

use regex::Regex;

/// Root prefix for every uploaded object.
pub const UPLOAD_ROOT: &str = "uploads";

/// `{base}-chunk-{index}` with an optional `.{ext}`. The extension is
/// anything without a dot, as produced by [`split_file_name`], and the base is
/// the shortest prefix that leaves such a tail.
static CHUNK_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+?)-chunk-(?P<index>\d+)(?:\.(?P<ext>[^./]+))?$")
        .expect("valid regex")
});

/// Prefix under which all objects of a dataset live (with trailing slash).
pub fn dataset_prefix(dataset_id: &str) -> String {
    format!("{UPLOAD_ROOT}/{dataset_id}/")
}

/// Split a file name into `(stem, extension)`.
///
/// The extension is whatever follows the last dot, as long as the stem is not
/// empty (so `.hidden` has no extension).
pub fn split_file_name(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    }
}

fn with_extension(stem: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

/// Object name (last key segment) of one chunk of `file_name`.
pub fn chunk_object_name(file_name: &str, index: u32) -> String {
    let (stem, ext) = split_file_name(file_name);
    with_extension(&format!("{stem}-chunk-{index}"), ext)
}

/// Remote key of one chunk of `file_name`.
pub fn chunk_key(dataset_id: &str, file_name: &str, index: u32) -> String {
    format!(
        "{}{}",
        dataset_prefix(dataset_id),
        chunk_object_name(file_name, index)
    )
}

/// Remote key of a whole (non-chunked) file, named after its record.
pub fn whole_file_key(dataset_id: &str, record_id: &str, file_name: &str) -> String {
    let (_, ext) = split_file_name(file_name);
    format!(
        "{}{}",
        dataset_prefix(dataset_id),
        with_extension(record_id, ext)
    )
}

/// Staging file name for a chunk job. Prefixed by dataset so concurrent
/// batches never share a staging path.
pub fn staging_chunk_name(dataset_id: &str, file_name: &str, index: u32) -> String {
    format!("{dataset_id}-{}", chunk_object_name(file_name, index))
}

/// Staging file name for a whole-file job.
pub fn staging_whole_name(dataset_id: &str, record_id: &str, file_name: &str) -> String {
    let (_, ext) = split_file_name(file_name);
    format!("{dataset_id}-{}", with_extension(record_id, ext))
}

/// A parsed chunk object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkKey {
    pub dataset_id: String,
    pub base: String,
    pub index: u32,
    pub ext: Option<String>,
}

impl ChunkKey {
    /// Name of the logical file this chunk belongs to (`{base}.{ext}`).
    pub fn logical_file_name(&self) -> String {
        with_extension(&self.base, self.ext.as_deref())
    }
}

/// A parsed whole-file object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WholeFileKey {
    pub dataset_id: String,
    pub stem: String,
    pub ext: Option<String>,
}

impl WholeFileKey {
    /// Local file name used when caching this object (`{stem}.{ext}`).
    pub fn file_name(&self) -> String {
        with_extension(&self.stem, self.ext.as_deref())
    }
}

/// Classification of a remote key under the upload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKey {
    Chunk(ChunkKey),
    WholeFile(WholeFileKey),
}

/// Parse a remote key. Returns `None` for keys outside `uploads/{dataset}/`.
pub fn parse_object_key(key: &str) -> Option<ObjectKey> {
    let rest = key.strip_prefix(UPLOAD_ROOT)?.strip_prefix('/')?;
    let (dataset_id, name) = rest.split_once('/')?;
    if dataset_id.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }

    if let Some(caps) = CHUNK_NAME_RE.captures(name) {
        if let Ok(index) = caps["index"].parse::<u32>() {
            return Some(ObjectKey::Chunk(ChunkKey {
                dataset_id: dataset_id.to_string(),
                base: caps["base"].to_string(),
                index,
                ext: caps.name("ext").map(|m| m.as_str().to_string()),
            }));
        }
    }

    let (stem, ext) = split_file_name(name);
    Some(ObjectKey::WholeFile(WholeFileKey {
        dataset_id: dataset_id.to_string(),
        stem: stem.to_string(),
        ext: ext.map(str::to_string),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_file_name_variants() {
        assert_eq!(split_file_name("cat.png"), ("cat", Some("png")));
        assert_eq!(split_file_name("archive.tar.gz"), ("archive.tar", Some("gz")));
        assert_eq!(split_file_name("README"), ("README", None));
        assert_eq!(split_file_name(".hidden"), (".hidden", None));
        assert_eq!(split_file_name("trailing."), ("trailing.", None));
    }

    #[test]
    fn chunk_key_layout() {
        assert_eq!(
            chunk_key("ds1", "scan.tiff", 3),
            "uploads/ds1/scan-chunk-3.tiff"
        );
        assert_eq!(chunk_key("ds1", "blob", 0), "uploads/ds1/blob-chunk-0");
    }

    #[test]
    fn whole_file_key_uses_record_id() {
        assert_eq!(
            whole_file_key("ds1", "abc123", "cat.png"),
            "uploads/ds1/abc123.png"
        );
    }

    #[test]
    fn staging_names_are_dataset_prefixed() {
        assert_eq!(staging_chunk_name("ds1", "scan.tiff", 2), "ds1-scan-chunk-2.tiff");
        assert_eq!(staging_whole_name("ds1", "abc", "notes.txt"), "ds1-abc.txt");
    }

    #[test]
    fn parse_chunk_key_round_trips_logical_name() {
        let key = chunk_key("ds1", "my.scan.tiff", 12);
        match parse_object_key(&key) {
            Some(ObjectKey::Chunk(chunk)) => {
                assert_eq!(chunk.dataset_id, "ds1");
                assert_eq!(chunk.base, "my.scan");
                assert_eq!(chunk.index, 12);
                assert_eq!(chunk.logical_file_name(), "my.scan.tiff");
            }
            other => panic!("expected chunk key, got {other:?}"),
        }
    }

    #[test]
    fn chunk_keys_of_awkward_names_parse_back_to_the_name() {
        let names = [
            "dump.tar_gz",
            "clip.mp4-hd",
            "notes.ünï",
            "x-chunk-5.png",
            "a.b-chunk-2",
            "a-chunk-3.q.png",
            "x-chunk-7",
            "README",
            ".hidden",
            "trailing.",
            "two words.jpeg",
        ];
        for name in names {
            for index in [0, 1, 41] {
                match parse_object_key(&chunk_key("ds1", name, index)) {
                    Some(ObjectKey::Chunk(chunk)) => {
                        assert_eq!(chunk.logical_file_name(), name, "name {name}");
                        assert_eq!(chunk.index, index, "name {name}");
                    }
                    other => panic!("{name}: expected chunk key, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn parse_whole_file_key() {
        match parse_object_key("uploads/ds1/abc123.png") {
            Some(ObjectKey::WholeFile(whole)) => {
                assert_eq!(whole.stem, "abc123");
                assert_eq!(whole.ext.as_deref(), Some("png"));
                assert_eq!(whole.file_name(), "abc123.png");
            }
            other => panic!("expected whole-file key, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_foreign_keys() {
        assert_eq!(parse_object_key("other/ds1/a.png"), None);
        assert_eq!(parse_object_key("uploads/ds1/"), None);
        assert_eq!(parse_object_key("uploads/ds1/nested/a.png"), None);
        assert_eq!(parse_object_key("uploads//a.png"), None);
    }
}
