//! Read-side materialization of uploaded files into the local cache.
//!
//! Remote keys are the only link between objects and records. Chunk objects
//! are grouped by `(base, ext)`, ordered by index and concatenated into
//! `{cache_root}/{dataset_id}/{base}.{ext}`. Whole-file objects are
//! downloaded to `{cache_root}/{dataset_id}/{record_id}.{ext}`. Nothing is
//! downloaded twice: cached files are reused as long as they are complete.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use labelhub_core::object_key::{dataset_prefix, parse_object_key, ObjectKey, WholeFileKey};
use labelhub_core::pagination::{total_pages, PageRequest};
use labelhub_db::models::record::Record;
use labelhub_storage::{RemoteObject, SharedStorage, StorageError};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::catalog::SharedCatalog;
use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// A chunked file reassembled into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFile {
    pub file_name: String,
    pub local_path: PathBuf,
}

/// A record with a local copy of its file.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedRecord {
    #[serde(flatten)]
    pub record: Record,
    pub file_name: String,
    /// URL path the cached file is served at.
    pub served_path: String,
    #[serde(skip)]
    pub local_path: PathBuf,
}

/// One page of the review listing.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedPage {
    pub records: Vec<MaterializedRecord>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: u32,
}

/// Chunk objects sharing a dataset, base name and extension.
#[derive(Debug, Clone)]
struct ChunkGroup {
    file_name: String,
    chunks: Vec<(u32, RemoteObject)>,
}

impl ChunkGroup {
    /// Indices `0..n` all present. Anything else is still uploading.
    fn is_complete(&self) -> bool {
        self.chunks
            .iter()
            .enumerate()
            .all(|(position, (index, _))| *index as usize == position)
    }

    fn total_size(&self) -> u64 {
        self.chunks.iter().map(|(_, object)| object.size).sum()
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Whole {
        object: RemoteObject,
        key: WholeFileKey,
    },
    Chunked(ChunkGroup),
}

/// Parse a dataset listing into entries, in listing order. A chunk group
/// takes the position of its first chunk.
fn group_listing(dataset_id: &str, objects: Vec<RemoteObject>) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut group_positions: HashMap<(String, Option<String>), usize> = HashMap::new();

    for object in objects {
        match parse_object_key(&object.key) {
            Some(ObjectKey::Chunk(chunk)) if chunk.dataset_id == dataset_id => {
                let file_name = chunk.logical_file_name();
                let position = *group_positions
                    .entry((chunk.base, chunk.ext))
                    .or_insert_with(|| {
                        entries.push(Entry::Chunked(ChunkGroup {
                            file_name,
                            chunks: Vec::new(),
                        }));
                        entries.len() - 1
                    });
                if let Entry::Chunked(group) = &mut entries[position] {
                    group.chunks.push((chunk.index, object));
                }
            }
            Some(ObjectKey::WholeFile(key)) if key.dataset_id == dataset_id => {
                entries.push(Entry::Whole { object, key });
            }
            _ => {}
        }
    }

    for entry in &mut entries {
        if let Entry::Chunked(group) = entry {
            group.chunks.sort_by_key(|(index, _)| *index);
        }
    }
    entries
}

/// Materializes records of a dataset from remote storage.
#[derive(Clone)]
pub struct Assembler {
    catalog: SharedCatalog,
    storage: SharedStorage,
    config: PipelineConfig,
}

impl Assembler {
    pub fn new(catalog: SharedCatalog, storage: SharedStorage, config: PipelineConfig) -> Self {
        Self {
            catalog,
            storage,
            config,
        }
    }

    async fn listing(&self, dataset_id: &str) -> Result<Vec<Entry>, PipelineError> {
        let objects = self.storage.list(&dataset_prefix(dataset_id)).await?;
        Ok(group_listing(dataset_id, objects))
    }

    /// Reassemble every fully uploaded chunked file of a dataset.
    ///
    /// A file whose chunks fail to download is left out; the others are
    /// still returned.
    pub async fn assemble_chunked_files(
        &self,
        dataset_id: &str,
    ) -> Result<Vec<AssembledFile>, PipelineError> {
        let mut assembled = Vec::new();
        for entry in self.listing(dataset_id).await? {
            let Entry::Chunked(group) = entry else {
                continue;
            };
            if !group.is_complete() {
                tracing::debug!(dataset_id, file = %group.file_name, "Chunk group incomplete, skipping");
                continue;
            }
            match self.reassemble(dataset_id, &group).await {
                Ok(local_path) => assembled.push(AssembledFile {
                    file_name: group.file_name,
                    local_path,
                }),
                Err(e) => {
                    tracing::warn!(dataset_id, file = %group.file_name, error = %e, "Reassembly failed")
                }
            }
        }
        Ok(assembled)
    }

    /// Download the whole-file objects of a dataset, optionally only those
    /// of one annotator's records.
    pub async fn retrieve_whole_files(
        &self,
        dataset_id: &str,
        annotator_id: Option<&str>,
    ) -> Result<Vec<MaterializedRecord>, PipelineError> {
        let resolved = self.resolve(dataset_id, annotator_id).await?;
        let whole_only: Vec<(Record, Entry)> = resolved
            .into_iter()
            .filter(|(_, entry)| matches!(entry, Entry::Whole { .. }))
            .collect();
        Ok(self.materialize_all(dataset_id, whole_only).await)
    }

    /// Resolve, paginate and materialize one page of a dataset's records.
    ///
    /// Without an annotator the order is the remote listing order; with one
    /// it is the annotator's record order. Records whose file cannot be
    /// materialized are left out of the page.
    pub async fn materialize_page(
        &self,
        dataset_id: &str,
        annotator_id: Option<&str>,
        page: PageRequest,
    ) -> Result<MaterializedPage, PipelineError> {
        let resolved = self.resolve(dataset_id, annotator_id).await?;
        let total = resolved.len();
        let on_page = page.slice(&resolved).to_vec();
        let records = self.materialize_all(dataset_id, on_page).await;

        Ok(MaterializedPage {
            records,
            page: page.page,
            limit: page.limit,
            total,
            total_pages: total_pages(total, page.limit),
        })
    }

    /// Pair records with the remote entries holding their bytes.
    async fn resolve(
        &self,
        dataset_id: &str,
        annotator_id: Option<&str>,
    ) -> Result<Vec<(Record, Entry)>, PipelineError> {
        let entries: Vec<Entry> = self
            .listing(dataset_id)
            .await?
            .into_iter()
            .filter(|entry| match entry {
                Entry::Chunked(group) => group.is_complete(),
                Entry::Whole { .. } => true,
            })
            .collect();

        match annotator_id {
            None => {
                let records = self.catalog.records_by_dataset(dataset_id).await?;
                Ok(resolve_by_listing(records, entries))
            }
            Some(annotator_id) => {
                let records = self
                    .catalog
                    .records_by_annotator(dataset_id, annotator_id)
                    .await?;
                Ok(resolve_by_records(dataset_id, records, &entries))
            }
        }
    }

    async fn materialize_all(
        &self,
        dataset_id: &str,
        resolved: Vec<(Record, Entry)>,
    ) -> Vec<MaterializedRecord> {
        let mut materialized = Vec::with_capacity(resolved.len());
        for (record, entry) in resolved {
            let result = match &entry {
                Entry::Whole { object, key } => self
                    .fetch_whole_file(dataset_id, object, &key.file_name())
                    .await
                    .map(|path| (key.file_name(), path)),
                Entry::Chunked(group) => self
                    .reassemble(dataset_id, group)
                    .await
                    .map(|path| (group.file_name.clone(), path)),
            };
            match result {
                Ok((file_name, local_path)) => materialized.push(MaterializedRecord {
                    served_path: self.config.served_path(dataset_id, &file_name),
                    record,
                    file_name,
                    local_path,
                }),
                Err(PipelineError::Storage(StorageError::NotFound(key))) => {
                    tracing::warn!(dataset_id, key = %key, "Object disappeared, omitting record")
                }
                Err(e) => tracing::warn!(
                    dataset_id,
                    record_id = %record.id,
                    error = %e,
                    "Failed to materialize record, omitting"
                ),
            }
        }
        materialized
    }

    async fn fetch_whole_file(
        &self,
        dataset_id: &str,
        object: &RemoteObject,
        file_name: &str,
    ) -> Result<PathBuf, PipelineError> {
        let local_path = self.config.dataset_cache_dir(dataset_id).join(file_name);
        let cached = tokio::fs::try_exists(&local_path)
            .await
            .map_err(|e| PipelineError::io(&local_path, e))?;
        if cached {
            tracing::debug!(dataset_id, file = file_name, "Cache hit");
        } else {
            self.storage.get(&object.key, &local_path).await?;
        }
        Ok(local_path)
    }

    /// Concatenate a complete chunk group into the cache, in index order.
    ///
    /// An existing output is reused when its size equals the sum of the
    /// remote chunk sizes. Chunks are downloaded into a scratch directory
    /// private to this call and each is deleted as soon as it has been
    /// appended, so concurrent readers of the same file never share
    /// intermediate files.
    async fn reassemble(&self, dataset_id: &str, group: &ChunkGroup) -> Result<PathBuf, PipelineError> {
        let dir = self.config.dataset_cache_dir(dataset_id);
        let output = dir.join(&group.file_name);
        let expected = group.total_size();

        match tokio::fs::metadata(&output).await {
            Ok(metadata) if metadata.len() == expected => {
                tracing::debug!(dataset_id, file = %group.file_name, "Cache hit");
                return Ok(output);
            }
            Ok(_) => tracing::debug!(dataset_id, file = %group.file_name, "Cached copy stale, rebuilding"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::io(&output, e)),
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::io(&dir, e))?;

        let work = tempfile::Builder::new()
            .prefix(".assemble-")
            .tempdir_in(&dir)
            .map_err(|e| PipelineError::io(&dir, e))?;
        let part = work.path().join("output");
        let mut out = tokio::fs::File::create(&part)
            .await
            .map_err(|e| PipelineError::io(&part, e))?;

        for (index, object) in &group.chunks {
            let chunk_path = work.path().join(format!("chunk-{index}"));
            self.storage.get(&object.key, &chunk_path).await?;

            let mut chunk = tokio::fs::File::open(&chunk_path)
                .await
                .map_err(|e| PipelineError::io(&chunk_path, e))?;
            tokio::io::copy(&mut chunk, &mut out)
                .await
                .map_err(|e| PipelineError::io(&part, e))?;
            drop(chunk);
            tokio::fs::remove_file(&chunk_path)
                .await
                .map_err(|e| PipelineError::io(&chunk_path, e))?;
        }

        out.flush().await.map_err(|e| PipelineError::io(&part, e))?;
        out.sync_all().await.map_err(|e| PipelineError::io(&part, e))?;
        drop(out);
        tokio::fs::rename(&part, &output)
            .await
            .map_err(|e| PipelineError::io(&output, e))?;
        if let Err(e) = work.close() {
            tracing::debug!(dataset_id, error = %e, "Failed to remove assembly scratch directory");
        }

        tracing::info!(
            dataset_id,
            file = %group.file_name,
            chunks = group.chunks.len(),
            bytes = expected,
            "Reassembled chunked file"
        );
        Ok(output)
    }
}

/// Whole-dataset path: listing order, whole files matched by stem and chunk
/// groups by file name. Unmatched objects are skipped.
fn resolve_by_listing(records: Vec<Record>, entries: Vec<Entry>) -> Vec<(Record, Entry)> {
    let by_id: HashMap<&str, &Record> = records.iter().map(|r| (r.id.as_str(), r)).collect();
    let by_name: HashMap<&str, &Record> = records.iter().map(|r| (r.name.as_str(), r)).collect();
    let mut used = HashSet::new();
    let mut resolved = Vec::new();

    for entry in entries {
        let record = match &entry {
            Entry::Whole { key, .. } => by_id.get(key.stem.as_str()),
            Entry::Chunked(group) => by_name.get(group.file_name.as_str()),
        };
        if let Some(record) = record {
            if used.insert(record.id.clone()) {
                resolved.push(((*record).clone(), entry));
            }
        }
    }
    resolved
}

/// Per-annotator path: record order, each record resolved to a whole-file
/// object by key prefix or to a chunk group by file name. Unmatched records
/// are dropped.
fn resolve_by_records(
    dataset_id: &str,
    records: Vec<Record>,
    entries: &[Entry],
) -> Vec<(Record, Entry)> {
    let prefix = dataset_prefix(dataset_id);
    let mut resolved = Vec::new();

    for record in records {
        let record_prefix = format!("{prefix}{}", record.id);
        let found = entries.iter().find(|entry| match entry {
            Entry::Whole { object, .. } => object.key.starts_with(&record_prefix),
            Entry::Chunked(group) => group.file_name == record.name,
        });
        if let Some(entry) = found {
            resolved.push((record, entry.clone()));
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use labelhub_core::hashing::record_id_for_file_name;
    use labelhub_core::object_key::{chunk_key, whole_file_key};
    use labelhub_db::models::record::CreateRecord;
    use labelhub_storage::{LocalStorage, StorageGateway};
    use tempfile::TempDir;

    use crate::catalog::Catalog;
    use crate::memory::MemoryCatalog;

    /// Local storage that counts downloads.
    struct CountingStorage {
        inner: LocalStorage,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl StorageGateway for CountingStorage {
        async fn put(&self, local_path: &Path, key: &str) -> Result<(), StorageError> {
            self.inner.put(local_path, key).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, StorageError> {
            self.inner.list(prefix).await
        }

        async fn get(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key, dest).await
        }

        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    struct Fixture {
        bucket: TempDir,
        cache: TempDir,
        scratch: TempDir,
        storage: Arc<CountingStorage>,
        catalog: Arc<MemoryCatalog>,
    }

    impl Fixture {
        fn new() -> Self {
            let bucket = TempDir::new().unwrap();
            let storage = Arc::new(CountingStorage {
                inner: LocalStorage::new(bucket.path()),
                gets: AtomicUsize::new(0),
            });
            Self {
                bucket,
                cache: TempDir::new().unwrap(),
                scratch: TempDir::new().unwrap(),
                storage,
                catalog: Arc::new(MemoryCatalog::new()),
            }
        }

        fn assembler(&self) -> Assembler {
            Assembler::new(
                self.catalog.clone(),
                self.storage.clone(),
                PipelineConfig {
                    extract_root: self.scratch.path().join("extracted"),
                    staging_root: self.scratch.path().join("staging"),
                    cache_root: self.cache.path().to_path_buf(),
                    cache_root_name: "assembled-images".into(),
                    chunk_size: 4,
                    max_attempts: 5,
                },
            )
        }

        async fn upload(&self, key: &str, bytes: &[u8]) {
            let src = self.scratch.path().join("upload.tmp");
            tokio::fs::write(&src, bytes).await.unwrap();
            self.storage.inner.put(&src, key).await.unwrap();
        }

        async fn record(&self, name: &str, annotator: Option<&str>) -> String {
            let id = record_id_for_file_name(name);
            self.catalog
                .insert_records(&[CreateRecord {
                    dataset_id: "ds1".into(),
                    id: id.clone(),
                    name: name.into(),
                    annotator_id: annotator.map(str::to_string),
                }])
                .await
                .unwrap();
            id
        }

        fn gets(&self) -> usize {
            self.storage.gets.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn chunks_uploaded_out_of_order_reassemble_in_index_order() {
        let fx = Fixture::new();
        fx.upload(&chunk_key("ds1", "scan.tiff", 1), b"WORLD").await;
        fx.upload(&chunk_key("ds1", "scan.tiff", 0), b"HELLO").await;

        let files = fx.assembler().assemble_chunked_files("ds1").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "scan.tiff");
        let bytes = tokio::fs::read(&files[0].local_path).await.unwrap();
        assert_eq!(bytes, b"HELLOWORLD");

        // Chunk copies and scratch space are gone once the file is built.
        let mut entries = tokio::fs::read_dir(fx.cache.path().join("ds1")).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().into_string().unwrap());
        }
        assert_eq!(names, vec!["scan.tiff"]);
    }

    #[tokio::test]
    async fn unusual_extensions_reassemble() {
        let fx = Fixture::new();
        for name in ["dump.tar_gz", "clip.mp4-hd", "notes.ünï"] {
            fx.record(name, None).await;
            fx.upload(&chunk_key("ds1", name, 0), b"ab").await;
            fx.upload(&chunk_key("ds1", name, 1), b"cd").await;
        }

        let mut files = fx.assembler().assemble_chunked_files("ds1").await.unwrap();
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["clip.mp4-hd", "dump.tar_gz", "notes.ünï"]);
        assert_eq!(tokio::fs::read(&files[1].local_path).await.unwrap(), b"abcd");

        let page = PageRequest::new(1, 10).unwrap();
        let result = fx.assembler().materialize_page("ds1", None, page).await.unwrap();
        assert_eq!(result.records.len(), 3);
    }

    #[tokio::test]
    async fn whole_file_with_part_extension_is_materialized() {
        let fx = Fixture::new();
        let id = fx.record("movie.part", None).await;
        fx.upload(&whole_file_key("ds1", &id, "movie.part"), b"frames").await;

        let page = PageRequest::new(1, 10).unwrap();
        let result = fx.assembler().materialize_page("ds1", None, page).await.unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].file_name, format!("{id}.part"));
        assert_eq!(tokio::fs::read(&result.records[0].local_path).await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn concurrent_readers_of_one_chunked_file_both_get_it() {
        let fx = Fixture::new();
        fx.record("long.bin", None).await;
        let mut expected = Vec::new();
        for index in 0..40u32 {
            let bytes = format!("{index:04}");
            fx.upload(&chunk_key("ds1", "long.bin", index), bytes.as_bytes()).await;
            expected.extend_from_slice(bytes.as_bytes());
        }

        let page = PageRequest::new(1, 10).unwrap();
        let (first, second) = (fx.assembler(), fx.assembler());
        let (a, b) = tokio::join!(
            first.materialize_page("ds1", None, page),
            second.materialize_page("ds1", None, page),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.records.len(), 1);
        assert_eq!(b.records.len(), 1);
        assert_eq!(tokio::fs::read(&a.records[0].local_path).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn same_base_with_different_extensions_never_mix() {
        let fx = Fixture::new();
        fx.upload(&chunk_key("ds1", "a.png", 0), b"png").await;
        fx.upload(&chunk_key("ds1", "a.jpg", 0), b"jpg").await;

        let mut files = fx.assembler().assemble_chunked_files("ds1").await.unwrap();
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        assert_eq!(files.len(), 2);
        assert_eq!(tokio::fs::read(&files[0].local_path).await.unwrap(), b"jpg");
        assert_eq!(tokio::fs::read(&files[1].local_path).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn incomplete_chunk_group_is_skipped() {
        let fx = Fixture::new();
        fx.upload(&chunk_key("ds1", "scan.tiff", 1), b"WORLD").await;

        let files = fx.assembler().assemble_chunked_files("ds1").await.unwrap();
        assert!(files.is_empty());
        assert_eq!(fx.gets(), 0);
    }

    #[tokio::test]
    async fn fully_cached_dataset_needs_zero_downloads() {
        let fx = Fixture::new();
        let whole = fx.record("cat.png", None).await;
        fx.record("scan.tiff", None).await;
        fx.upload(&whole_file_key("ds1", &whole, "cat.png"), b"meow").await;
        fx.upload(&chunk_key("ds1", "scan.tiff", 0), b"AAAA").await;
        fx.upload(&chunk_key("ds1", "scan.tiff", 1), b"BB").await;

        let assembler = fx.assembler();
        let page = PageRequest::new(1, 10).unwrap();
        let first = assembler.materialize_page("ds1", None, page).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(fx.gets(), 3);

        let second = assembler.materialize_page("ds1", None, page).await.unwrap();
        assert_eq!(second.records.len(), 2);
        assert_eq!(fx.gets(), 3);
    }

    #[tokio::test]
    async fn page_follows_listing_order_and_reports_served_paths() {
        let fx = Fixture::new();
        let mut ids = Vec::new();
        for name in ["a.png", "b.png", "c.png"] {
            let id = fx.record(name, None).await;
            fx.upload(&whole_file_key("ds1", &id, name), name.as_bytes()).await;
            ids.push(id);
        }
        // Unmatched objects are ignored.
        fx.upload("uploads/ds1/orphan.png", b"?").await;
        let mut listing_order = ids.clone();
        listing_order.sort();

        let page = PageRequest::new(2, 2).unwrap();
        let result = fx.assembler().materialize_page("ds1", None, page).await.unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.total_pages, 2);
        assert_eq!(result.records.len(), 1);
        let only = &result.records[0];
        assert_eq!(only.record.id, listing_order[2]);
        assert_eq!(
            only.served_path,
            format!("/assembled-images/ds1/{}.png", listing_order[2])
        );

        let past_end = PageRequest::new(5, 2).unwrap();
        let empty = fx.assembler().materialize_page("ds1", None, past_end).await.unwrap();
        assert!(empty.records.is_empty());
        assert_eq!(empty.total_pages, 2);
    }

    #[tokio::test]
    async fn annotator_path_uses_record_order_and_drops_unmatched() {
        let fx = Fixture::new();
        let first = fx.record("z.png", Some("a0")).await;
        let missing = fx.record("missing.png", Some("a0")).await;
        let other = fx.record("y.png", Some("a1")).await;
        let big = fx.record("big.bin", Some("a0")).await;
        fx.upload(&whole_file_key("ds1", &first, "z.png"), b"z").await;
        fx.upload(&whole_file_key("ds1", &other, "y.png"), b"y").await;
        fx.upload(&chunk_key("ds1", "big.bin", 0), b"12345").await;

        let page = PageRequest::new(1, 10).unwrap();
        let result = fx
            .assembler()
            .materialize_page("ds1", Some("a0"), page)
            .await
            .unwrap();
        let ids: Vec<&str> = result.records.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), big.as_str()]);
        assert!(!ids.contains(&missing.as_str()));
        assert_eq!(result.records[1].file_name, "big.bin");
    }

    #[tokio::test]
    async fn retrieve_whole_files_skips_chunked_records() {
        let fx = Fixture::new();
        let whole = fx.record("cat.png", Some("a0")).await;
        fx.record("big.bin", Some("a0")).await;
        fx.upload(&whole_file_key("ds1", &whole, "cat.png"), b"meow").await;
        fx.upload(&chunk_key("ds1", "big.bin", 0), b"12345").await;

        let files = fx.assembler().retrieve_whole_files("ds1", Some("a0")).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].record.id, whole);
        assert_eq!(tokio::fs::read(&files[0].local_path).await.unwrap(), b"meow");
        assert!(fx.bucket.path().join("uploads/ds1").exists());
    }
}
