//! Ingestion of an extracted archive: records, assignment and upload jobs.
//!
//! A batch is validated before anything is written. The assignment cursor is
//! read once and written once per batch. Ingestion is done once every upload
//! job is enqueued; it never waits for the uploads themselves.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use labelhub_core::assignment::RoundRobin;
use labelhub_core::chunking::{needs_chunking, split_ranges, write_chunk};
use labelhub_core::dataset::{validate_dataset_fields, validate_record_fields, DatasetType};
use labelhub_core::error::CoreError;
use labelhub_core::hashing::record_id_for_file_name;
use labelhub_core::object_key::{staging_chunk_name, staging_whole_name};
use labelhub_core::types::{DatasetId, RecordId};
use labelhub_db::models::dataset::CreateDataset;
use labelhub_db::models::record::CreateRecord;
use serde::Serialize;

use crate::catalog::SharedCatalog;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::queue::{ChunkUploadJob, SharedQueue, UploadJob, WholeFileUploadJob};

/// One extracted archive to ingest.
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub dataset_id: DatasetId,
    /// Display name, usually the archive file name.
    pub name: String,
    pub data_type: DatasetType,
    pub client_id: String,
    /// Comma-separated class labels.
    pub classes: Option<String>,
    /// Archive size; the sum of the file sizes when not supplied.
    pub size_bytes: Option<i64>,
    /// Extracted files, in ingestion order.
    pub files: Vec<PathBuf>,
    /// Extraction directory, removed once every job is enqueued. It must lie
    /// strictly inside the configured extract root.
    pub extract_dir: Option<PathBuf>,
}

/// A file left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregate result of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub dataset_id: DatasetId,
    pub record_ids: Vec<RecordId>,
    pub skipped: Vec<SkippedFile>,
    pub chunk_jobs: usize,
    pub whole_file_jobs: usize,
    /// Cursor persisted after the batch.
    pub cursor: u64,
}

/// A file accepted into the batch.
struct PlannedFile {
    path: PathBuf,
    file_name: String,
    size: u64,
    record: CreateRecord,
}

/// Turns extracted files into records and upload jobs.
#[derive(Clone)]
pub struct IngestService {
    catalog: SharedCatalog,
    queue: SharedQueue,
    config: PipelineConfig,
}

impl IngestService {
    pub fn new(catalog: SharedCatalog, queue: SharedQueue, config: PipelineConfig) -> Self {
        Self {
            catalog,
            queue,
            config,
        }
    }

    /// Ingest one batch and return the ids of the records created.
    ///
    /// Dataset validation failures abort the batch before anything is
    /// persisted. A file that fails record validation is skipped without
    /// advancing the assignment cursor, and so is a file whose record already
    /// exists: it keeps the annotator it was given when first ingested.
    pub async fn submit_ingestion_batch(
        &self,
        request: IngestionRequest,
    ) -> Result<IngestionReport, PipelineError> {
        let dataset_id = request.dataset_id.clone();
        let mut skipped = Vec::new();
        let extract_dir = match &request.extract_dir {
            Some(dir) => Some(confine_extract_dir(&self.config.extract_root, dir).await?),
            None => None,
        };

        // -- Stat every file ---------------------------------------------------
        let mut candidates = Vec::with_capacity(request.files.len());
        let mut seen = HashSet::new();
        for path in &request.files {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                skipped.push(skip(path, "file name is not valid UTF-8"));
                continue;
            };
            let metadata = match tokio::fs::symlink_metadata(path).await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => {
                    skipped.push(skip(path, "not a regular file"));
                    continue;
                }
                Err(e) => {
                    skipped.push(skip(path, &e.to_string()));
                    continue;
                }
            };
            if !seen.insert(file_name.to_string()) {
                skipped.push(skip(path, "duplicate file name in batch"));
                continue;
            }
            candidates.push((path.clone(), file_name.to_string(), metadata.len()));
        }

        let size_bytes = request.size_bytes.unwrap_or_else(|| {
            let total: u64 = candidates.iter().map(|(_, _, size)| size).sum();
            i64::try_from(total).unwrap_or(i64::MAX)
        });
        validate_dataset_fields(&dataset_id, &request.name, &request.client_id, size_bytes)?;

        // -- Assign annotators -------------------------------------------------
        let annotators = self.catalog.active_annotators().await?;
        let persisted_cursor = self.catalog.load_cursor().await?;
        let mut round_robin = RoundRobin::new(&annotators, persisted_cursor);
        let existing: HashSet<RecordId> = self
            .catalog
            .records_by_dataset(&dataset_id)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();

        let mut planned = Vec::with_capacity(candidates.len());
        for (path, file_name, size) in candidates {
            let record_id = record_id_for_file_name(&file_name);
            if let Err(e) = validate_record_fields(&record_id, &dataset_id, &file_name) {
                skipped.push(skip(&path, &e.to_string()));
                continue;
            }
            let annotator_id = if existing.contains(&record_id) {
                None
            } else {
                round_robin.next_assignee().map(|a| a.id.clone())
            };
            planned.push(PlannedFile {
                record: CreateRecord {
                    dataset_id: dataset_id.clone(),
                    id: record_id,
                    name: file_name.clone(),
                    annotator_id,
                },
                path,
                file_name,
                size,
            });
        }

        // -- Persist -----------------------------------------------------------
        let classes = request.classes.filter(|c| !c.trim().is_empty());
        let num_of_classes = classes
            .as_deref()
            .map(|c| labelhub_core::dataset::parse_classes(c).len() as i32)
            .unwrap_or(0);
        self.catalog
            .insert_dataset(&CreateDataset {
                id: dataset_id.clone(),
                name: request.name.clone(),
                data_type: request.data_type.name().to_string(),
                client_id: request.client_id.clone(),
                classes,
                num_of_classes,
                size_bytes,
            })
            .await?;

        let records: Vec<CreateRecord> = planned.iter().map(|p| p.record.clone()).collect();
        self.catalog.insert_records(&records).await?;
        let cursor = round_robin.cursor();
        if cursor != persisted_cursor {
            self.catalog.store_cursor(cursor).await?;
        }
        self.catalog.upsert_annotator_links(&dataset_id).await?;
        self.catalog.recompute_dataset_completion(&dataset_id).await?;

        // -- Stage and enqueue uploads -----------------------------------------
        tokio::fs::create_dir_all(&self.config.staging_root)
            .await
            .map_err(|e| PipelineError::io(&self.config.staging_root, e))?;

        let mut chunk_jobs = 0;
        let mut whole_file_jobs = 0;
        for file in &planned {
            if needs_chunking(file.size, self.config.chunk_size) {
                chunk_jobs += self.stage_chunks(&dataset_id, file).await?;
            } else {
                self.stage_whole_file(&dataset_id, file).await?;
                whole_file_jobs += 1;
            }
        }

        if let Some(dir) = &extract_dir {
            if let Err(e) = tokio::fs::remove_dir_all(dir).await {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove extraction directory");
            }
        }

        tracing::info!(
            dataset_id = %dataset_id,
            records = planned.len(),
            skipped = skipped.len(),
            chunk_jobs,
            whole_file_jobs,
            cursor,
            "Ingestion batch enqueued"
        );

        Ok(IngestionReport {
            dataset_id,
            record_ids: planned.into_iter().map(|p| p.record.id).collect(),
            skipped,
            chunk_jobs,
            whole_file_jobs,
            cursor,
        })
    }

    async fn stage_chunks(&self, dataset_id: &str, file: &PlannedFile) -> Result<usize, PipelineError> {
        let ranges = split_ranges(file.size, self.config.chunk_size)?;
        for range in &ranges {
            let staging_path = self
                .config
                .staging_root
                .join(staging_chunk_name(dataset_id, &file.file_name, range.index));
            write_chunk(&file.path, *range, &staging_path)
                .await
                .map_err(|e| PipelineError::io(&staging_path, e))?;
            self.queue
                .enqueue(&UploadJob::Chunk(ChunkUploadJob {
                    dataset_id: dataset_id.to_string(),
                    file_name: file.file_name.clone(),
                    chunk_index: range.index,
                    staging_path,
                }))
                .await?;
        }
        tracing::debug!(
            dataset_id,
            file = %file.file_name,
            chunks = ranges.len(),
            "Staged chunked file"
        );
        Ok(ranges.len())
    }

    async fn stage_whole_file(&self, dataset_id: &str, file: &PlannedFile) -> Result<(), PipelineError> {
        let staging_path = self.config.staging_root.join(staging_whole_name(
            dataset_id,
            &file.record.id,
            &file.file_name,
        ));
        tokio::fs::copy(&file.path, &staging_path)
            .await
            .map_err(|e| PipelineError::io(&staging_path, e))?;
        self.queue
            .enqueue(&UploadJob::WholeFile(WholeFileUploadJob {
                dataset_id: dataset_id.to_string(),
                record_id: file.record.id.clone(),
                file_name: file.file_name.clone(),
                staging_path,
            }))
            .await?;
        Ok(())
    }
}

/// Resolve `dir` and require it to be a directory strictly inside `root`.
///
/// Both paths are canonicalized first, so `..` segments and symlinks cannot
/// lead outside the root.
pub async fn confine_extract_dir(root: &Path, dir: &Path) -> Result<PathBuf, PipelineError> {
    let root = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| PipelineError::io(root, e))?;
    let resolved = match tokio::fs::canonicalize(dir).await {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::Validation(format!(
                "extraction directory {} does not exist",
                dir.display()
            ))
            .into());
        }
        Err(e) => return Err(PipelineError::io(dir, e)),
    };

    if resolved == root || !resolved.starts_with(&root) {
        return Err(CoreError::Validation(format!(
            "extraction directory {} is not inside {}",
            dir.display(),
            root.display()
        ))
        .into());
    }
    let metadata = tokio::fs::metadata(&resolved)
        .await
        .map_err(|e| PipelineError::io(&resolved, e))?;
    if !metadata.is_dir() {
        return Err(CoreError::Validation(format!(
            "extraction directory {} is not a directory",
            dir.display()
        ))
        .into());
    }
    Ok(resolved)
}

/// The regular files directly inside an extraction directory, sorted by
/// name so ingestion order is stable.
pub async fn list_extracted_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| PipelineError::io(entry.path(), e))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn skip(path: &Path, reason: &str) -> SkippedFile {
    tracing::warn!(path = %path.display(), reason, "Skipping file");
    SkippedFile {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use tempfile::TempDir;

    use crate::catalog::Catalog;
    use crate::memory::{MemoryCatalog, MemoryUploadQueue};

    const MIB: u64 = 1024 * 1024;

    struct Fixture {
        extract: TempDir,
        staging: TempDir,
        cache: TempDir,
        catalog: Arc<MemoryCatalog>,
        queue: Arc<MemoryUploadQueue>,
    }

    impl Fixture {
        fn new(annotators: &[&str]) -> Self {
            let catalog = Arc::new(MemoryCatalog::new());
            for id in annotators {
                catalog.add_annotator(id, id);
            }
            Self {
                extract: TempDir::new().unwrap(),
                staging: TempDir::new().unwrap(),
                cache: TempDir::new().unwrap(),
                catalog,
                queue: Arc::new(MemoryUploadQueue::new(5)),
            }
        }

        fn service(&self) -> IngestService {
            IngestService::new(
                self.catalog.clone(),
                self.queue.clone(),
                PipelineConfig {
                    extract_root: self.extract.path().to_path_buf(),
                    staging_root: self.staging.path().to_path_buf(),
                    cache_root: self.cache.path().to_path_buf(),
                    cache_root_name: "assembled-images".into(),
                    chunk_size: 5 * MIB,
                    max_attempts: 5,
                },
            )
        }

        async fn file(&self, name: &str, size: u64) -> PathBuf {
            let path = self.extract.path().join(name);
            let bytes: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            tokio::fs::write(&path, bytes).await.unwrap();
            path
        }

        fn request(&self, files: Vec<PathBuf>) -> IngestionRequest {
            IngestionRequest {
                dataset_id: "ds1".into(),
                name: "batch.zip".into(),
                data_type: DatasetType::Image,
                client_id: "client-1".into(),
                classes: Some("cat,dog".into()),
                size_bytes: None,
                files,
                extract_dir: None,
            }
        }
    }

    #[tokio::test]
    async fn mixed_batch_chunks_large_file_and_assigns_round_robin() {
        let fx = Fixture::new(&["a0", "a1"]);
        let files = vec![
            fx.file("small.png", MIB).await,
            fx.file("large.png", 12 * MIB).await,
            fx.file("empty.png", 0).await,
        ];

        let report = fx.service().submit_ingestion_batch(fx.request(files)).await.unwrap();

        assert_eq!(report.record_ids.len(), 3);
        assert_eq!(report.chunk_jobs, 3);
        assert_eq!(report.whole_file_jobs, 2);
        assert_eq!(report.cursor, 1);
        assert_eq!(fx.catalog.load_cursor().await.unwrap(), 1);

        let assigned: Vec<Option<String>> = fx
            .catalog
            .records_by_dataset("ds1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.annotator_id)
            .collect();
        assert_eq!(
            assigned,
            vec![Some("a0".into()), Some("a1".into()), Some("a0".into())]
        );

        let mut chunk_sizes = Vec::new();
        for (_, job) in fx.queue.jobs() {
            if let UploadJob::Chunk(chunk) = job {
                assert_eq!(chunk.file_name, "large.png");
                let len = tokio::fs::metadata(&chunk.staging_path).await.unwrap().len();
                chunk_sizes.push((chunk.chunk_index, len));
            }
        }
        assert_eq!(chunk_sizes, vec![(0, 5 * MIB), (1, 5 * MIB), (2, 2 * MIB)]);

        let link = fx.catalog.link("a0", "ds1").unwrap();
        assert_eq!(link.assigned_records, 2);
        let dataset = fx.catalog.find_dataset("ds1").await.unwrap().unwrap();
        assert_eq!(dataset.num_of_records, 3);
        assert_eq!(dataset.num_of_classes, 2);
        assert_eq!(dataset.size_bytes, (13 * MIB) as i64);
    }

    #[tokio::test]
    async fn cursor_carries_over_between_batches() {
        let fx = Fixture::new(&["a0", "a1", "a2"]);
        let first = vec![fx.file("one.txt", 10).await, fx.file("two.txt", 10).await];
        fx.service().submit_ingestion_batch(fx.request(first)).await.unwrap();

        let second = vec![fx.file("three.txt", 10).await, fx.file("four.txt", 10).await];
        let report = fx.service().submit_ingestion_batch(fx.request(second)).await.unwrap();
        assert_eq!(report.cursor, 1);

        let three = fx
            .catalog
            .find_record("ds1", &record_id_for_file_name("three.txt"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(three.annotator_id.as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn no_annotators_leaves_records_unassigned() {
        let fx = Fixture::new(&[]);
        fx.catalog.store_cursor(4).await.unwrap();
        let files = vec![fx.file("a.txt", 3).await];

        let report = fx.service().submit_ingestion_batch(fx.request(files)).await.unwrap();
        assert_eq!(report.cursor, 4);
        let records = fx.catalog.records_by_dataset("ds1").await.unwrap();
        assert_eq!(records[0].annotator_id, None);
    }

    #[tokio::test]
    async fn invalid_dataset_persists_nothing() {
        let fx = Fixture::new(&["a0"]);
        let files = vec![fx.file("a.txt", 3).await];
        let mut request = fx.request(files);
        request.client_id = "  ".into();

        let err = fx.service().submit_ingestion_batch(request).await.unwrap_err();
        assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
        assert!(fx.catalog.find_dataset("ds1").await.unwrap().is_none());
        assert!(fx.queue.jobs().is_empty());
        assert_eq!(fx.catalog.load_cursor().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped_without_advancing_cursor() {
        let fx = Fixture::new(&["a0", "a1"]);
        let files = vec![
            fx.extract.path().join("missing.png"),
            fx.file("present.png", 8).await,
        ];

        let report = fx.service().submit_ingestion_batch(fx.request(files)).await.unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.record_ids.len(), 1);
        assert_eq!(report.cursor, 1);
    }

    #[tokio::test]
    async fn reingesting_a_file_keeps_its_annotator_and_the_cursor() {
        let fx = Fixture::new(&["a0", "a1"]);
        let one = vec![fx.file("one.txt", 3).await];
        fx.service().submit_ingestion_batch(fx.request(one.clone())).await.unwrap();

        let report = fx.service().submit_ingestion_batch(fx.request(one)).await.unwrap();
        assert_eq!(report.cursor, 1);
        assert_eq!(fx.catalog.load_cursor().await.unwrap(), 1);

        let two = vec![fx.file("two.txt", 3).await];
        fx.service().submit_ingestion_batch(fx.request(two)).await.unwrap();

        let annotator_of = |name: &str| {
            let id = record_id_for_file_name(name);
            let catalog = fx.catalog.clone();
            async move {
                catalog
                    .find_record("ds1", &id)
                    .await
                    .unwrap()
                    .unwrap()
                    .annotator_id
            }
        };
        assert_eq!(annotator_of("one.txt").await.as_deref(), Some("a0"));
        assert_eq!(annotator_of("two.txt").await.as_deref(), Some("a1"));
        assert_eq!(fx.catalog.link("a0", "ds1").unwrap().assigned_records, 1);
    }

    #[tokio::test]
    async fn extraction_directory_outside_the_root_is_rejected_and_kept() {
        let fx = Fixture::new(&["a0"]);
        let elsewhere = TempDir::new().unwrap();
        let secret = elsewhere.path().join("secret.txt");
        tokio::fs::write(&secret, b"keep me").await.unwrap();

        let mut request = fx.request(vec![secret.clone()]);
        request.extract_dir = Some(elsewhere.path().to_path_buf());
        let err = fx.service().submit_ingestion_batch(request).await.unwrap_err();

        assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
        assert!(secret.exists());
        assert!(fx.catalog.find_dataset("ds1").await.unwrap().is_none());
        assert!(fx.queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn extract_root_itself_and_escapes_are_not_extraction_dirs() {
        let fx = Fixture::new(&[]);
        let root = fx.extract.path();
        tokio::fs::create_dir(root.join("batch")).await.unwrap();

        assert_matches!(
            confine_extract_dir(root, root).await,
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            confine_extract_dir(root, &root.join("batch/../..")).await,
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            confine_extract_dir(root, &root.join("missing")).await,
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
        let resolved = confine_extract_dir(root, &root.join("batch")).await.unwrap();
        assert!(resolved.ends_with("batch"));
    }

    #[tokio::test]
    async fn extracted_files_are_listed_in_name_order() {
        let fx = Fixture::new(&[]);
        fx.file("b.txt", 1).await;
        fx.file("a.txt", 1).await;
        tokio::fs::create_dir(fx.extract.path().join("nested")).await.unwrap();

        let files = list_extracted_files(fx.extract.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn extraction_directory_is_removed() {
        let fx = Fixture::new(&["a0"]);
        let batch_dir = fx.extract.path().join("batch");
        tokio::fs::create_dir_all(&batch_dir).await.unwrap();
        let path = batch_dir.join("a.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let mut request = fx.request(vec![path]);
        request.extract_dir = Some(batch_dir.clone());
        fx.service().submit_ingestion_batch(request).await.unwrap();

        assert!(!batch_dir.exists());
        let (_, job) = &fx.queue.jobs()[0];
        assert!(job.staging_path().exists());
    }
}
