//! In-process [`Catalog`] and [`UploadQueue`] implementations.
//!
//! They mirror the Postgres semantics closely enough to drive the pipeline,
//! worker and HTTP tests without a database.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use labelhub_core::completion::{completion_percent, count_completed};
use labelhub_core::types::JobId;
use labelhub_db::models::annotator::{Annotator, AnnotatorDatasetLink};
use labelhub_db::models::dataset::{CreateDataset, Dataset};
use labelhub_db::models::record::{CreateRecord, Record, RecordAnnotation, UpdateRecord};
use labelhub_db::models::status::UploadJobStatus;

use crate::catalog::Catalog;
use crate::error::PipelineError;
use crate::queue::{
    retry_decision, ClaimedJob, RetryDecision, UploadJob, UploadProgress, UploadQueue,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CatalogState {
    datasets: HashMap<String, Dataset>,
    records: Vec<Record>,
    annotators: Vec<Annotator>,
    links: Vec<AnnotatorDatasetLink>,
    cursor: u64,
    next_seq: i64,
}

impl CatalogState {
    fn link_mut(&mut self, annotator_id: &str, dataset_id: &str) -> &mut AnnotatorDatasetLink {
        let position = self
            .links
            .iter()
            .position(|l| l.annotator_id == annotator_id && l.dataset_id == dataset_id);
        let index = match position {
            Some(index) => index,
            None => {
                let now = Utc::now();
                self.links.push(AnnotatorDatasetLink {
                    annotator_id: annotator_id.to_string(),
                    dataset_id: dataset_id.to_string(),
                    assigned_records: 0,
                    completed_records: 0,
                    created_at: now,
                    updated_at: now,
                });
                self.links.len() - 1
            }
        };
        &mut self.links[index]
    }
}

/// [`Catalog`] kept in a mutex-guarded struct.
#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active annotator at the end of the assignment order.
    pub fn add_annotator(&self, id: &str, name: &str) {
        let mut state = lock(&self.state);
        if let Some(existing) = state.annotators.iter_mut().find(|a| a.id == id) {
            existing.is_active = true;
            return;
        }
        state.annotators.push(Annotator {
            id: id.to_string(),
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        });
    }

    pub fn deactivate_annotator(&self, id: &str) {
        let mut state = lock(&self.state);
        if let Some(existing) = state.annotators.iter_mut().find(|a| a.id == id) {
            existing.is_active = false;
        }
    }

    pub fn link(&self, annotator_id: &str, dataset_id: &str) -> Option<AnnotatorDatasetLink> {
        lock(&self.state)
            .links
            .iter()
            .find(|l| l.annotator_id == annotator_id && l.dataset_id == dataset_id)
            .cloned()
    }
}

fn dataset_records<'a>(records: &'a [Record], dataset_id: &'a str) -> impl Iterator<Item = &'a Record> {
    records.iter().filter(move |r| r.dataset_id == dataset_id)
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn health_check(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn insert_dataset(&self, input: &CreateDataset) -> Result<Dataset, PipelineError> {
        let mut state = lock(&self.state);
        let now = Utc::now();
        let dataset = state
            .datasets
            .entry(input.id.clone())
            .and_modify(|d| {
                d.name = input.name.clone();
                d.data_type = input.data_type.clone();
                d.classes = input.classes.clone();
                d.num_of_classes = input.num_of_classes;
                d.size_bytes = input.size_bytes;
                d.modified_at = now;
            })
            .or_insert_with(|| Dataset {
                id: input.id.clone(),
                name: input.name.clone(),
                data_type: input.data_type.clone(),
                client_id: input.client_id.clone(),
                classes: input.classes.clone(),
                num_of_classes: input.num_of_classes,
                size_bytes: input.size_bytes,
                num_of_records: 0,
                completion_percent: 0.0,
                uploaded_at: now,
                modified_at: now,
            });
        Ok(dataset.clone())
    }

    async fn find_dataset(&self, dataset_id: &str) -> Result<Option<Dataset>, PipelineError> {
        Ok(lock(&self.state).datasets.get(dataset_id).cloned())
    }

    async fn datasets_for_client(&self, client_id: &str) -> Result<Vec<Dataset>, PipelineError> {
        let state = lock(&self.state);
        let mut datasets: Vec<Dataset> = state
            .datasets
            .values()
            .filter(|d| d.client_id == client_id)
            .cloned()
            .collect();
        datasets.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(datasets)
    }

    async fn insert_records(&self, records: &[CreateRecord]) -> Result<u64, PipelineError> {
        let mut state = lock(&self.state);
        let now = Utc::now();
        for input in records {
            if let Some(existing) = state
                .records
                .iter_mut()
                .find(|r| r.dataset_id == input.dataset_id && r.id == input.id)
            {
                existing.name = input.name.clone();
                if existing.annotator_id.is_none() {
                    existing.annotator_id = input.annotator_id.clone();
                }
                existing.updated_at = now;
                continue;
            }
            state.next_seq += 1;
            let seq = state.next_seq;
            state.records.push(Record {
                dataset_id: input.dataset_id.clone(),
                id: input.id.clone(),
                seq,
                name: input.name.clone(),
                annotator_id: input.annotator_id.clone(),
                annotations: None,
                in_use: false,
                created_at: now,
                updated_at: now,
            });
        }
        Ok(records.len() as u64)
    }

    async fn update_record_fields(
        &self,
        dataset_id: &str,
        record_id: &str,
        input: &UpdateRecord,
    ) -> Result<bool, PipelineError> {
        let mut state = lock(&self.state);
        let Some(record) = state
            .records
            .iter_mut()
            .find(|r| r.dataset_id == dataset_id && r.id == record_id)
        else {
            return Ok(false);
        };
        if let Some(annotations) = &input.annotations {
            record.annotations = Some(annotations.clone());
        }
        if let Some(in_use) = input.in_use {
            record.in_use = in_use;
        }
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_record(
        &self,
        dataset_id: &str,
        record_id: &str,
    ) -> Result<Option<Record>, PipelineError> {
        let state = lock(&self.state);
        let found = dataset_records(&state.records, dataset_id)
            .find(|r| r.id == record_id)
            .cloned();
        Ok(found)
    }

    async fn records_by_dataset(&self, dataset_id: &str) -> Result<Vec<Record>, PipelineError> {
        let state = lock(&self.state);
        Ok(dataset_records(&state.records, dataset_id).cloned().collect())
    }

    async fn records_by_annotator(
        &self,
        dataset_id: &str,
        annotator_id: &str,
    ) -> Result<Vec<Record>, PipelineError> {
        let state = lock(&self.state);
        Ok(dataset_records(&state.records, dataset_id)
            .filter(|r| r.annotator_id.as_deref() == Some(annotator_id))
            .cloned()
            .collect())
    }

    async fn record_annotations(
        &self,
        dataset_id: &str,
    ) -> Result<Vec<RecordAnnotation>, PipelineError> {
        let state = lock(&self.state);
        Ok(dataset_records(&state.records, dataset_id)
            .map(|r| RecordAnnotation {
                id: r.id.clone(),
                annotations: r.annotations.clone(),
            })
            .collect())
    }

    async fn active_annotators(&self) -> Result<Vec<Annotator>, PipelineError> {
        let state = lock(&self.state);
        Ok(state.annotators.iter().filter(|a| a.is_active).cloned().collect())
    }

    async fn load_cursor(&self) -> Result<u64, PipelineError> {
        Ok(lock(&self.state).cursor)
    }

    async fn store_cursor(&self, position: u64) -> Result<(), PipelineError> {
        lock(&self.state).cursor = position;
        Ok(())
    }

    async fn upsert_annotator_links(&self, dataset_id: &str) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        let mut assigned: Vec<(String, i32)> = Vec::new();
        for record in dataset_records(&state.records, dataset_id) {
            let Some(annotator_id) = &record.annotator_id else {
                continue;
            };
            match assigned.iter_mut().find(|(id, _)| id == annotator_id) {
                Some((_, count)) => *count += 1,
                None => assigned.push((annotator_id.clone(), 1)),
            }
        }
        for (annotator_id, count) in assigned {
            let link = state.link_mut(&annotator_id, dataset_id);
            link.assigned_records = count;
            link.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn recompute_annotator_completion(
        &self,
        annotator_id: &str,
        dataset_id: &str,
    ) -> Result<i32, PipelineError> {
        let mut state = lock(&self.state);
        let payloads: Vec<Option<&str>> = dataset_records(&state.records, dataset_id)
            .filter(|r| r.annotator_id.as_deref() == Some(annotator_id))
            .map(|r| r.annotations.as_deref())
            .collect();
        let assigned = payloads.len() as i32;
        let completed = count_completed(payloads) as i32;
        let link = state.link_mut(annotator_id, dataset_id);
        link.assigned_records = assigned;
        link.completed_records = completed;
        link.updated_at = Utc::now();
        Ok(completed)
    }

    async fn annotator_links(
        &self,
        annotator_id: &str,
    ) -> Result<Vec<AnnotatorDatasetLink>, PipelineError> {
        let state = lock(&self.state);
        Ok(state
            .links
            .iter()
            .filter(|l| l.annotator_id == annotator_id)
            .cloned()
            .collect())
    }

    async fn recompute_dataset_completion(&self, dataset_id: &str) -> Result<bool, PipelineError> {
        let mut state = lock(&self.state);
        let payloads: Vec<Option<&str>> = dataset_records(&state.records, dataset_id)
            .map(|r| r.annotations.as_deref())
            .collect();
        let total = payloads.len() as u64;
        let completed = count_completed(payloads);
        let Some(dataset) = state.datasets.get_mut(dataset_id) else {
            return Ok(false);
        };
        dataset.num_of_records = total as i32;
        dataset.completion_percent = completion_percent(completed, total);
        dataset.modified_at = Utc::now();
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Upload queue
// ---------------------------------------------------------------------------

struct QueuedJob {
    id: JobId,
    job: UploadJob,
    status: UploadJobStatus,
    attempts: i32,
    max_attempts: i32,
    run_after: Instant,
    claimed_at: Option<Instant>,
    last_error: Option<String>,
}

#[derive(Default)]
struct QueueState {
    jobs: Vec<QueuedJob>,
    next_id: JobId,
}

/// [`UploadQueue`] kept in memory. Same delivery rules as the Postgres
/// queue: one claim per job, delayed retries, stale-claim requeueing.
pub struct MemoryUploadQueue {
    state: Mutex<QueueState>,
    max_attempts: i32,
}

impl MemoryUploadQueue {
    pub fn new(max_attempts: i32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            max_attempts,
        }
    }

    pub fn status(&self, id: JobId) -> Option<UploadJobStatus> {
        lock(&self.state).jobs.iter().find(|j| j.id == id).map(|j| j.status)
    }

    pub fn last_error(&self, id: JobId) -> Option<String> {
        lock(&self.state)
            .jobs
            .iter()
            .find(|j| j.id == id)
            .and_then(|j| j.last_error.clone())
    }

    /// Every job ever enqueued, in enqueue order.
    pub fn jobs(&self) -> Vec<(JobId, UploadJob)> {
        lock(&self.state)
            .jobs
            .iter()
            .map(|j| (j.id, j.job.clone()))
            .collect()
    }

    pub fn count_with_status(&self, status: UploadJobStatus) -> usize {
        lock(&self.state)
            .jobs
            .iter()
            .filter(|j| j.status == status)
            .count()
    }

    /// Make every delayed retry due now.
    pub fn expire_delays(&self) {
        let now = Instant::now();
        for job in lock(&self.state).jobs.iter_mut() {
            job.run_after = now;
        }
    }
}

#[async_trait]
impl UploadQueue for MemoryUploadQueue {
    async fn enqueue(&self, job: &UploadJob) -> Result<JobId, PipelineError> {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.jobs.push(QueuedJob {
            id,
            job: job.clone(),
            status: UploadJobStatus::Pending,
            attempts: 0,
            max_attempts: self.max_attempts,
            run_after: Instant::now(),
            claimed_at: None,
            last_error: None,
        });
        Ok(id)
    }

    async fn claim(&self, _worker_id: &str) -> Result<Option<ClaimedJob>, PipelineError> {
        let mut state = lock(&self.state);
        let now = Instant::now();
        let next = state
            .jobs
            .iter_mut()
            .filter(|j| j.status == UploadJobStatus::Pending && j.run_after <= now)
            .min_by_key(|j| (j.run_after, j.id));
        let Some(job) = next else {
            return Ok(None);
        };
        job.status = UploadJobStatus::Running;
        job.attempts += 1;
        job.claimed_at = Some(now);
        Ok(Some(ClaimedJob {
            id: job.id,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            job: job.job.clone(),
        }))
    }

    async fn ack(&self, id: JobId) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
            job.status = UploadJobStatus::Completed;
            job.last_error = None;
            job.claimed_at = None;
        }
        Ok(())
    }

    async fn nack(&self, claimed: &ClaimedJob, error: &str) -> Result<RetryDecision, PipelineError> {
        let decision = retry_decision(claimed.attempts, claimed.max_attempts);
        let mut state = lock(&self.state);
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == claimed.id) {
            job.last_error = Some(error.to_string());
            job.claimed_at = None;
            match decision {
                RetryDecision::Retry(delay) => {
                    job.status = UploadJobStatus::Pending;
                    job.run_after = Instant::now() + delay;
                }
                RetryDecision::Failed => job.status = UploadJobStatus::Failed,
            }
        }
        Ok(decision)
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
            job.status = UploadJobStatus::Failed;
            job.last_error = Some(error.to_string());
            job.claimed_at = None;
        }
        Ok(())
    }

    async fn requeue_stale(&self, visibility_timeout: Duration) -> Result<u64, PipelineError> {
        let mut state = lock(&self.state);
        let now = Instant::now();
        let mut touched = 0;
        for job in state.jobs.iter_mut() {
            let stale = job.status == UploadJobStatus::Running
                && job
                    .claimed_at
                    .is_some_and(|at| now.duration_since(at) >= visibility_timeout);
            if !stale {
                continue;
            }
            job.status = if job.attempts >= job.max_attempts {
                UploadJobStatus::Failed
            } else {
                UploadJobStatus::Pending
            };
            job.last_error.get_or_insert_with(|| "claim expired".to_string());
            job.claimed_at = None;
            job.run_after = now;
            touched += 1;
        }
        Ok(touched)
    }

    async fn progress(&self, dataset_id: &str) -> Result<UploadProgress, PipelineError> {
        let mut progress = UploadProgress::default();
        for job in lock(&self.state)
            .jobs
            .iter()
            .filter(|j| j.job.dataset_id() == dataset_id)
        {
            progress.add(job.status, 1);
        }
        Ok(progress)
    }
}
