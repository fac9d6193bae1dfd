/// Dataset identity. Content-derived, supplied by the uploading client.
pub type DatasetId = String;

/// Record identity: SHA-256 hex of the original file name.
pub type RecordId = String;

/// Annotator (user) identity.
pub type AnnotatorId = String;

/// Upload job primary key (PostgreSQL BIGSERIAL).
pub type JobId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
