//! Query parameter types for the dataset endpoints.

use serde::Deserialize;

/// `GET /datasets` filter. Exactly one of the two is expected.
#[derive(Debug, Deserialize)]
pub struct DatasetListParams {
    pub client_id: Option<String>,
    pub annotator_id: Option<String>,
}

/// Review listing parameters (`?annotator_id=&page=&limit=`).
///
/// `page` and `limit` fall back to 1 and the default page size.
#[derive(Debug, Deserialize)]
pub struct RecordPageParams {
    pub annotator_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
