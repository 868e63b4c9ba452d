//! Harvesting a paginated record store into compressed archive units.
//!
//! The store is queried as `GET <endpoint>?limit={L}&offset={O}`. A
//! [`BatchPlanner`] divides the store's `totalRecords` into batches of
//! `batch_size` records; each batch is fetched as `batch_size / page_limit`
//! consecutive pages and written to one gzip file holding a single JSON-lines
//! member:
//!
//! ```text
//! srs-marc-export-000.jsonl.gz  (member srs-marc-export-000.jsonl)
//! srs-marc-export-001.jsonl.gz
//! ...
//! ```
//!
//! Units used to be zip archives named `srs-marc-export-NNN.zip`. Downstream
//! consumers that look for that name must switch to
//! `srs-marc-export-NNN.jsonl.gz` and read it with a gzip decoder; the
//! payload is the same one JSON record per line.
//!
//! Fetch failures propagate; retrying is the caller's business.

use crate::config::{BatchRounding, HarvestConfig};
use crate::error::{MarcError, Result};
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One page of a record store query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePage {
    /// Raw records on this page
    #[serde(alias = "sourceRecords", default)]
    pub records: Vec<Value>,
    /// Total records in the store
    #[serde(rename = "totalRecords")]
    pub total_records: usize,
}

/// A paginated record store.
pub trait RecordStore {
    /// Fetch up to `limit` records starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or answers badly.
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<SourcePage>;

    /// Total records in the store, from a one-record query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count_records(&self) -> Result<usize> {
        Ok(self.fetch_page(0, 1)?.total_records)
    }
}

/// Total records in `store`.
///
/// # Errors
///
/// Returns an error if the count query fails.
pub fn count_records<S: RecordStore + ?Sized>(store: &S) -> Result<usize> {
    store.count_records()
}

/// Plans fixed-size batches over a record total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlanner {
    batch_size: usize,
    page_limit: usize,
    rounding: BatchRounding,
}

impl BatchPlanner {
    /// Create a planner.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::Config`] if either size is zero or `batch_size`
    /// is not a multiple of `page_limit`.
    pub fn new(batch_size: usize, page_limit: usize, rounding: BatchRounding) -> Result<Self> {
        let planner = BatchPlanner {
            batch_size,
            page_limit,
            rounding,
        };
        HarvestConfig {
            batch_size,
            page_limit,
            rounding,
            ..HarvestConfig::default()
        }
        .validate()?;
        Ok(planner)
    }

    /// Create a planner from harvest settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        Self::new(config.batch_size, config.page_limit, config.rounding)
    }

    /// Records per batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records per page request.
    #[must_use]
    pub fn page_limit(&self) -> usize {
        self.page_limit
    }

    /// Page requests per batch.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.batch_size / self.page_limit
    }

    /// Number of batches covering `total_records`.
    #[must_use]
    pub fn total_batches(&self, total_records: usize) -> usize {
        match self.rounding {
            BatchRounding::Floor => total_records / self.batch_size,
            BatchRounding::Ceiling => total_records.div_ceil(self.batch_size),
        }
    }

    /// Batch indices `0..total_batches`.
    #[must_use]
    pub fn plan(&self, total_records: usize) -> Vec<usize> {
        (0..self.total_batches(total_records)).collect()
    }

    /// Page offsets fetched for batch `index`.
    pub fn page_offsets(&self, index: usize) -> impl Iterator<Item = usize> {
        let start = index * self.batch_size;
        let limit = self.page_limit;
        (0..self.shard_count()).map(move |j| start + j * limit)
    }
}

/// Name of the archive for batch `index`, without extension.
#[must_use]
pub fn batch_file_base(prefix: &str, index: usize) -> String {
    format!("{prefix}-{index:03}")
}

/// Write `records` as one gzip archive `{base}.jsonl.gz` in `dir` whose
/// single member `{base}.jsonl` has one JSON record per line.
///
/// The archive is written to a temporary file and renamed into place.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized or the file cannot be written.
pub fn save_batch(dir: &Path, prefix: &str, index: usize, records: &[Value]) -> Result<PathBuf> {
    let base = batch_file_base(prefix, index);
    let path = dir.join(format!("{base}.jsonl.gz"));
    let tmp = tempfile::NamedTempFile::new_in(dir)?;

    {
        let mut encoder: GzEncoder<BufWriter<&std::fs::File>> = GzBuilder::new()
            .filename(format!("{base}.jsonl"))
            .write(BufWriter::new(tmp.as_file()), Compression::default());
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                encoder.write_all(b"\n")?;
            }
            serde_json::to_writer(&mut encoder, record)?;
        }
        encoder.finish()?.flush()?;
    }

    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| MarcError::IoError(e.error))?;
    Ok(path)
}

/// Runs planned batches against a [`RecordStore`].
#[derive(Debug, Clone)]
pub struct Harvester {
    planner: BatchPlanner,
    file_prefix: String,
}

impl Harvester {
    /// Create a harvester from harvest settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        Ok(Harvester {
            planner: BatchPlanner::from_config(config)?,
            file_prefix: config.file_prefix.clone(),
        })
    }

    /// The planner in use.
    #[must_use]
    pub fn planner(&self) -> &BatchPlanner {
        &self.planner
    }

    /// Count the store's records and plan batches over them.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn calculate_batches<S: RecordStore + ?Sized>(&self, store: &S) -> Result<Vec<usize>> {
        let total = count_records(store)?;
        let plan = self.planner.plan(total);
        info!(
            "{total} records in store, {} batches of {}",
            plan.len(),
            self.planner.batch_size()
        );
        Ok(plan)
    }

    /// Fetch the records of batch `index`.
    ///
    /// Stops early when a page comes back short, since later pages would be
    /// past the end of the store.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error.
    pub fn fetch_batch<S: RecordStore + ?Sized>(&self, store: &S, index: usize) -> Result<Vec<Value>> {
        let limit = self.planner.page_limit();
        let mut batch = Vec::new();
        for offset in self.planner.page_offsets(index) {
            debug!("Fetching records offset={offset} limit={limit}");
            let page = store.fetch_page(offset, limit)?;
            let short = page.records.len() < limit;
            batch.extend(page.records);
            if short {
                break;
            }
        }
        Ok(batch)
    }

    /// Fetch batch `index` and write its archive to `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching or writing fails.
    pub fn export_batch<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        dir: &Path,
        index: usize,
    ) -> Result<PathBuf> {
        let batch = self.fetch_batch(store, index)?;
        let path = save_batch(dir, &self.file_prefix, index, &batch)?;
        info!("Saved {} records to {}", batch.len(), path.display());
        Ok(path)
    }

    /// Plan and export every batch, returning archive paths in batch order.
    ///
    /// # Errors
    ///
    /// Returns the first error; archives already written stay in place.
    pub fn run<S: RecordStore + ?Sized>(&self, store: &S, dir: &Path) -> Result<Vec<PathBuf>> {
        self.calculate_batches(store)?
            .into_iter()
            .map(|index| self.export_batch(store, dir, index))
            .collect()
    }
}

/// An in-memory record store.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Vec<Value>,
}

impl MemoryRecordStore {
    /// Create a store over `records`.
    #[must_use]
    pub fn new(records: Vec<Value>) -> Self {
        MemoryRecordStore { records }
    }
}

impl RecordStore for MemoryRecordStore {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<SourcePage> {
        let start = offset.min(self.records.len());
        let end = offset.saturating_add(limit).min(self.records.len());
        Ok(SourcePage {
            records: self.records[start..end].to_vec(),
            total_records: self.records.len(),
        })
    }
}

#[cfg(feature = "http")]
pub use http::HttpRecordStore;

#[cfg(feature = "http")]
mod http {
    use super::{RecordStore, SourcePage};
    use crate::error::{MarcError, Result};
    use reqwest::blocking::Client;

    /// Record store reached over HTTP with a blocking client.
    ///
    /// Authentication is the caller's concern: configure default headers on
    /// the [`Client`] passed to [`HttpRecordStore::with_client`].
    #[derive(Debug, Clone)]
    pub struct HttpRecordStore {
        client: Client,
        url: String,
    }

    impl HttpRecordStore {
        /// Store at `url`, e.g. `https://okapi.example.edu/source-storage/source-records`.
        ///
        /// # Errors
        ///
        /// Returns an error if the HTTP client cannot be built.
        pub fn new(url: impl Into<String>) -> Result<Self> {
            let client = Client::builder()
                .user_agent(format!("libsys-marc/{}", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| MarcError::Store(e.to_string()))?;
            Ok(Self::with_client(client, url))
        }

        /// Store at `url` using a preconfigured client.
        #[must_use]
        pub fn with_client(client: Client, url: impl Into<String>) -> Self {
            HttpRecordStore {
                client,
                url: url.into(),
            }
        }
    }

    impl RecordStore for HttpRecordStore {
        fn fetch_page(&self, offset: usize, limit: usize) -> Result<SourcePage> {
            self.client
                .get(&self.url)
                .query(&[("limit", limit), ("offset", offset)])
                .send()
                .and_then(reqwest::blocking::Response::error_for_status)
                .and_then(reqwest::blocking::Response::json::<SourcePage>)
                .map_err(|e| MarcError::Store(format!("GET {} failed: {e}", self.url)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;

    fn store_of(n: usize) -> MemoryRecordStore {
        MemoryRecordStore::new((0..n).map(|i| json!({ "id": i })).collect())
    }

    #[test]
    fn test_plan_full_batches() {
        let planner = BatchPlanner::new(5_000, 500, BatchRounding::Floor).unwrap();
        assert_eq!(planner.plan(50_000), (0..10).collect::<Vec<_>>());
        assert_eq!(planner.shard_count(), 10);
    }

    #[test]
    fn test_plan_single_page_batches() {
        let planner = BatchPlanner::new(5_000, 5_000, BatchRounding::Ceiling).unwrap();
        assert_eq!(planner.plan(50_000), (0..=9).collect::<Vec<_>>());
        assert_eq!(planner.page_offsets(3).collect::<Vec<_>>(), vec![15_000]);
    }

    #[test]
    fn test_plan_rounding() {
        let floor = BatchPlanner::new(5_000, 5_000, BatchRounding::Floor).unwrap();
        let ceiling = BatchPlanner::new(5_000, 5_000, BatchRounding::Ceiling).unwrap();
        assert_eq!(floor.plan(12_345), vec![0, 1]);
        assert_eq!(ceiling.plan(12_345), vec![0, 1, 2]);
        assert_eq!(ceiling.plan(10_000), vec![0, 1]);
        assert!(ceiling.plan(0).is_empty());
    }

    #[test]
    fn test_planner_rejects_bad_sizes() {
        assert!(BatchPlanner::new(5_000, 3_000, BatchRounding::Floor).is_err());
        assert!(BatchPlanner::new(5_000, 0, BatchRounding::Floor).is_err());
    }

    #[test]
    fn test_page_offsets() {
        let planner = BatchPlanner::new(50_000, 5_000, BatchRounding::Ceiling).unwrap();
        let offsets: Vec<usize> = planner.page_offsets(2).collect();
        assert_eq!(offsets.len(), 10);
        assert_eq!(offsets[0], 100_000);
        assert_eq!(offsets[9], 145_000);
    }

    #[test]
    fn test_source_page_accepts_srs_key() {
        let page: SourcePage =
            serde_json::from_str(r#"{"sourceRecords": [{"id": 1}], "totalRecords": 7}"#).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.total_records, 7);
    }

    #[test]
    fn test_save_batch_writes_named_jsonl_member() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![json!({"id": "a"}), json!({"id": "b"})];
        let path = save_batch(dir.path(), "srs-marc-export", 7, &records).unwrap();
        assert_eq!(path.file_name().unwrap(), "srs-marc-export-007.jsonl.gz");

        let mut decoder = GzDecoder::new(std::fs::File::open(&path).unwrap());
        let mut contents = String::new();
        decoder.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "{\"id\":\"a\"}\n{\"id\":\"b\"}");
        let header = decoder.header().unwrap();
        assert_eq!(header.filename(), Some(&b"srs-marc-export-007.jsonl"[..]));

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["srs-marc-export-007.jsonl.gz"]);
    }

    #[test]
    fn test_fetch_batch_stops_on_short_page() {
        let harvester = Harvester::new(&HarvestConfig {
            batch_size: 10,
            page_limit: 2,
            ..HarvestConfig::default()
        })
        .unwrap();
        let batch = harvester.fetch_batch(&store_of(13), 1).unwrap();
        assert_eq!(batch, vec![json!({"id": 10}), json!({"id": 11}), json!({"id": 12})]);
    }

    #[test]
    fn test_count_records() {
        assert_eq!(count_records(&store_of(42)).unwrap(), 42);
    }
}
