use async_trait::async_trait;
use marketlens_agent::{ReportRecord, ReportStore, ReportSummary};
use marketlens_core::{MarketlensError, MarketlensResult, Step};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-based report store (JSON files on disk).
///
/// Layout under the root directory:
/// - `reports/{id}.json` — one [`ReportRecord`] per finished run
/// - `steps/{id}/{seq:04}.json` — the run's step history, one file per step
pub struct FileReportStore {
    reports_dir: PathBuf,
    steps_dir: PathBuf,
}

fn io_err(what: &str, path: &Path, e: std::io::Error) -> MarketlensError {
    MarketlensError::Persistence(format!("{what} {}: {e}", path.display()))
}

/// Ids become file names, so only a conservative character set is accepted.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Writes through a temporary file so readers never see a partial report.
async fn write_atomic(path: &Path, contents: String) -> MarketlensResult<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| io_err("cannot write", &tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_err("cannot move into place", path, e))
}

impl FileReportStore {
    pub async fn new(dir: impl Into<PathBuf>) -> MarketlensResult<Self> {
        let dir = dir.into();
        let reports_dir = dir.join("reports");
        let steps_dir = dir.join("steps");
        for d in [&reports_dir, &steps_dir] {
            tokio::fs::create_dir_all(d)
                .await
                .map_err(|e| io_err("cannot create", d, e))?;
        }
        Ok(Self {
            reports_dir,
            steps_dir,
        })
    }

    fn report_path(&self, id: &str) -> PathBuf {
        self.reports_dir.join(format!("{id}.json"))
    }

    async fn read_report(path: &Path) -> MarketlensResult<ReportRecord> {
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_err("cannot read", path, e))?;
        serde_json::from_str(&data).map_err(|e| {
            MarketlensError::Persistence(format!("failed to parse report {}: {e}", path.display()))
        })
    }

    /// Stored steps of a run, in order.
    pub async fn load_steps(&self, run_id: &str) -> MarketlensResult<Vec<Step>> {
        if !is_valid_id(run_id) {
            return Ok(Vec::new());
        }
        let dir = self.steps_dir.join(run_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err("cannot list", &dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err("cannot list", &dir, e))?
        {
            let path = entry.path();
            let seq = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<usize>().ok());
            if let (Some(seq), Some("json")) = (seq, path.extension().and_then(|e| e.to_str())) {
                files.push((seq, path));
            }
        }
        files.sort_by_key(|(seq, _)| *seq);

        let mut steps = Vec::with_capacity(files.len());
        for (_, path) in files {
            let data = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| io_err("cannot read", &path, e))?;
            steps.push(serde_json::from_str(&data)?);
        }
        Ok(steps)
    }
}

#[async_trait]
impl ReportStore for FileReportStore {
    async fn save_report(&self, record: &ReportRecord) -> MarketlensResult<()> {
        if !is_valid_id(&record.id) {
            return Err(MarketlensError::Persistence(format!(
                "invalid report id '{}'",
                record.id
            )));
        }
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&self.report_path(&record.id), json).await?;
        debug!(run_id = %record.id, ticker = %record.ticker, "Report stored");
        Ok(())
    }

    async fn save_step(&self, run_id: &str, step: &Step, seq: usize) -> MarketlensResult<()> {
        if !is_valid_id(run_id) {
            return Err(MarketlensError::Persistence(format!("invalid run id '{run_id}'")));
        }
        let dir = self.steps_dir.join(run_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_err("cannot create", &dir, e))?;
        let json = serde_json::to_string(step)?;
        write_atomic(&dir.join(format!("{seq:04}.json")), json).await
    }

    async fn get_report(&self, id: &str) -> MarketlensResult<Option<ReportRecord>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let path = self.report_path(id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        Self::read_report(&path).await.map(Some)
    }

    async fn list_reports(
        &self,
        limit: usize,
        ticker: Option<&str>,
    ) -> MarketlensResult<Vec<ReportSummary>> {
        let mut entries = tokio::fs::read_dir(&self.reports_dir)
            .await
            .map_err(|e| io_err("cannot list", &self.reports_dir, e))?;

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err("cannot list", &self.reports_dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_report(&path).await {
                Ok(record) => summaries.push(record.summary()),
                Err(e) => warn!(error = %e, "Skipping unreadable report"),
            }
        }

        if let Some(ticker) = ticker {
            summaries.retain(|s| s.ticker.eq_ignore_ascii_case(ticker));
        }
        summaries.sort_by(|a, b| {
            b.generated_at
                .cmp(&a.generated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        summaries.truncate(limit);
        Ok(summaries)
    }
}
