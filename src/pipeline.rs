//! Run driver
//!
//! [`Pipeline`] owns the shared HTTP client and the event channel, builds one
//! adapter per source in a fixed order and runs each of them to completion. A
//! failing source is logged, reported as [`Event::SourceSkipped`] and never
//! stops the run.

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::fetch::Fetcher;
use crate::sources::{AttackAdapter, CisaAdapter, MsrcAdapter, NvdAdapter, SourceAdapter};
use crate::types::{
    AdvisoryKind, Event, Framework, NormalizedRecord, RunSummary, SourceOutcome, SourceStatus,
};
use crate::writer::{output_path, write_jsonl};
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{Instrument, info, info_span, warn};

/// Ingestion run over every configured source
pub struct Pipeline {
    config: Config,
    fetcher: Fetcher,
    event_tx: broadcast::Sender<Event>,
}

impl Pipeline {
    /// Validate `config` and build the shared HTTP client
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client cannot be created
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(&config.http)?;

        // Events are dropped when nobody subscribes
        let (event_tx, _rx) = broadcast::channel(1000);

        Ok(Self {
            config,
            fetcher,
            event_tx,
        })
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this pipeline runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One adapter per source, in run order
    pub fn adapters(&self) -> Vec<Box<dyn SourceAdapter>> {
        let sources = &self.config.sources;
        vec![
            Box::new(NvdAdapter::new(self.fetcher.clone(), &sources.nvd_url)),
            Box::new(AttackAdapter::new(
                self.fetcher.clone(),
                &sources.attack_enterprise_url,
                Framework::Enterprise,
            )),
            Box::new(AttackAdapter::new(
                self.fetcher.clone(),
                &sources.attack_ics_url,
                Framework::Ics,
            )),
            Box::new(CisaAdapter::new(
                self.fetcher.clone(),
                &sources.cisa_alerts_url,
                AdvisoryKind::Alert,
            )),
            Box::new(CisaAdapter::new(
                self.fetcher.clone(),
                &sources.cisa_activity_url,
                AdvisoryKind::Activity,
            )),
            Box::new(MsrcAdapter::new(
                self.fetcher.clone(),
                &sources.msrc_base_url,
                self.config.lookback_days,
                self.config.msrc_api_key.clone(),
            )),
        ]
    }

    /// Run every source, naming output files after today's UTC date
    ///
    /// # Errors
    /// Only fails when the output directory cannot be created; per-source
    /// failures are reported in the returned summary.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_for_date(Utc::now().date_naive()).await
    }

    /// Run every source, naming output files after `date`
    pub async fn run_for_date(&self, date: NaiveDate) -> Result<RunSummary> {
        let output_dir = &self.config.output_dir;
        info!(
            "Starting daily intel ingestion for {} into {}",
            date,
            output_dir.display()
        );
        info!("Lookback days for date-filterable APIs: {}", self.config.lookback_days);

        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create output directory '{}': {}",
                    output_dir.display(),
                    e
                ),
            ))
        })?;

        let adapters = self.adapters();
        let outcomes = if self.config.parallel {
            futures::future::join_all(
                adapters
                    .iter()
                    .map(|adapter| self.run_source(adapter.as_ref(), date)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(adapters.len());
            for adapter in &adapters {
                outcomes.push(self.run_source(adapter.as_ref(), date).await);
            }
            outcomes
        };

        let summary = RunSummary { date, outcomes };
        self.emit(Event::RunComplete {
            succeeded: summary.written(),
            skipped: summary.skipped(),
        });
        info!(
            succeeded = summary.written(),
            skipped = summary.skipped(),
            "Intel ingestion complete."
        );

        Ok(summary)
    }

    /// Collect and write a single source; failures become a skipped outcome
    pub async fn run_source(&self, adapter: &dyn SourceAdapter, date: NaiveDate) -> SourceOutcome {
        let source = adapter.id();
        self.emit(Event::SourceStarted { source });

        let path = output_path(&self.config.output_dir, source, date);
        let result = async {
            let records = adapter.collect().await?;
            write_records(path.clone(), records).await
        }
        .instrument(info_span!("source", source = %source))
        .await;

        let status = match result {
            Ok(records) => {
                info!("Wrote {} {} records to {}", records, source, path.display());
                self.emit(Event::SourceCompleted {
                    source,
                    path: path.clone(),
                    records,
                });
                SourceStatus::Written { path, records }
            }
            Err(e) => {
                if e.kind() == ErrorKind::EmptyResult {
                    info!(source = %source, "No output for {}: {}", source, e);
                } else {
                    warn!(source = %source, code = e.error_code(), "Skipping {}: {}", source, e);
                }
                self.emit(Event::SourceSkipped {
                    source,
                    kind: e.kind(),
                    code: e.error_code().to_string(),
                    reason: e.to_string(),
                });
                SourceStatus::Skipped {
                    kind: e.kind(),
                    reason: e.to_string(),
                }
            }
        };

        SourceOutcome { source, status }
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

async fn write_records(path: PathBuf, records: Vec<NormalizedRecord>) -> Result<usize> {
    tokio::task::spawn_blocking(move || write_jsonl(&path, &records))
        .await
        .map_err(|e| Error::Other(format!("writer task failed: {}", e)))?
}
