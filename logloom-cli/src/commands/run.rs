//! `logloom run` command handler
//!
//! Builds the ingest pipeline from configuration plus CLI overrides, feeds
//! it lines from a file or stdin, streams records and alerts, and prints a
//! summary report on completion.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use logloom_core::config::LogloomConfig;
use logloom_core::pipeline::Pipeline;
use logloom_core::types::LogMessage;
use logloom_pipeline::{IngestPipeline, IngestPipelineBuilder, PipelineConfig};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
pub async fn execute(
    args: RunArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut config = LogloomConfig::load_or_default(config_path)
        .map_err(|e| CliError::Config(e.to_string()))?;
    apply_overrides(&mut config, &args);
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let source = args.source.clone().unwrap_or_else(|| match &args.input {
        Some(path) => format!("file:{}", path.display()),
        None => "stdin".to_owned(),
    });

    let (mut pipeline, mut record_rx, mut alert_rx) = IngestPipelineBuilder::new()
        .config(PipelineConfig::from_core(&config))
        .build()?;
    pipeline.start().await?;

    info!(source = %source, "ingest started");

    // Alerts are rendered to stderr as they arrive
    let alert_task = tokio::spawn(async move {
        let mut count = 0u64;
        while let Some(alert) = alert_rx.recv().await {
            tracing::warn!(
                kind = %alert.kind,
                severity = %alert.severity,
                value = alert.value,
                threshold = alert.threshold,
                "anomaly alert"
            );
            count += 1;
        }
        count
    });

    // Records are counted and optionally printed
    let print_records = args.records;
    let record_writer = OutputWriter::new(writer.format());
    let record_task = tokio::spawn(async move {
        let mut count = 0u64;
        let mut original_bytes = 0u64;
        let mut compressed_bytes = 0u64;
        while let Some(record) = record_rx.recv().await {
            count += 1;
            original_bytes += record.original_size as u64;
            compressed_bytes += record.compressed_size as u64;
            if print_records
                && let Err(e) = record_writer.render(&record)
            {
                tracing::warn!(error = %e, "failed to render record");
            }
        }
        (count, original_bytes, compressed_bytes)
    });

    let (submitted, rejected) = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            feed_lines(BufReader::new(file), &pipeline, &source).await?
        }
        None => feed_lines(BufReader::new(tokio::io::stdin()), &pipeline, &source).await?,
    };

    pipeline.stop().await?;

    let stats = pipeline.stats();
    let metrics = pipeline.pool_metrics();
    let alerts_dropped = pipeline.detector().alerts_dropped();

    // Dropping the pipeline closes the record and alert channels
    drop(pipeline);
    let (records, original_bytes, compressed_bytes) =
        record_task.await.unwrap_or((0, 0, 0));
    let alerts = alert_task.await.unwrap_or(0);

    let report = RunReport {
        source,
        lines_submitted: submitted,
        lines_rejected: rejected,
        records_emitted: records,
        alerts,
        alerts_dropped,
        total_clusters: stats.total_clusters,
        total_logs: stats.total_logs,
        average_cluster_size: stats.average_size,
        processed: metrics.processed,
        handler_errors: metrics.errors,
        dropped: metrics.dropped,
        avg_process_time_us: metrics.avg_process_time.as_micros() as u64,
        original_bytes,
        compressed_bytes,
        compression_ratio: if compressed_bytes > 0 {
            original_bytes as f64 / compressed_bytes as f64
        } else {
            0.0
        },
    };
    writer.render(&report)?;

    Ok(())
}

/// Apply CLI flag overrides on top of the loaded configuration.
fn apply_overrides(config: &mut LogloomConfig, args: &RunArgs) {
    if let Some(workers) = args.workers {
        config.pool.workers = workers;
    }
    if let Some(buffer) = args.buffer {
        config.pool.buffer_size = buffer;
    }
    if let Some(max_depth) = args.max_depth {
        config.drain.max_depth = max_depth;
    }
    if let Some(sim_threshold) = args.sim_threshold {
        config.drain.sim_threshold = sim_threshold;
    }
    if let Some(max_children) = args.max_children {
        config.drain.max_children = max_children;
    }
    if let Some(max_clusters) = args.max_clusters {
        config.drain.max_clusters = max_clusters;
    }
    if let Some(error_threshold) = args.error_threshold {
        config.detector.error_threshold = error_threshold;
    }
    if let Some(volume_threshold) = args.volume_threshold {
        config.detector.volume_threshold = volume_threshold;
    }
}

/// Feed lines into the pipeline until EOF or Ctrl-C.
async fn feed_lines<R: AsyncBufRead + Unpin>(
    reader: R,
    pipeline: &IngestPipeline,
    source: &str,
) -> Result<(u64, u64), CliError> {
    let mut lines = reader.lines();
    let mut submitted = 0u64;
    let mut rejected = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, draining pipeline");
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if pipeline.submit_blocking(LogMessage::new(line, source)).await {
                        submitted += 1;
                    } else {
                        // Cancelled mid-feed: stop reading
                        rejected += 1;
                        break;
                    }
                }
                None => break,
            }
        }
    }
    Ok((submitted, rejected))
}

/// Summary printed after a run completes.
#[derive(Debug, Serialize)]
struct RunReport {
    source: String,
    lines_submitted: u64,
    lines_rejected: u64,
    records_emitted: u64,
    alerts: u64,
    alerts_dropped: u64,
    total_clusters: usize,
    total_logs: u64,
    average_cluster_size: f64,
    processed: u64,
    handler_errors: u64,
    dropped: u64,
    avg_process_time_us: u64,
    original_bytes: u64,
    compressed_bytes: u64,
    compression_ratio: f64,
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Ingest summary for {}", self.source)?;
        writeln!(
            w,
            "  lines: {} submitted, {} rejected",
            self.lines_submitted, self.lines_rejected
        )?;
        writeln!(
            w,
            "  templates: {} clusters, {} logs, avg size {:.1}",
            self.total_clusters, self.total_logs, self.average_cluster_size
        )?;
        writeln!(
            w,
            "  pool: {} processed, {} errors, {} dropped, avg {}us",
            self.processed, self.handler_errors, self.dropped, self.avg_process_time_us
        )?;
        writeln!(
            w,
            "  records: {} emitted, {}B -> {}B (ratio {:.1}x)",
            self.records_emitted, self.original_bytes, self.compressed_bytes,
            self.compression_ratio
        )?;
        writeln!(
            w,
            "  alerts: {} raised, {} dropped",
            self.alerts, self.alerts_dropped
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> RunArgs {
        RunArgs {
            input: None,
            source: None,
            workers: None,
            buffer: None,
            max_depth: None,
            sim_threshold: None,
            max_children: None,
            max_clusters: None,
            error_threshold: None,
            volume_threshold: None,
            records: false,
        }
    }

    #[test]
    fn overrides_apply_to_config() {
        let mut config = LogloomConfig::default();
        let args = RunArgs {
            workers: Some(4),
            buffer: Some(256),
            max_depth: Some(6),
            sim_threshold: Some(0.7),
            error_threshold: Some(2.0),
            ..default_args()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.pool.workers, 4);
        assert_eq!(config.pool.buffer_size, 256);
        assert_eq!(config.drain.max_depth, 6);
        assert!((config.drain.sim_threshold - 0.7).abs() < f64::EPSILON);
        assert!((config.detector.error_threshold - 2.0).abs() < f64::EPSILON);
        // Untouched fields keep defaults
        assert_eq!(config.drain.max_children, 100);
    }

    #[test]
    fn no_overrides_keep_defaults() {
        let mut config = LogloomConfig::default();
        apply_overrides(&mut config, &default_args());
        assert_eq!(config.pool.workers, 100);
    }

    #[test]
    fn report_renders_all_sections() {
        let report = RunReport {
            source: "file:app.log".to_owned(),
            lines_submitted: 100,
            lines_rejected: 0,
            records_emitted: 100,
            alerts: 2,
            alerts_dropped: 0,
            total_clusters: 7,
            total_logs: 100,
            average_cluster_size: 14.3,
            processed: 100,
            handler_errors: 0,
            dropped: 0,
            avg_process_time_us: 42,
            original_bytes: 5000,
            compressed_bytes: 900,
            compression_ratio: 5.6,
        };
        let mut buf = Vec::new();
        report.render_text(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("file:app.log"));
        assert!(out.contains("7 clusters"));
        assert!(out.contains("ratio 5.6x"));
    }
}
