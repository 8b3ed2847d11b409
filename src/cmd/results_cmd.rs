//! Inspection of saved profiling results (`navigator results ...`).

use clap::Subcommand;
use serde::Serialize;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{AnyRecord, Config, NavResult, NavigatorError, ProfilingResult, load_results};

#[derive(Debug, Subcommand)]
pub enum ResultsCommand {
    /// Print every profiled point with human-readable metric headers.
    Show { path: PathBuf },
    /// Pick the best point for one metric.
    Best {
        path: PathBuf,
        #[arg(long, default_value = "perf_throughput")]
        metric: String,
    },
    /// Compare two result files point by point.
    Diff { left: PathBuf, right: PathBuf },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDelta {
    pub batch_size: usize,
    pub concurrency: usize,
    pub metric: String,
    pub left: f64,
    pub right: f64,
    /// Positive when the right-hand run is better.
    pub improvement: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsDiff {
    pub improved: Vec<MetricDelta>,
    pub regressed: Vec<MetricDelta>,
    pub unchanged: usize,
    pub only_left: Vec<(usize, usize)>,
    pub only_right: Vec<(usize, usize)>,
}

pub fn results_command(config: &Config, command: &ResultsCommand) -> NavResult<serde_json::Value> {
    match command {
        ResultsCommand::Show { path } => {
            let results = load(config, path)?;
            let rows = results.iter().map(show_row).collect::<Vec<_>>();
            Ok(serde_json::Value::Array(rows))
        }
        ResultsCommand::Best { path, metric } => {
            if !AnyRecord::TAGS.contains(&metric.as_str()) {
                return Err(NavigatorError::InvalidArgument(format!(
                    "unknown metric {metric:?}; expected one of {}",
                    AnyRecord::TAGS.join(", ")
                )));
            }
            let results = load(config, path)?;
            let Some((result, record)) = best_by_tag(&results, metric) else {
                return Ok(serde_json::json!({ "metric": metric, "best": null }));
            };
            Ok(serde_json::json!({
                "metric": metric,
                "header": record.header(true),
                "value": record.value(),
                "batchSize": result.batch_size,
                "concurrency": result.concurrency,
            }))
        }
        ResultsCommand::Diff { left, right } => {
            let diff = diff_results(&load(config, left)?, &load(config, right)?);
            Ok(serde_json::to_value(diff)?)
        }
    }
}

fn load(config: &Config, path: &Path) -> NavResult<Vec<ProfilingResult>> {
    load_results(&config.resolve(path))
}

fn show_row(result: &ProfilingResult) -> serde_json::Value {
    let mut row = serde_json::Map::new();
    row.insert("Batch".to_string(), serde_json::json!(result.batch_size));
    row.insert("Concurrency".to_string(), serde_json::json!(result.concurrency));
    row.insert("Stable".to_string(), serde_json::json!(result.stable));
    for record in result.records.iter() {
        row.insert(record.header(false).to_string(), serde_json::json!(record.value()));
    }
    serde_json::Value::Object(row)
}

/// Best record of kind `tag` and the point it came from; the first point wins
/// ties.
pub fn best_by_tag<'a>(
    results: &'a [ProfilingResult],
    tag: &str,
) -> Option<(&'a ProfilingResult, AnyRecord)> {
    results
        .iter()
        .filter_map(|r| r.records.get_by_tag(tag).map(|rec| (r, *rec)))
        .reduce(|best, candidate| match candidate.1.improvement_over(&best.1) {
            Some(gain) if gain > 0.0 => candidate,
            _ => best,
        })
}

pub fn diff_results(left: &[ProfilingResult], right: &[ProfilingResult]) -> ResultsDiff {
    let key = |r: &ProfilingResult| (r.batch_size, r.concurrency);
    let right_by_point = right.iter().map(|r| (key(r), r)).collect::<BTreeMap<_, _>>();
    let left_points = left.iter().map(key).collect::<Vec<_>>();

    let mut diff = ResultsDiff {
        only_right: right_by_point
            .keys()
            .filter(|k| !left_points.contains(k))
            .copied()
            .collect(),
        ..ResultsDiff::default()
    };

    for l in left {
        let Some(r) = right_by_point.get(&key(l)) else {
            diff.only_left.push(key(l));
            continue;
        };
        for lrec in l.records.iter() {
            let Some(rrec) = r.records.get_by_tag(lrec.tag()) else {
                continue;
            };
            let Some(improvement) = rrec.improvement_over(lrec) else {
                continue;
            };
            let delta = MetricDelta {
                batch_size: l.batch_size,
                concurrency: l.concurrency,
                metric: lrec.tag().to_string(),
                left: lrec.value(),
                right: rrec.value(),
                improvement,
            };
            if improvement > 0.0 {
                diff.improved.push(delta);
            } else if improvement < 0.0 {
                diff.regressed.push(delta);
            } else {
                diff.unchanged += 1;
            }
        }
    }
    diff
}
