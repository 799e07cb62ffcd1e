use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::Serialize;

use crate::models::DailyIntake;

/// One subject's daily-average intake: the sum of that subject's per-day
/// totals divided by the number of days the subject has at least one
/// entry. Days without entries are absent from the breakdown and so never
/// drag the average down.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectAverage {
    pub subject: String,
    pub days: usize,
    pub average: f64,
}

/// Descriptive statistics over a list of per-subject daily averages.
#[derive(Debug, Clone, Serialize)]
pub struct Descriptives {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
}

/// Reduce a per-(subject, date) breakdown to one daily average per subject.
#[must_use]
pub fn subject_daily_averages(breakdown: &[DailyIntake]) -> Vec<SubjectAverage> {
    let mut per_subject: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for day in breakdown {
        let slot = per_subject.entry(day.subject.as_str()).or_insert((0.0, 0));
        slot.0 += day.value;
        slot.1 += 1;
    }
    per_subject
        .into_iter()
        .map(|(subject, (sum, days))| {
            #[allow(clippy::cast_precision_loss)]
            let average = sum / days as f64;
            SubjectAverage {
                subject: subject.to_string(),
                days,
                average,
            }
        })
        .collect()
}

/// Compute descriptives over a sample. Fails on an empty sample rather
/// than fabricating zero-sample statistics.
pub fn describe(values: &[f64]) -> Result<Descriptives> {
    if values.is_empty() {
        bail!("No data for the requested subjects and period");
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = sorted.len();
    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    // Population variance: the subjects queried are the whole population
    // of interest, not a sample from a larger one.
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Ok(Descriptives {
        count,
        mean,
        median: quantile(&sorted, 0.5),
        std_dev: variance.sqrt(),
        variance,
        min: sorted[0],
        max: sorted[count - 1],
        q1: quantile(&sorted, 0.25),
        q3: quantile(&sorted, 0.75),
    })
}

/// Quantile with linear interpolation between the two closest ranks.
/// Input must be sorted and non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let position = q * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let weight = position - position.floor();
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
