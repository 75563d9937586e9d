//! Thresholding and interval merging on the smoothed score.
//!
//! One left-to-right pass flags runs of samples with `score >= threshold`.
//! A run opens at its first flagged sample and closes at the first sample
//! below threshold (or at `N` when the recording ends inside a run), so the
//! sample run `[i0, i1)` maps to the half-open interval `[i0 / fs, i1 / fs)`.
//!
//! Consecutive runs separated by less than `min_good_gap_s` of clean data
//! are merged: a short lull between bursts is not trusted as good data.
use std::ops::Range;

use serde::Serialize;

/// One flagged (possibly gap-merged) region, in seconds, half-open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArtifactInterval {
    pub start_time_s: f64,
    pub end_time_s: f64,
}

impl ArtifactInterval {
    pub fn duration_s(&self) -> f64 {
        self.end_time_s - self.start_time_s
    }

    /// Whether the two intervals share any time.
    pub fn overlaps(&self, other: &ArtifactInterval) -> bool {
        self.start_time_s < other.end_time_s && other.start_time_s < self.end_time_s
    }
}

/// An interval together with its strongest score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MuscleEvent {
    #[serde(flatten)]
    pub interval: ArtifactInterval,
    pub peak_time_s: f64,
    pub peak_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    Inside { start: usize },
}

/// Sample runs where `score >= threshold`, in ascending order.
pub fn flag_runs(score: &[f64], threshold: f64) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut state = State::Outside;
    for (i, &v) in score.iter().enumerate() {
        state = match (state, v >= threshold) {
            (State::Outside, true) => State::Inside { start: i },
            (State::Inside { start }, false) => {
                runs.push(start..i);
                State::Outside
            }
            (s, _) => s,
        };
    }
    if let State::Inside { start } = state {
        runs.push(start..score.len());
    }
    runs
}

/// Merge runs whose clean gap is shorter than `min_good_gap_s`.
///
/// `runs` must be sorted and disjoint, as produced by [`flag_runs`].
pub fn merge_runs(runs: &[Range<usize>], sfreq: f64, min_good_gap_s: f64) -> Vec<Range<usize>> {
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(prev) if ((run.start - prev.end) as f64 / sfreq) < min_good_gap_s => {
                prev.end = run.end;
            }
            _ => merged.push(run.clone()),
        }
    }
    merged
}

/// Convert a sample run to seconds.
pub fn run_to_interval(run: &Range<usize>, sfreq: f64) -> ArtifactInterval {
    ArtifactInterval {
        start_time_s: run.start as f64 / sfreq,
        end_time_s: run.end as f64 / sfreq,
    }
}

/// Threshold `score`, merge short gaps and describe each resulting event.
pub fn detect_events(
    score: &[f64],
    sfreq: f64,
    threshold: f64,
    min_good_gap_s: f64,
) -> Vec<MuscleEvent> {
    let raw = flag_runs(score, threshold);
    merge_runs(&raw, sfreq, min_good_gap_s)
        .iter()
        .map(|run| {
            let (peak_idx, peak_score) = run
                .clone()
                .map(|i| (i, score[i]))
                .fold((run.start, f64::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 { cur } else { best }
                });
            MuscleEvent {
                interval: run_to_interval(run, sfreq),
                peak_time_s: peak_idx as f64 / sfreq,
                peak_score,
            }
        })
        .collect()
}

/// Threshold `score` and merge short gaps.
pub fn detect_intervals(
    score: &[f64],
    sfreq: f64,
    threshold: f64,
    min_good_gap_s: f64,
) -> Vec<ArtifactInterval> {
    let raw = flag_runs(score, threshold);
    merge_runs(&raw, sfreq, min_good_gap_s)
        .iter()
        .map(|run| run_to_interval(run, sfreq))
        .collect()
}
