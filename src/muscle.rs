//! The muscle-artifact z-score detector.
//!
//! Matches `mne.preprocessing.annotate_muscle_zscore`:
//!
//! ```text
//! [C, T] one sensor type
//!   │
//!   ├─ (mirror padding)       optional, padding_s per side
//!   ├─ (notch)                optional power-line band-stop
//!   ├─ band-pass              zero-phase FIR, default 110–140 Hz
//!   ├─ envelope               |analytic signal| per channel
//!   ├─ z-score                per channel, ddof = 0; flat channels skipped
//!   ├─ aggregate              Σ_c z / sqrt(n_active)
//!   ├─ smooth                 zero-phase FIR low-pass, default 4 Hz
//!   ├─ (strip padding)
//!   └─ threshold + merge      → [ArtifactInterval]
//! ```
use ndarray::{s, Array1, Array2, ArrayView2};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channels::SensorType;
use crate::config::{BandConfig, DetectionConfig};
use crate::detect::{detect_events, ArtifactInterval, MuscleEvent};
use crate::envelope::envelope_rows;
use crate::error::Result;
use crate::filter::{design_bandpass, design_lowpass, design_notch, filter_1d, filter_rows};
use crate::normalize::{aggregate_zscores, zscore_rows, SkippedChannel};
use crate::signal::SignalMatrix;

/// Smoothed aggregate z-score, one value per input sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSeries {
    values: Vec<f64>,
    sfreq: f64,
}

impl ScoreSeries {
    pub fn new(values: Vec<f64>, sfreq: f64) -> Self {
        Self { values, sfreq }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Time of sample `i` in seconds.
    pub fn time_of(&self, i: usize) -> f64 {
        i as f64 / self.sfreq
    }

    /// `(time_s, score)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().enumerate().map(|(i, &v)| (self.time_of(i), v))
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Result of one detector run.
#[derive(Debug, Clone)]
pub struct MuscleDetection {
    pub score: ScoreSeries,
    pub events: Vec<MuscleEvent>,
    /// Names of the channels that entered the aggregate.
    pub channels_used: Vec<String>,
    pub skipped: Vec<SkippedChannel>,
    pub threshold: f64,
    pub min_good_gap_s: f64,
}

impl MuscleDetection {
    /// Detected intervals, sorted and disjoint.
    pub fn intervals(&self) -> Vec<ArtifactInterval> {
        self.events.iter().map(|e| e.interval).collect()
    }

    /// Re-threshold the same score without recomputing the signal stages.
    pub fn rethreshold(&self, threshold: f64) -> Vec<MuscleEvent> {
        detect_events(self.score.values(), self.score.sfreq(), threshold, self.min_good_gap_s)
    }

    /// Serialisable QC summary.
    pub fn summary(&self, ch_type: Option<SensorType>) -> MuscleSummary {
        let duration_s = self.score.len() as f64 / self.score.sfreq();
        let flagged_s: f64 = self.events.iter().map(|e| e.interval.duration_s()).sum();
        MuscleSummary {
            ch_type,
            threshold: self.threshold,
            min_good_gap_s: self.min_good_gap_s,
            recording_duration_s: duration_s,
            n_channels_used: self.channels_used.len(),
            skipped_channels: self.skipped.clone(),
            n_events: self.events.len(),
            total_artifact_duration_s: flagged_s,
            artifact_fraction: if duration_s > 0.0 { flagged_s / duration_s } else { 0.0 },
            max_score: self.score.max(),
            events: self.events.clone(),
        }
    }
}

/// Simple QC metrics for one sensor type, written next to the tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MuscleSummary {
    pub ch_type: Option<SensorType>,
    pub threshold: f64,
    pub min_good_gap_s: f64,
    pub recording_duration_s: f64,
    pub n_channels_used: usize,
    pub skipped_channels: Vec<SkippedChannel>,
    pub n_events: usize,
    pub total_artifact_duration_s: f64,
    pub artifact_fraction: f64,
    pub max_score: f64,
    pub events: Vec<MuscleEvent>,
}

/// Every intermediate array of one run, cropped to the input time axis.
///
/// Channel arrays hold the non-flat channels only (`live`), and `zscores`
/// only the channels that entered the aggregate (`active`).
#[derive(Debug, Clone)]
pub struct MuscleStages {
    /// Input rows of the channels that were filtered.
    pub live: Vec<usize>,
    /// After the optional notch; `None` when no notch was requested.
    pub notched: Option<Array2<f64>>,
    pub bandpass: Array2<f64>,
    pub envelope: Array2<f64>,
    /// `[n_active, T]`
    pub zscores: Array2<f64>,
    /// Input rows of the channels that entered the aggregate.
    pub active: Vec<usize>,
    pub skipped: Vec<SkippedChannel>,
    pub raw_score: Array1<f64>,
    pub score: Array1<f64>,
    /// Mirror samples that were attached to each side.
    pub pad: usize,
}

/// Zero-phase band-pass of every row.
pub fn bandpass(data: ArrayView2<'_, f64>, band: &BandConfig, sfreq: f64) -> Array2<f64> {
    let h = design_bandpass(band.low_hz, band.high_hz, sfreq);
    debug!(taps = h.len(), low = band.low_hz, high = band.high_hz, "band-pass");
    filter_rows(data, &h)
}

/// Zero-phase low-pass of the aggregate score.
pub fn smooth(score: &[f64], cutoff_hz: f64, sfreq: f64) -> Vec<f64> {
    let h = design_lowpass(cutoff_hz, sfreq);
    debug!(taps = h.len(), cutoff_hz, "smoothing");
    filter_1d(score, &h)
}

/// Attach `pad` mirrored samples to both ends of every row.
///
/// The mirror excludes the edge sample itself, so the extension is
/// continuous. `pad` must not exceed `T - 1`.
pub fn attach_mirror_padding(data: ArrayView2<'_, f64>, pad: usize) -> Array2<f64> {
    let (n_ch, n_t) = data.dim();
    let mut out = Array2::<f64>::zeros((n_ch, n_t + 2 * pad));
    for (src, mut dst) in data.rows().into_iter().zip(out.rows_mut()) {
        for i in 0..pad {
            dst[pad - 1 - i] = src[i + 1];
            dst[pad + n_t + i] = src[n_t - 2 - i];
        }
        dst.slice_mut(s![pad..pad + n_t]).assign(&src);
    }
    out
}

/// Channels whose raw trace is constant: nothing can be band-passed out of
/// them, so they are skipped before filtering.
fn flat_channels(signal: &SignalMatrix) -> Vec<SkippedChannel> {
    signal
        .data()
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(_, row)| {
            let first = row[0];
            row.iter().all(|&v| v == first)
        })
        .map(|(index, _)| {
            let skip = SkippedChannel {
                index,
                name: signal.ch_names()[index].clone(),
                reason: "flat signal (zero peak-to-peak)".to_string(),
            };
            warn!(channel = index, name = %skip.name, "{}", skip.to_error());
            skip
        })
        .collect()
}

/// Run every signal stage and keep the intermediates.
///
/// Validates the configuration first; nothing is computed on invalid input.
pub fn compute_stages(
    signal: &SignalMatrix,
    band: &BandConfig,
    cfg: &DetectionConfig,
) -> Result<MuscleStages> {
    signal.ensure_not_empty()?;
    let sfreq = signal.sfreq();
    band.validate(sfreq)?;
    cfg.validate(sfreq)?;

    let mut skipped = flat_channels(signal);
    let live: Vec<usize> = (0..signal.n_channels())
        .filter(|i| !skipped.iter().any(|s| s.index == *i))
        .collect();
    if live.is_empty() {
        return Err(skipped[0].to_error());
    }
    let input = signal.select_rows(&live);

    let n_t = signal.n_samples();
    let mut pad = (cfg.padding_s * sfreq).round() as usize;
    if pad > n_t - 1 {
        warn!(requested = pad, used = n_t - 1, "padding longer than the recording, clamped");
        pad = n_t - 1;
    }
    let crop = |a: &Array2<f64>| a.slice(s![.., pad..pad + n_t]).to_owned();

    let padded = attach_mirror_padding(input.data(), pad);
    debug!(
        channels = input.n_channels(),
        samples = n_t,
        pad,
        sfreq,
        "muscle detection input"
    );

    let notched = if cfg.notch_freqs_hz.is_empty() {
        None
    } else {
        let h = design_notch(&cfg.notch_freqs_hz, sfreq);
        debug!(taps = h.len(), freqs = ?cfg.notch_freqs_hz, "notch");
        Some(filter_rows(padded.view(), &h))
    };

    let bp = bandpass(notched.as_ref().unwrap_or(&padded).view(), band, sfreq);
    let env = envelope_rows(bp.view());
    let zs = zscore_rows(env.view(), input.ch_names());

    // Report indices against the caller's channel order.
    let active: Vec<usize> = zs.active.iter().map(|&i| live[i]).collect();
    skipped.extend(zs.skipped.into_iter().map(|s| SkippedChannel { index: live[s.index], ..s }));
    skipped.sort_by_key(|s| s.index);
    if active.is_empty() {
        return Err(skipped[0].to_error());
    }

    let raw_score = aggregate_zscores(zs.zscores.view())?;
    let smoothed = smooth(&raw_score.to_vec(), cfg.smoothing_cutoff_hz, sfreq);

    Ok(MuscleStages {
        notched: notched.as_ref().map(crop),
        bandpass: crop(&bp),
        envelope: crop(&env),
        zscores: crop(&zs.zscores),
        live,
        active,
        skipped,
        raw_score: raw_score.slice(s![pad..pad + n_t]).to_owned(),
        score: Array1::from(smoothed[pad..pad + n_t].to_vec()),
        pad,
    })
}

/// Detect muscle artifacts in one sensor type's channels.
///
/// ```no_run
/// use megqc::{detect_muscle, BandConfig, DetectionConfig, SignalMatrix};
/// use ndarray::Array2;
///
/// let signal = SignalMatrix::new(Array2::zeros((102, 60_000)), 1000.0);
/// let det = detect_muscle(&signal, &BandConfig::default(), &DetectionConfig::with_threshold(5.0))?;
/// for iv in det.intervals() {
///     println!("{:.2}–{:.2} s", iv.start_time_s, iv.end_time_s);
/// }
/// # Ok::<(), megqc::MuscleError>(())
/// ```
pub fn detect_muscle(
    signal: &SignalMatrix,
    band: &BandConfig,
    cfg: &DetectionConfig,
) -> Result<MuscleDetection> {
    let stages = compute_stages(signal, band, cfg)?;
    let sfreq = signal.sfreq();

    let score = ScoreSeries::new(stages.score.to_vec(), sfreq);
    let events = detect_events(score.values(), sfreq, cfg.threshold, cfg.min_good_gap_s);
    let channels_used: Vec<String> = stages
        .active
        .iter()
        .map(|&i| signal.ch_names()[i].clone())
        .collect();

    info!(
        events = events.len(),
        channels = channels_used.len(),
        skipped = stages.skipped.len(),
        threshold = cfg.threshold,
        "muscle detection done"
    );

    Ok(MuscleDetection {
        score,
        events,
        channels_used,
        skipped: stages.skipped,
        threshold: cfg.threshold,
        min_good_gap_s: cfg.min_good_gap_s,
    })
}
