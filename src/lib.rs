//! # megqc — MEG quality control in pure Rust
//!
//! `megqc` detects muscle artifacts in MEG recordings with the z-score method
//! of `mne.preprocessing.annotate_muscle_zscore`. Every DSP step follows the
//! MNE / SciPy reference (FIR design, overlap-add zero-phase filtering,
//! Hilbert envelope, `ddof = 0` z-scores).
//!
//! ## Pipeline overview
//!
//! ```text
//! raw.safetensors  ([C, T], sfreq, ch_names, ch_types)
//!   │
//!   ├─ channels::pick()        one sensor type (mag preferred over grad)
//!   ├─ filter (FIR notch)      optional power-line removal
//!   ├─ filter (FIR band-pass)  110–140 Hz, zero phase
//!   ├─ envelope                |analytic signal| per channel
//!   ├─ normalize               per-channel z-score, flat channels skipped
//!   ├─ aggregate              Σ z / sqrt(n_channels)
//!   ├─ filter (FIR low-pass)   4 Hz smoothing of the aggregate score
//!   └─ detect                  threshold + merge gaps < min_good_gap_s
//!        │
//!        └─→ (ScoreSeries [T], Vec<ArtifactInterval>)
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use megqc::{channels, detect_muscle, MuscleConfig};
//! use megqc::io::RawRecording;
//! use std::path::Path;
//!
//! let signal = RawRecording::load(Path::new("sub-01_raw.safetensors"))?.into_signal()?;
//!
//! let mut cfg = MuscleConfig::default();
//! cfg.detection.threshold = 5.0;
//!
//! let ch_type = channels::preferred(&signal).expect("no MEG channels");
//! let mags = channels::pick(&signal, ch_type)?;
//! let det = detect_muscle(&mags, &cfg.band, &cfg.detection)?;
//!
//! for ev in &det.events {
//!     println!("{:.2}–{:.2} s  peak z = {:.1}",
//!         ev.interval.start_time_s, ev.interval.end_time_s, ev.peak_score);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use megqc::envelope::envelope_rows;
//! use megqc::filter::{design_bandpass, filter_rows};
//! use megqc::normalize::{aggregate_zscores, zscore_rows};
//! use megqc::muscle::smooth;
//! use megqc::detect::detect_intervals;
//! use ndarray::Array2;
//!
//! let data: Array2<f64> = Array2::zeros((102, 60_000)); // [C, T] @ 1 kHz
//! let names: Vec<String> = (0..102).map(|i| format!("MEG {i:03}1")).collect();
//!
//! let bp    = filter_rows(data.view(), &design_bandpass(110.0, 140.0, 1000.0));
//! let env   = envelope_rows(bp.view());
//! let z     = zscore_rows(env.view(), &names);
//! let score = aggregate_zscores(z.zscores.view()).unwrap();
//! let score = smooth(score.as_slice().unwrap(), 4.0, 1000.0);
//! let ivs   = detect_intervals(&score, 1000.0, 5.0, 0.2);
//! ```

pub mod channels;
pub mod config;
pub mod detect;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod io;
pub mod muscle;
pub mod normalize;
pub mod signal;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use channels::SensorType;
pub use config::{BandConfig, DetectionConfig, MuscleConfig};
pub use detect::{detect_intervals, ArtifactInterval, MuscleEvent};
pub use error::{MuscleError, Result};
pub use muscle::{
    compute_stages, detect_muscle, MuscleDetection, MuscleStages, MuscleSummary, ScoreSeries,
};
pub use normalize::SkippedChannel;
pub use signal::SignalMatrix;

/// Detect muscle artifacts on one sensor type of a full recording.
///
/// Picks `cfg.ch_type` (or the preferred available type when unset), then
/// runs [`detect_muscle`]. Returns the sensor type actually used.
pub fn detect_muscle_on(
    signal: &SignalMatrix,
    cfg: &MuscleConfig,
) -> Result<(SensorType, MuscleDetection)> {
    let ch_type = match cfg.ch_type {
        Some(t) => t,
        None => channels::preferred(signal)
            .ok_or_else(|| MuscleError::EmptyInput("no magnetometer or gradiometer channels".into()))?,
    };
    let picked = channels::pick(signal, ch_type)?;
    tracing::debug!(%ch_type, channels = picked.n_channels(), "picked sensor type");
    let det = detect_muscle(&picked, &cfg.band, &cfg.detection)?;
    Ok((ch_type, det))
}
