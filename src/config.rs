//! Detector configuration.
//!
//! [`MuscleConfig`] bundles the frequency band ([`BandConfig`]), the detection
//! parameters ([`DetectionConfig`]) and the sensor type to run on. All fields
//! except the threshold have defaults matching
//! `mne.preprocessing.annotate_muscle_zscore`.
//!
//! A config can be built in code with struct-update syntax or loaded from a
//! TOML file:
//!
//! ```toml
//! ch_type = "mag"
//!
//! [band]
//! low_hz  = 110.0
//! high_hz = 140.0
//!
//! [detection]
//! threshold           = 5.0
//! min_good_gap_s      = 0.2
//! smoothing_cutoff_hz = 4.0
//! padding_s           = 1.0
//! notch_freqs_hz      = [60.0, 120.0]
//! ```
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::channels::SensorType;
use crate::error::{MuscleError, Result};

/// Frequency band associated with muscle activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    /// Lower band edge in Hz. Default: `110.0`.
    pub low_hz: f64,
    /// Upper band edge in Hz. Must stay below Nyquist. Default: `140.0`.
    pub high_hz: f64,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self { low_hz: 110.0, high_hz: 140.0 }
    }
}

impl BandConfig {
    /// Check `0 < low_hz < high_hz < sfreq / 2`.
    pub fn validate(&self, sfreq: f64) -> Result<()> {
        validate_sfreq(sfreq)?;
        let nyq = sfreq / 2.0;
        if !self.low_hz.is_finite() || self.low_hz <= 0.0 {
            return Err(MuscleError::config(format!(
                "band low edge must be > 0 Hz, got {}",
                self.low_hz
            )));
        }
        if !self.high_hz.is_finite() || self.high_hz <= self.low_hz {
            return Err(MuscleError::config(format!(
                "band high edge ({}) must exceed low edge ({})",
                self.high_hz, self.low_hz
            )));
        }
        if self.high_hz >= nyq {
            return Err(MuscleError::config(format!(
                "band high edge {} Hz is at or above Nyquist ({nyq} Hz)",
                self.high_hz
            )));
        }
        Ok(())
    }
}

/// Thresholding, smoothing and edge-handling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Z-score cutoff on the smoothed aggregate score.
    ///
    /// Data dependent; there is no universal value. Inspect the score trace
    /// to tune it. Defaults to `NaN`, which [`validate`](Self::validate)
    /// rejects, so a value must always be supplied.
    pub threshold: f64,

    /// Clean stretches shorter than this (seconds) between two flagged
    /// segments are absorbed into one event. Default: `0.2` s.
    pub min_good_gap_s: f64,

    /// Cutoff of the zero-phase low-pass applied to the aggregate score.
    ///
    /// Muscle bursts last hundreds of milliseconds, so 4 Hz removes
    /// sample-level spikes without eroding burst edges. Default: `4.0` Hz.
    pub smoothing_cutoff_hz: f64,

    /// Mirrored data (seconds) attached to each end before filtering and
    /// stripped afterwards. Default: `0.0` (the FIR stage still applies its
    /// own reflect-limited padding).
    pub padding_s: f64,

    /// Power-line frequencies to notch out before band-passing.
    ///
    /// Line harmonics (e.g. 120 Hz on 60 Hz mains) fall inside the default
    /// muscle band. Default: none.
    pub notch_freqs_hz: Vec<f64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: f64::NAN,
            min_good_gap_s: 0.2,
            smoothing_cutoff_hz: 4.0,
            padding_s: 0.0,
            notch_freqs_hz: vec![],
        }
    }
}

impl DetectionConfig {
    /// Defaults with the given threshold.
    ///
    /// ```
    /// use megqc::DetectionConfig;
    /// let cfg = DetectionConfig::with_threshold(5.0);
    /// assert_eq!(cfg.min_good_gap_s, 0.2);
    /// ```
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold, ..Self::default() }
    }

    pub fn validate(&self, sfreq: f64) -> Result<()> {
        validate_sfreq(sfreq)?;
        let nyq = sfreq / 2.0;
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(MuscleError::config(format!(
                "threshold must be a finite value > 0, got {}",
                self.threshold
            )));
        }
        if !self.min_good_gap_s.is_finite() || self.min_good_gap_s < 0.0 {
            return Err(MuscleError::config(format!(
                "min_good_gap_s must be >= 0, got {}",
                self.min_good_gap_s
            )));
        }
        if !self.smoothing_cutoff_hz.is_finite()
            || self.smoothing_cutoff_hz <= 0.0
            || self.smoothing_cutoff_hz >= nyq
        {
            return Err(MuscleError::config(format!(
                "smoothing cutoff must lie in (0, {nyq}) Hz, got {}",
                self.smoothing_cutoff_hz
            )));
        }
        if !self.padding_s.is_finite() || self.padding_s < 0.0 {
            return Err(MuscleError::config(format!(
                "padding_s must be >= 0, got {}",
                self.padding_s
            )));
        }
        for &f in &self.notch_freqs_hz {
            // The stop band plus its transition must fit below Nyquist.
            let half = f / 400.0 + 0.5;
            if !f.is_finite() || f - half <= 0.0 || f + half >= nyq {
                return Err(MuscleError::config(format!(
                    "notch frequency {f} Hz does not fit in (0, {nyq}) Hz"
                )));
            }
        }
        Ok(())
    }
}

/// Full configuration for one detector run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuscleConfig {
    /// Sensor type to analyse. `None` picks magnetometers when present,
    /// gradiometers otherwise.
    pub ch_type: Option<SensorType>,
    pub band: BandConfig,
    pub detection: DetectionConfig,
}

impl MuscleConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("failed to parse muscle config")
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Validate both the band and the detection parameters.
    pub fn validate(&self, sfreq: f64) -> Result<()> {
        self.band.validate(sfreq)?;
        self.detection.validate(sfreq)
    }
}

fn validate_sfreq(sfreq: f64) -> Result<()> {
    if !sfreq.is_finite() || sfreq <= 0.0 {
        return Err(MuscleError::config(format!(
            "sampling rate must be > 0 Hz, got {sfreq}"
        )));
    }
    Ok(())
}
