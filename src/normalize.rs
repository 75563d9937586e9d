//! Per-channel z-score and cross-channel aggregation.
//!
//! `zscore_rows` — matches `scipy.stats.zscore(envelope, axis=1)`:
//!   for each channel: z = (env - μ) / σ,  σ = population std (ddof=0)
//!
//! `aggregate_zscores` — matches `annotate_muscle_zscore`:
//!   score[t] = Σ_c z[c, t] / sqrt(n_active)
//!
//! Channels whose envelope has no variance cannot be standardised; they are
//! dropped from aggregation and reported as [`SkippedChannel`]s.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;
use tracing::warn;

use crate::error::{MuscleError, Result};

/// σ below this fraction of |μ| counts as zero (FFT round-off on a flat row).
const FLAT_REL_TOL: f64 = 1e-10;

/// A channel excluded from aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedChannel {
    /// Row index within the analysed sensor-type subset.
    pub index: usize,
    pub name: String,
    pub reason: String,
}

impl SkippedChannel {
    pub fn to_error(&self) -> MuscleError {
        MuscleError::DegenerateSignal {
            channel: self.index,
            name: self.name.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Z-scored envelopes of the channels that could be standardised.
#[derive(Debug, Clone)]
pub struct ChannelZscores {
    /// `[n_active, T]`
    pub zscores: Array2<f64>,
    /// Original row index of each row of `zscores`.
    pub active: Vec<usize>,
    pub skipped: Vec<SkippedChannel>,
}

/// Population mean and standard deviation of one row.
pub fn mean_std(row: ArrayView1<'_, f64>) -> (f64, f64) {
    let n = row.len() as f64;
    let mean = row.sum() / n;
    let var = row.iter().map(|&v| {
        let d = v - mean; d * d
    }).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Standardise every row of `env` ([C, T]) against its own mean and std.
///
/// `names` labels the rows in skip reports and log lines.
pub fn zscore_rows(env: ArrayView2<'_, f64>, names: &[String]) -> ChannelZscores {
    let mut active = Vec::with_capacity(env.nrows());
    let mut skipped = Vec::new();
    let mut stats = Vec::with_capacity(env.nrows());

    for (idx, row) in env.axis_iter(Axis(0)).enumerate() {
        let (mean, std) = mean_std(row);
        let name = names.get(idx).cloned().unwrap_or_else(|| format!("ch{idx}"));
        let reason = if !std.is_finite() || !mean.is_finite() {
            Some("non-finite envelope statistics".to_string())
        } else if std == 0.0 || std <= FLAT_REL_TOL * mean.abs() {
            Some("envelope has zero variance".to_string())
        } else {
            None
        };
        match reason {
            Some(reason) => {
                let skip = SkippedChannel { index: idx, name, reason };
                warn!(channel = skip.index, name = %skip.name, "{}", skip.to_error());
                skipped.push(skip);
            }
            None => {
                active.push(idx);
                stats.push((mean, std));
            }
        }
    }

    let mut zscores = Array2::<f64>::zeros((active.len(), env.ncols()));
    for ((mut out, &src), &(mean, std)) in zscores.rows_mut().into_iter().zip(&active).zip(&stats) {
        out.zip_mut_with(&env.row(src), |z, &v| *z = (v - mean) / std);
    }

    ChannelZscores { zscores, active, skipped }
}

/// Sum z-scores across channels and divide by `sqrt(n_channels)`.
///
/// Fails with [`MuscleError::EmptyInput`] when no channel is left.
pub fn aggregate_zscores(z: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    let n_active = z.nrows();
    if n_active == 0 {
        return Err(MuscleError::empty("no channels left to aggregate"));
    }
    Ok(z.sum_axis(Axis(0)) / (n_active as f64).sqrt())
}
