//! The channel-by-time input matrix.
use ndarray::{Array2, ArrayView2};

use crate::channels::SensorType;
use crate::error::{MuscleError, Result};

/// Continuous recording `[C, T]` with its sampling rate and channel metadata.
///
/// The detector only reads a `SignalMatrix`; every stage produces new arrays.
#[derive(Debug, Clone)]
pub struct SignalMatrix {
    data: Array2<f64>,
    sfreq: f64,
    ch_names: Vec<String>,
    ch_types: Vec<Option<SensorType>>,
}

impl SignalMatrix {
    /// Wrap `data` with generated channel names (`ch0`, `ch1`, …) and no
    /// sensor-type information.
    pub fn new(data: Array2<f64>, sfreq: f64) -> Self {
        let n_ch = data.nrows();
        Self {
            data,
            sfreq,
            ch_names: (0..n_ch).map(|i| format!("ch{i}")).collect(),
            ch_types: vec![None; n_ch],
        }
    }

    /// Wrap `data` with explicit channel names and types.
    ///
    /// Both lists must have one entry per row of `data`.
    pub fn with_channels(
        data: Array2<f64>,
        sfreq: f64,
        ch_names: Vec<String>,
        ch_types: Vec<Option<SensorType>>,
    ) -> Result<Self> {
        let n_ch = data.nrows();
        for len in [ch_names.len(), ch_types.len()] {
            if len != n_ch {
                return Err(MuscleError::ShapeMismatch { expected: n_ch, actual: len });
            }
        }
        Ok(Self { data, sfreq, ch_names, ch_types })
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Recording length in seconds (`N / fs`).
    pub fn duration_s(&self) -> f64 {
        self.n_samples() as f64 / self.sfreq
    }

    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    pub fn ch_types(&self) -> &[Option<SensorType>] {
        &self.ch_types
    }

    /// Fail with [`MuscleError::EmptyInput`] on zero channels or samples.
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.n_channels() == 0 {
            return Err(MuscleError::empty("no channels"));
        }
        if self.n_samples() == 0 {
            return Err(MuscleError::empty("no samples"));
        }
        Ok(())
    }

    /// Copy of the listed rows, metadata carried along.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let n_t = self.n_samples();
        let mut data = Array2::<f64>::zeros((rows.len(), n_t));
        for (dst, &src) in rows.iter().enumerate() {
            data.row_mut(dst).assign(&self.data.row(src));
        }
        Self {
            data,
            sfreq: self.sfreq,
            ch_names: rows.iter().map(|&r| self.ch_names[r].clone()).collect(),
            ch_types: rows.iter().map(|&r| self.ch_types[r]).collect(),
        }
    }
}
