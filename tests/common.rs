/// Shared helpers: synthetic MEG recordings with muscle-like bursts.
use megqc::{SensorType, SignalMatrix};
use ndarray::Array2;
use std::f64::consts::PI;

#[allow(unused)]
pub const SFREQ: f64 = 1000.0;
#[allow(unused)]
pub const DURATION_S: f64 = 10.0;
#[allow(unused)]
pub const N_CHANNELS: usize = 8;
/// Dominant burst frequency, in the middle of the 110–140 Hz band.
#[allow(unused)]
pub const BURST_HZ: f64 = 125.0;

#[allow(unused)]
pub fn n_samples() -> usize {
    (DURATION_S * SFREQ) as usize
}

/// Neuromag-style magnetometer names: `MEG 0111`, `MEG 0121`, …
#[allow(unused)]
pub fn mag_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("MEG {:03}1", 11 + 10 * i)).collect()
}

/// 125 Hz bursts on a silent background, every channel bursting at the same
/// times with its own phase and gain. `bursts` holds `(start_s, end_s)`.
#[allow(unused)]
pub fn burst_data(n_ch: usize, bursts: &[(f64, f64)]) -> Array2<f64> {
    Array2::from_shape_fn((n_ch, n_samples()), |(c, i)| {
        let t = i as f64 / SFREQ;
        let on = bursts.iter().any(|&(s, e)| t >= s && t < e);
        if !on {
            return 0.0;
        }
        let phase = c as f64 * 0.7;
        let gain = 1e-12 * (1.0 + 0.1 * c as f64);
        gain * (2.0 * PI * BURST_HZ * t + phase).sin()
    })
}

/// Tones summed per channel by [`noise_burst_data`].
#[allow(unused)]
pub const NOISE_TONES: usize = 40;

/// 64-bit LCG (Knuth's MMIX constants); deterministic noise without a rand crate.
#[allow(unused)]
pub struct Lcg(u64);

#[allow(unused)]
impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Band-limited noise bursts in 110–140 Hz on a silent background.
///
/// Each channel sums [`NOISE_TONES`] tones with random frequency and phase,
/// drawn independently per channel, so the envelope fluctuates inside a burst.
#[allow(unused)]
pub fn noise_burst_data(n_ch: usize, bursts: &[(f64, f64)], seed: u64) -> Array2<f64> {
    let mut rng = Lcg::new(seed);
    let amp = 1e-12 / (NOISE_TONES as f64).sqrt();
    let mut data = Array2::<f64>::zeros((n_ch, n_samples()));
    for mut row in data.rows_mut() {
        let tones: Vec<(f64, f64)> = (0..NOISE_TONES)
            .map(|_| (110.0 + 30.0 * rng.next_f64(), 2.0 * PI * rng.next_f64()))
            .collect();
        for (i, v) in row.iter_mut().enumerate() {
            let t = i as f64 / SFREQ;
            if bursts.iter().any(|&(s, e)| t >= s && t < e) {
                *v = amp * tones.iter().map(|&(f, ph)| (2.0 * PI * f * t + ph).sin()).sum::<f64>();
            }
        }
    }
    data
}

/// Magnetometer recording of `n_ch` channels carrying noise bursts.
#[allow(unused)]
pub fn noise_burst_signal(n_ch: usize, bursts: &[(f64, f64)]) -> SignalMatrix {
    SignalMatrix::with_channels(
        noise_burst_data(n_ch, bursts, 0x5eed_1234),
        SFREQ,
        mag_names(n_ch),
        vec![Some(SensorType::Mag); n_ch],
    )
    .unwrap()
}

/// Magnetometer recording with the given bursts.
#[allow(unused)]
pub fn burst_signal(bursts: &[(f64, f64)]) -> SignalMatrix {
    let data = burst_data(N_CHANNELS, bursts);
    SignalMatrix::with_channels(
        data,
        SFREQ,
        mag_names(N_CHANNELS),
        vec![Some(SensorType::Mag); N_CHANNELS],
    )
    .unwrap()
}

/// Add a continuous sinusoid to every channel.
#[allow(unused)]
pub fn add_line(data: &mut Array2<f64>, freq_hz: f64, amplitude: f64) {
    for mut row in data.rows_mut() {
        for (i, v) in row.iter_mut().enumerate() {
            *v += amplitude * (2.0 * PI * freq_hz * i as f64 / SFREQ).sin();
        }
    }
}

/// Largest |a - b| over two slices.
#[allow(unused)]
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "length mismatch");
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

/// RMS of a slice.
#[allow(unused)]
pub fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}
