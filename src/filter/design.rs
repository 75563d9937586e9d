//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! MNE's automatic rules (`fir_design='firwin'`, Hamming window):
//!   • low transition bandwidth  = min(max(0.25 * l_freq, 2.0), l_freq)
//!   • high transition bandwidth = min(max(0.25 * h_freq, 2.0), sfreq/2 - h_freq)
//!   • filter length N           = ceil(3.3 / min(trans_bw) * sfreq), rounded to odd
//!   • cutoffs sit in the middle of each transition band
use std::f64::consts::PI;

/// Hamming-window length factor used by MNE (`3.3 / trans_bw`).
const HAMMING_LENGTH_FACTOR: f64 = 3.3;

/// Transition bandwidth of a notch, in Hz (MNE `notch_filter` default).
pub const NOTCH_TRANS_BANDWIDTH: f64 = 1.0;

/// Transition bandwidth below a lower band edge.
///
/// Rule: `min(max(0.25 * l_freq, 2.0), l_freq)`
pub fn auto_l_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// Transition bandwidth above an upper band edge.
///
/// Rule: `min(max(0.25 * h_freq, 2.0), sfreq / 2 - h_freq)`
pub fn auto_h_trans_bandwidth(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Compute the number of FIR taps for a given transition bandwidth.
/// Returns an odd integer (required for zero-phase linear-phase FIR).
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (HAMMING_LENGTH_FACTOR / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Zero-phase band-pass keeping `[l_freq, h_freq]`.
///
/// Matches `mne.filter.create_filter(data, sfreq, l_freq, h_freq,
///   fir_window='hamming', fir_design='firwin', phase='zero')`.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Vec<f64> {
    let l_tb = auto_l_trans_bandwidth(l_freq);
    let h_tb = auto_h_trans_bandwidth(h_freq, sfreq);
    let n = auto_filter_length(l_tb.min(h_tb), sfreq);
    firwin(n, &[l_freq - l_tb / 2.0, h_freq + h_tb / 2.0], sfreq, false)
}

/// Zero-phase low-pass with passband edge `h_freq`.
///
/// Matches `mne.filter.filter_data(x, sfreq, None, h_freq)`.
pub fn design_lowpass(h_freq: f64, sfreq: f64) -> Vec<f64> {
    let h_tb = auto_h_trans_bandwidth(h_freq, sfreq);
    let n = auto_filter_length(h_tb, sfreq);
    firwin(n, &[h_freq + h_tb / 2.0], sfreq, true)
}

/// Multi-line band-stop removing each frequency in `freqs`.
///
/// Each stop band is `freq ± freq / 400` (notch width `freq / 200`) widened by
/// half the 1 Hz transition band on each side, as `mne.io.Raw.notch_filter`
/// does with `method='fir'`. `freqs` must be non-empty.
pub fn design_notch(freqs: &[f64], sfreq: f64) -> Vec<f64> {
    let mut sorted = freqs.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();

    let mut cutoffs: Vec<f64> = Vec::with_capacity(2 * sorted.len());
    for f in sorted {
        let half = f / 400.0 + NOTCH_TRANS_BANDWIDTH / 2.0;
        let (lo, hi) = (f - half, f + half);
        // Overlapping stop bands collapse into one.
        match cutoffs.last_mut() {
            Some(prev_hi) if lo <= *prev_hi => *prev_hi = prev_hi.max(hi),
            _ => cutoffs.extend([lo, hi]),
        }
    }
    let n = auto_filter_length(NOTCH_TRANS_BANDWIDTH, sfreq);
    firwin(n, &cutoffs, sfreq, true)
}

/// Windowed-sinc FIR design (Hamming window), the `scipy.signal.firwin`
/// generalisation to any number of band edges.
///
/// * `cutoffs_hz` — strictly increasing band edges in `(0, sfreq / 2)`.
/// * `pass_zero`  — whether DC lies in a pass band. One cutoff with
///   `pass_zero = true` is a low-pass, two with `false` a band-pass, two with
///   `true` a band-stop.
///
/// The response is normalised to unit gain at the centre of the first pass
/// band (DC for low-pass, Nyquist for high-pass).
pub fn firwin(n: usize, cutoffs_hz: &[f64], sfreq: f64, pass_zero: bool) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    assert!(!cutoffs_hz.is_empty(), "firwin requires at least one cutoff");
    let alpha = (n - 1) as f64 / 2.0;
    let nyq = sfreq / 2.0;

    // Band edges normalised to [0, 1] (1 = Nyquist).
    let mut edges: Vec<f64> = Vec::with_capacity(cutoffs_hz.len() + 2);
    if pass_zero {
        edges.push(0.0);
    }
    edges.extend(cutoffs_hz.iter().map(|&f| f / nyq));
    let pass_nyquist = (cutoffs_hz.len() % 2 == 1) ^ pass_zero;
    if pass_nyquist {
        edges.push(1.0);
    }

    let win = hamming(n);
    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let m = i as f64 - alpha;
            let v: f64 = edges
                .chunks_exact(2)
                .map(|band| band[1] * sinc(band[1] * m) - band[0] * sinc(band[0] * m))
                .sum();
            v * win[i]
        })
        .collect();

    let (left, right) = (edges[0], edges[1]);
    let scale_freq = if left == 0.0 {
        0.0
    } else if right == 1.0 {
        1.0
    } else {
        0.5 * (left + right)
    };
    let s: f64 = h
        .iter()
        .enumerate()
        .map(|(i, &v)| v * (PI * (i as f64 - alpha) * scale_freq).cos())
        .sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// Normalised sinc: `sin(πx) / (πx)`, `sinc(0) = 1`.
fn sinc(x: f64) -> f64 {
    if x == 0.0 { 1.0 } else { (PI * x).sin() / (PI * x) }
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Magnitude of the frequency response of `h` at `freq_hz`.
pub fn gain_at(h: &[f64], freq_hz: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * freq_hz / sfreq;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &v)| {
        let phi = w * k as f64;
        (re + v * phi.cos(), im - v * phi.sin())
    });
    (re * re + im * im).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_length_is_odd() {
        for tb in [0.5_f64, 1.0, 2.0, 27.5] {
            let n = auto_filter_length(tb, 1000.0);
            assert!(n % 2 == 1, "N={n} is even for trans_bw={tb}");
        }
    }

    #[test]
    fn transition_bandwidths_follow_mne_rules() {
        approx::assert_abs_diff_eq!(auto_l_trans_bandwidth(110.0), 27.5);
        approx::assert_abs_diff_eq!(auto_l_trans_bandwidth(1.0), 1.0);
        approx::assert_abs_diff_eq!(auto_h_trans_bandwidth(140.0, 1000.0), 35.0);
        approx::assert_abs_diff_eq!(auto_h_trans_bandwidth(4.0, 1000.0), 2.0);
        // Capped by the distance to Nyquist.
        approx::assert_abs_diff_eq!(auto_h_trans_bandwidth(140.0, 300.0), 10.0);
    }

    #[test]
    fn smoothing_lowpass_known_length_1khz() {
        // 4 Hz at 1 kHz: trans_bw = 2 Hz → ceil(3.3 / 2 * 1000) = 1650 → 1651.
        assert_eq!(design_lowpass(4.0, 1000.0).len(), 1651);
    }

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = firwin(101, &[10.0], 256.0, true);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn bandpass_is_symmetric() {
        let h = design_bandpass(110.0, 140.0, 1000.0);
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn bandpass_passes_band_and_blocks_dc() {
        let sfreq = 1000.0;
        let h = design_bandpass(110.0, 140.0, sfreq);
        approx::assert_abs_diff_eq!(gain_at(&h, 125.0, sfreq), 1.0, epsilon = 0.02);
        assert!(h.iter().sum::<f64>().abs() < 1e-3, "DC leaks through band-pass");
        assert!(gain_at(&h, 10.0, sfreq) < 0.01);
        assert!(gain_at(&h, 300.0, sfreq) < 0.01);
    }

    #[test]
    fn notch_removes_line_and_keeps_neighbours() {
        let sfreq = 1000.0;
        let h = design_notch(&[60.0, 120.0], sfreq);
        assert!(gain_at(&h, 60.0, sfreq) < 0.01);
        assert!(gain_at(&h, 120.0, sfreq) < 0.01);
        approx::assert_abs_diff_eq!(gain_at(&h, 90.0, sfreq), 1.0, epsilon = 0.01);
        approx::assert_abs_diff_eq!(h.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn highpass_by_single_cutoff() {
        // One cutoff without pass_zero is a high-pass normalised at Nyquist.
        let h = firwin(101, &[50.0], 1000.0, false);
        assert!(h.iter().sum::<f64>().abs() < 1e-2);
        approx::assert_abs_diff_eq!(gain_at(&h, 500.0, 1000.0), 1.0, epsilon = 1e-9);
    }
}
