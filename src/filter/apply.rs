//! Overlap-add zero-phase FIR convolution.
//!
//! Matches MNE's `_overlap_add_filter` + `_1d_overlap_filter`.
//!
//! Zero-phase is achieved by shifting the output left by `(N-1)/2` samples,
//! NOT by running filtfilt. The edge transient is suppressed by
//! reflect-limited padding of `N-1` samples on each side.
use ndarray::{Array2, ArrayView2};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Filter every row of `data` ([C, T]) with `h`, returning a new array.
///
/// `h` must have odd length (guaranteed by the `design_*` helpers).
pub fn filter_rows(data: ArrayView2<'_, f64>, h: &[f64]) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros(data.raw_dim());
    let fir = OverlapAdd::new(h, data.ncols());
    for (row_in, mut row_out) in data.rows().into_iter().zip(out.rows_mut()) {
        let x: Vec<f64> = row_in.to_vec();
        row_out.assign(&ndarray::ArrayView1::from(&fir.apply(&x)));
    }
    out
}

/// Filter a single 1-D signal with the overlap-add algorithm.
///
/// Returns a vector of the same length as `x`.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Vec<f64> {
    OverlapAdd::new(h, x.len()).apply(x)
}

/// Overlap-add state for one kernel and one signal length, so the FFT plans
/// and the kernel spectrum are shared across channels.
struct OverlapAdd {
    n_h: usize,
    n_fft: usize,
    h_fft: Vec<Complex<f64>>,
    fwd: Arc<dyn Fft<f64>>,
    inv: Arc<dyn Fft<f64>>,
}

impl OverlapAdd {
    fn new(h: &[f64], n_x: usize) -> Self {
        assert!(h.len() % 2 == 1, "zero-phase FIR requires an odd number of taps");
        let n_h = h.len();
        let n_ext = n_x + 2 * (n_h - 1);
        let n_fft = choose_fft_len(n_h, n_ext);

        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);

        let mut h_fft = zero_padded(h, n_fft);
        fwd.process(&mut h_fft);

        Self { n_h, n_fft, h_fft, fwd, inv }
    }

    fn apply(&self, x: &[f64]) -> Vec<f64> {
        let n_x = x.len();
        if n_x == 0 {
            return vec![];
        }
        let (n_h, n_fft) = (self.n_h, self.n_fft);

        // Shift for zero-phase: (N-1)/2  (N is odd).
        let shift = (n_h - 1) / 2;
        let n_edge = n_h - 1;

        let x_ext = reflect_limited_pad(x, n_edge, n_edge);
        let n_ext = x_ext.len();

        let n_seg = n_fft - n_h + 1;
        let n_segments = n_ext.div_ceil(n_seg);
        let mut x_filtered = vec![0.0_f64; n_ext];
        let inv_scale = 1.0 / n_fft as f64;

        for seg_idx in 0..n_segments {
            let start = seg_idx * n_seg;
            let stop = (start + n_seg).min(n_ext);

            let mut buf = zero_padded(&x_ext[start..stop], n_fft);
            self.fwd.process(&mut buf);
            for (b, &hf) in buf.iter_mut().zip(self.h_fft.iter()) {
                *b *= hf;
            }
            self.inv.process(&mut buf);

            // Accumulate with overlap-add (accounting for zero-phase shift).
            let out_start = start.saturating_sub(shift);
            let out_end = (out_start + n_fft).min(n_ext);
            let prod_start = shift.saturating_sub(start);

            for (o, p) in (out_start..out_end).zip(prod_start..n_fft) {
                x_filtered[o] += buf[p].re * inv_scale;
            }
        }

        // Strip edge padding.
        x_filtered[n_edge..n_edge + n_x].to_vec()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Reflect-limited padding (matches MNE's `_smart_pad`).
///
/// Left:  `pad[i] = 2*x[0] - x[n_l-i]`  for i in 1..=n_l
/// Right: `pad[i] = 2*x[-1] - x[-(i+1)]` for i in 1..=n_r
///
/// Padding beyond `len(x) - 1` samples is filled with zeros.
pub(crate) fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let actual_l = n_l.min(n - 1);
    let actual_r = n_r.min(n - 1);

    let mut out = Vec::with_capacity(n_l + n + n_r);
    out.resize(n_l - actual_l, 0.0);

    // Odd reflection around x[0].
    out.extend((1..=actual_l).rev().map(|i| 2.0 * x[0] - x[i]));
    out.extend_from_slice(x);
    // Odd reflection around x[-1].
    let last = x[n - 1];
    out.extend((1..=actual_r).map(|i| 2.0 * last - x[n - 1 - i]));

    out.resize(n_l + n + n_r, 0.0);
    out
}

/// Choose the optimal FFT block size (power of 2 minimising operation count).
///
/// Matches MNE's cost function:
///   `cost = ceil(n_x / (N - n_h + 1)) * N * (log2(N) + 1) + 4e-5 * N * n_x`
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_fft = 2 * n_h - 1;

    let max_pow = (n_x as f64).log2().ceil() as u32 + 1;
    let min_pow = (min_fft as f64).log2().ceil() as u32;

    let mut best_n = 1_usize << max_pow.max(min_pow);
    let mut best_cost = f64::INFINITY;

    for pow in min_pow..=max_pow {
        let n = 1_usize << pow;
        if n < min_fft {
            continue;
        }
        let n_seg = (n - n_h + 1) as f64;
        let cost = (n_x as f64 / n_seg).ceil() * n as f64 * (pow as f64 + 1.0)
            + 4e-5 * n as f64 * n_x as f64;
        if cost < best_cost {
            best_cost = cost;
            best_n = n;
        }
    }
    best_n
}

fn zero_padded(x: &[f64], n_fft: usize) -> Vec<Complex<f64>> {
    x.iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .chain(std::iter::repeat(Complex::default()))
        .take(n_fft)
        .collect()
}
