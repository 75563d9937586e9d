//! Analytic-signal amplitude envelope.
//!
//! Matches `raw.apply_hilbert(envelope=True)` / `scipy.signal.hilbert`:
//!   1. FFT of the real signal.
//!   2. Keep DC (and Nyquist for even lengths), double positive frequencies,
//!      zero negative frequencies.
//!   3. Inverse FFT → analytic signal `x + i·H[x]`.
//!   4. Envelope = |analytic signal|.
//!
//! Each channel is transformed independently.
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rustfft::{num_complex::Complex, FftPlanner};

/// Envelope of every row of `data` ([C, T]).
pub fn envelope_rows(data: ArrayView2<'_, f64>) -> Array2<f64> {
    let n_t = data.ncols();
    let mut out = Array2::<f64>::zeros(data.raw_dim());
    if n_t == 0 {
        return out;
    }
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let fwd = planner.plan_fft_forward(n_t);
    let inv = planner.plan_fft_inverse(n_t);
    let weights = analytic_weights(n_t);
    let inv_scale = 1.0 / n_t as f64;

    for (row_in, mut row_out) in data.rows().into_iter().zip(out.rows_mut()) {
        let mut buf: Vec<Complex<f64>> = row_in.iter().map(|&v| Complex { re: v, im: 0.0 }).collect();
        fwd.process(&mut buf);
        for (b, &w) in buf.iter_mut().zip(weights.iter()) {
            *b *= w;
        }
        inv.process(&mut buf);
        for (o, b) in row_out.iter_mut().zip(buf.iter()) {
            *o = b.norm() * inv_scale;
        }
    }
    out
}

/// Envelope of a single 1-D signal.
pub fn envelope_1d(x: &[f64]) -> Vec<f64> {
    let view = ArrayView1::from(x).insert_axis(Axis(0));
    envelope_rows(view).row(0).to_vec()
}

/// Spectral weights turning an FFT into the analytic-signal spectrum.
fn analytic_weights(n: usize) -> Vec<f64> {
    let mut w = vec![0.0; n];
    w[0] = 1.0;
    if n % 2 == 0 {
        w[n / 2] = 1.0;
        w[1..n / 2].iter_mut().for_each(|v| *v = 2.0);
    } else {
        w[1..n.div_ceil(2)].iter_mut().for_each(|v| *v = 2.0);
    }
    w
}
