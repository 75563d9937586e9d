/// muscle_steps: read a recording, run each muscle-detection stage on one
/// sensor type, and write every intermediate array to a safetensors file for
/// comparison against Python/MNE.
///
/// Output keys:
///   raw          [C, T]      f32  picked input channels
///   notch        [L, T]      f64  after the power-line notch (only with --notch)
///   bandpass     [L, T]      f64  after the band-pass FIR
///   envelope     [L, T]      f64  |analytic signal|
///   zscore       [A, T]      f64  per-channel z-scores
///   raw_score    [T]         f64  Σ z / sqrt(A)
///   score        [T]         f64  after the low-pass smoothing
///   intervals    [K, 2]      f64  (start_s, end_s) per interval
///   active       [A]         i32  input rows entering the aggregate
///   n_intervals  [1]         i32
///   sfreq        [1]         f64
///   ch_names     U8               newline-separated names of the picked rows
use anyhow::{Context, Result};
use clap::Parser;
use ndarray::Array2;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use megqc::{
    channels, compute_stages, detect_intervals,
    io::{RawRecording, StWriter},
    MuscleConfig, SensorType,
};

#[derive(Parser, Debug)]
#[command(name = "muscle_steps")]
struct Args {
    /// Input safetensors recording.
    #[arg(long)]
    input: PathBuf,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// Sensor type (default: mag when present).
    #[arg(long)]
    ch_type: Option<SensorType>,

    /// Z-score threshold (data dependent, no default).
    #[arg(long)]
    threshold: f64,

    /// Band-pass lower edge (Hz).
    #[arg(long, default_value_t = 110.0)]
    l_freq: f64,

    /// Band-pass upper edge (Hz).
    #[arg(long, default_value_t = 140.0)]
    h_freq: f64,

    /// Minimum clean gap between intervals (s).
    #[arg(long, default_value_t = 0.2)]
    min_gap: f64,

    /// Mirror padding per side (s).
    #[arg(long, default_value_t = 0.0)]
    padding: f64,

    /// Power-line frequencies to notch out (comma-separated, Hz).
    #[arg(long, value_delimiter = ',')]
    notch: Vec<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = MuscleConfig::default();
    cfg.band.low_hz = args.l_freq;
    cfg.band.high_hz = args.h_freq;
    cfg.detection.threshold = args.threshold;
    cfg.detection.min_good_gap_s = args.min_gap;
    cfg.detection.padding_s = args.padding;
    cfg.detection.notch_freqs_hz = args.notch.clone();

    // ── 1. Read + pick ─────────────────────────────────────────────────────
    let t_read = now();
    let signal = RawRecording::load(&args.input)?.into_signal()?;
    let ch_type = args
        .ch_type
        .or_else(|| channels::preferred(&signal))
        .context("no magnetometer or gradiometer channels")?;
    let picked = channels::pick(&signal, ch_type)?;
    let ms_read = t_read.elapsed().as_secs_f64() * 1000.0;

    // ── 2. Signal stages ───────────────────────────────────────────────────
    let t_stages = now();
    let stages = compute_stages(&picked, &cfg.band, &cfg.detection)?;
    let ms_stages = t_stages.elapsed().as_secs_f64() * 1000.0;

    // ── 3. Threshold + merge ───────────────────────────────────────────────
    let t_det = now();
    let score = stages.score.to_vec();
    let intervals = detect_intervals(
        &score,
        picked.sfreq(),
        cfg.detection.threshold,
        cfg.detection.min_good_gap_s,
    );
    let ms_det = t_det.elapsed().as_secs_f64() * 1000.0;

    // Format: "TIMING read=Xms stages=Xms detect=Xms"
    eprintln!("TIMING read={ms_read:.4}ms stages={ms_stages:.4}ms detect={ms_det:.4}ms");
    info!(
        %ch_type,
        channels = picked.n_channels(),
        active = stages.active.len(),
        intervals = intervals.len(),
        "stages computed"
    );

    // ── 4. Write output ────────────────────────────────────────────────────
    let mut w = StWriter::new();

    let raw: Vec<f32> = picked.data().iter().map(|&v| v as f32).collect();
    w.add_f32("raw", &raw, &[picked.n_channels(), picked.n_samples()]);
    if let Some(notched) = &stages.notched {
        w.add_f64_arr2("notch", notched);
    }
    w.add_f64_arr2("bandpass", &stages.bandpass);
    w.add_f64_arr2("envelope", &stages.envelope);
    w.add_f64_arr2("zscore", &stages.zscores);
    w.add_f64("raw_score", &stages.raw_score.to_vec(), &[stages.raw_score.len()]);
    w.add_f64("score", &score, &[score.len()]);

    let iv_flat: Vec<f64> = intervals
        .iter()
        .flat_map(|iv| [iv.start_time_s, iv.end_time_s])
        .collect();
    let iv_arr = Array2::from_shape_vec((intervals.len(), 2), iv_flat)?;
    w.add_f64_arr2("intervals", &iv_arr);

    let active: Vec<i32> = stages.active.iter().map(|&i| i as i32).collect();
    w.add_i32("active", &active, &[active.len()]);
    w.add_i32("n_intervals", &[intervals.len() as i32], &[1]);
    w.add_f64("sfreq", &[picked.sfreq()], &[1]);
    w.add_lines("ch_names", picked.ch_names());
    w.write(&args.output)?;

    eprintln!("Written → {}", args.output.display());
    Ok(())
}

/// Return `std::time::Instant::now()` (used for internal timing).
#[inline(always)]
fn now() -> std::time::Instant { std::time::Instant::now() }
