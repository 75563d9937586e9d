use anyhow::{bail, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use megqc::{
    channels, detect_muscle_on,
    io::{write_events_tsv, write_scores_tsv, write_summary_json, DerivativePaths, RawRecording},
    MuscleConfig, SensorType, SignalMatrix,
};

#[derive(Parser, Debug)]
#[command(name = "muscle", about = "MEG muscle-artifact detection (z-score method)")]
struct Args {
    /// Recording as safetensors (data [C, T], sfreq, ch_names, ch_types).
    #[arg(long)]
    input: PathBuf,

    /// Directory for the TSV / JSON derivatives.
    #[arg(long)]
    out_dir: PathBuf,

    /// TOML config ([band], [detection], ch_type).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Z-score threshold (overrides the config file).
    #[arg(long)]
    threshold: Option<f64>,

    /// Sensor type: mag or grad (default: mag when present).
    #[arg(long)]
    ch_type: Option<SensorType>,

    /// Run every available sensor type instead of the preferred one.
    #[arg(long, conflicts_with = "ch_type")]
    all_types: bool,

    /// Mirror padding attached before filtering (s).
    #[arg(long)]
    padding: Option<f64>,

    /// Power-line frequencies to notch out (comma-separated, Hz).
    #[arg(long, value_delimiter = ',')]
    notch: Vec<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => MuscleConfig::load(path)?,
        None => MuscleConfig::default(),
    };
    if let Some(t) = args.threshold {
        cfg.detection.threshold = t;
    }
    if let Some(p) = args.padding {
        cfg.detection.padding_s = p;
    }
    if !args.notch.is_empty() {
        cfg.detection.notch_freqs_hz = args.notch.clone();
    }
    if args.ch_type.is_some() {
        cfg.ch_type = args.ch_type;
    }
    if cfg.detection.threshold.is_nan() {
        bail!("no threshold given: pass --threshold or set [detection] threshold in the config");
    }

    let signal = RawRecording::load(&args.input)?.into_signal()?;
    info!(
        channels = signal.n_channels(),
        samples = signal.n_samples(),
        sfreq = signal.sfreq(),
        "loaded {}",
        args.input.display()
    );

    let types: Vec<SensorType> = if args.all_types {
        channels::available(&signal)
    } else {
        match cfg.ch_type.or_else(|| channels::preferred(&signal)) {
            Some(t) => vec![t],
            None => vec![],
        }
    };
    if types.is_empty() {
        bail!("no magnetometer or gradiometer channels in {}", args.input.display());
    }

    std::fs::create_dir_all(&args.out_dir)?;

    // A failure on one sensor type must not stop the others.
    let mut n_ok = 0usize;
    for ch_type in &types {
        let run_cfg = MuscleConfig { ch_type: Some(*ch_type), ..cfg.clone() };
        match run_one(&signal, &run_cfg, &args.out_dir) {
            Ok(paths) => {
                info!(%ch_type, "written → {}", paths.events.display());
                n_ok += 1;
            }
            Err(e) => error!(%ch_type, "muscle detection failed: {e:#}"),
        }
    }

    if n_ok == 0 {
        bail!("muscle detection failed for every sensor type");
    }
    Ok(())
}

/// Detect on one sensor type and write its derivatives.
fn run_one(signal: &SignalMatrix, cfg: &MuscleConfig, out_dir: &Path) -> Result<DerivativePaths> {
    let (ch_type, det) = detect_muscle_on(signal, cfg)?;
    info!(%ch_type, events = det.events.len(), "detection done");
    let paths = DerivativePaths::new(out_dir, ch_type);
    write_scores_tsv(&paths.scores, &det.score)?;
    write_events_tsv(&paths.events, &det.events)?;
    write_summary_json(&paths.summary, &det.summary(Some(ch_type)))?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use megqc::DetectionConfig;
    use ndarray::Array2;

    fn mag_recording() -> SignalMatrix {
        let data = Array2::from_shape_fn((4, 2000), |(c, t)| {
            let on = (800..1200).contains(&t);
            if on { ((t as f64) * 0.785 + c as f64).sin() } else { 0.0 }
        });
        let names = (0..4).map(|i| format!("MEG {:03}1", 11 + 10 * i)).collect();
        SignalMatrix::with_channels(data, 1000.0, names, vec![None; 4]).unwrap()
    }

    #[test]
    fn write_failure_is_reported_per_type() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-created");
        let cfg = MuscleConfig {
            detection: DetectionConfig::with_threshold(3.0),
            ..MuscleConfig::default()
        };
        // Output directory absent: the error comes back instead of aborting the loop.
        assert!(run_one(&mag_recording(), &cfg, &missing).is_err());

        let paths = run_one(&mag_recording(), &cfg, dir.path()).unwrap();
        assert!(paths.scores.exists() && paths.events.exists() && paths.summary.exists());
    }

    #[test]
    fn threshold_flag_parses() {
        let args = Args::try_parse_from([
            "muscle", "--input", "a.safetensors", "--out-dir", "out", "--threshold", "5",
            "--notch", "50,100",
        ])
        .unwrap();
        assert_eq!(args.threshold, Some(5.0));
        assert_eq!(args.notch, vec![50.0, 100.0]);
        assert!(Args::try_parse_from(["muscle", "--input", "a", "--out-dir", "o", "--ch-type", "grad", "--all-types"]).is_err());
    }
}
