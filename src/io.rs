//! Safetensors input, TSV / JSON derivatives, and an intermediate-array dump.
//!
//! Reader: parses a recording exported as safetensors with
//!   `data`      [C, T]  F32 or F64
//!   `sfreq`     [1]     F32 or F64
//!   `ch_names`  U8      newline-separated, optional
//!   `ch_types`  U8      newline-separated (`mag` / `grad` / other), optional
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::channels::SensorType;
use crate::detect::MuscleEvent;
use crate::muscle::{MuscleSummary, ScoreSeries};
use crate::signal::SignalMatrix;

// ── Low-level safetensors parser (raw bytes → ndarray, no tensor types). ────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let n = u64::from_le_bytes(bytes[..8].try_into()?);
    let data_start = usize::try_from(n)
        .ok()
        .and_then(|n| n.checked_add(8))
        .filter(|&end| end <= bytes.len())
        .with_context(|| format!("safetensors header truncated ({n} bytes announced)"))?;
    let header: HashMap<String, Value> = serde_json::from_slice(&bytes[8..data_start])
        .context("failed to parse safetensors header")?;
    Ok((header, data_start))
}

fn tensor_bytes<'a>(bytes: &'a [u8], data_start: usize, entry: &Value) -> Result<&'a [u8]> {
    let offsets = entry["data_offsets"]
        .as_array()
        .context("tensor entry without data_offsets")?;
    let (s, e) = match offsets.as_slice() {
        [s, e] => (
            s.as_u64().context("bad data offset")? as usize,
            e.as_u64().context("bad data offset")? as usize,
        ),
        _ => bail!("data_offsets must hold two values"),
    };
    let (Some(start), Some(end)) = (data_start.checked_add(s), data_start.checked_add(e)) else {
        bail!("tensor data offsets overflow");
    };
    bytes.get(start..end).context("tensor data out of bounds")
}

/// Decode an F32 or F64 tensor into `f64`.
fn read_float_tensor(bytes: &[u8], data_start: usize, entry: &Value) -> Result<Vec<f64>> {
    let raw = tensor_bytes(bytes, data_start, entry)?;
    match entry["dtype"].as_str() {
        Some("F32") => Ok(raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect()),
        Some("F64") => Ok(raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect()),
        other => bail!("unsupported dtype {other:?} (expected F32 or F64)"),
    }
}

fn read_lines(bytes: &[u8], data_start: usize, entry: &Value) -> Result<Vec<String>> {
    let raw = tensor_bytes(bytes, data_start, entry)?;
    Ok(std::str::from_utf8(raw)?
        .split('\n')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

fn shape_of(entry: &Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("tensor entry without shape")?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("bad shape entry"))
        .collect()
}

// ── Public structs ────────────────────────────────────────────────────────────

/// A recording loaded from safetensors.
pub struct RawRecording {
    /// [C, T] in original units.
    pub data: Array2<f64>,
    /// Sampling rate (Hz).
    pub sfreq: f64,
    /// Channel names (generated as `ch{i}` when not stored).
    pub ch_names: Vec<String>,
    /// Sensor type per channel (`None` for unknown or non-MEG channels).
    pub ch_types: Vec<Option<SensorType>>,
}

impl RawRecording {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;

        let data_entry = header.get("data").context("missing 'data' key")?;
        let data_shape = shape_of(data_entry)?;
        if data_shape.len() != 2 {
            bail!("'data' must be 2-D [C, T], got shape {data_shape:?}");
        }
        let data_vec = read_float_tensor(&bytes, data_start, data_entry)?;
        let data = Array2::from_shape_vec((data_shape[0], data_shape[1]), data_vec)?;
        let n_ch = data.nrows();

        let sfreq_entry = header.get("sfreq").context("missing 'sfreq' key")?;
        let sfreq = *read_float_tensor(&bytes, data_start, sfreq_entry)?
            .first()
            .context("empty 'sfreq' tensor")?;

        // Channel names and types are optional.
        let ch_names = match header.get("ch_names") {
            Some(e) => read_lines(&bytes, data_start, e)?,
            None => (0..n_ch).map(|i| format!("ch{i}")).collect(),
        };
        let ch_types = match header.get("ch_types") {
            Some(e) => read_lines(&bytes, data_start, e)?
                .iter()
                .map(|t| t.parse::<SensorType>().ok())
                .collect(),
            None => vec![None; n_ch],
        };
        if ch_names.len() != n_ch || ch_types.len() != n_ch {
            bail!(
                "{n_ch} channels in 'data' but {} names and {} types",
                ch_names.len(),
                ch_types.len()
            );
        }

        Ok(RawRecording { data, sfreq, ch_names, ch_types })
    }

    pub fn into_signal(self) -> Result<SignalMatrix> {
        Ok(SignalMatrix::with_channels(self.data, self.sfreq, self.ch_names, self.ch_types)?)
    }
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer that handles F32, F64, I32 and U8 tensors.
///
/// Usage:
/// ```rust,no_run
/// use megqc::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("score", &[1.0f64, 2.0, 3.0], &[3]);
/// w.add_i32("n_events", &[0], &[1]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Store strings newline-separated as a U8 tensor.
    pub fn add_lines(&mut self, name: &str, lines: &[String]) {
        let bytes = lines.join("\n").into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Derivative tables ────────────────────────────────────────────────────────

/// Output paths for one sensor type inside `out_dir`.
pub struct DerivativePaths {
    pub scores: PathBuf,
    pub events: PathBuf,
    pub summary: PathBuf,
}

impl DerivativePaths {
    pub fn new(out_dir: &Path, ch_type: SensorType) -> Self {
        let stem = format!("muscle_{ch_type}");
        Self {
            scores: out_dir.join(format!("{stem}_scores.tsv")),
            events: out_dir.join(format!("{stem}_events.tsv")),
            summary: out_dir.join(format!("{stem}_summary.json")),
        }
    }
}

/// One row per sample: `time_s\tscore`.
pub fn write_scores_tsv(path: &Path, score: &ScoreSeries) -> Result<()> {
    let mut w = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    writeln!(w, "time_s\tscore")?;
    for (t, v) in score.iter() {
        writeln!(w, "{t}\t{v}")?;
    }
    w.flush()?;
    Ok(())
}

/// One row per event: `start_time_s\tend_time_s\tpeak_time_s\tpeak_score`.
pub fn write_events_tsv(path: &Path, events: &[MuscleEvent]) -> Result<()> {
    let mut w = std::io::BufWriter::new(
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    writeln!(w, "start_time_s\tend_time_s\tpeak_time_s\tpeak_score")?;
    for e in events {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            e.interval.start_time_s, e.interval.end_time_s, e.peak_time_s, e.peak_score
        )?;
    }
    w.flush()?;
    Ok(())
}

/// Pretty-printed JSON summary.
pub fn write_summary_json(path: &Path, summary: &MuscleSummary) -> Result<()> {
    let f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(f, summary)?;
    Ok(())
}
