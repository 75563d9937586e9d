//! Sensor-type classification and channel picking.
//!
//! Detection runs on one sensor type at a time. Magnetometers are preferred
//! when both types are present: they are more sensitive to muscle activity.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MuscleError, Result};
use crate::signal::SignalMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    /// Magnetometer (T).
    Mag,
    /// Planar gradiometer (T/m).
    Grad,
}

impl SensorType {
    /// Preference order for muscle detection.
    pub const PREFERENCE: [SensorType; 2] = [SensorType::Mag, SensorType::Grad];

    pub fn as_str(self) -> &'static str {
        match self {
            SensorType::Mag => "mag",
            SensorType::Grad => "grad",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mag" | "magnetometer" | "magnetometers" => Ok(SensorType::Mag),
            "grad" | "gradiometer" | "gradiometers" => Ok(SensorType::Grad),
            other => Err(format!("unknown sensor type '{other}' (expected mag or grad)")),
        }
    }
}

/// Infer the sensor type from a Neuromag/MEGIN channel name.
///
/// `MEG 0111` (last digit 1) is a magnetometer, `MEG 0112` / `MEG 0113`
/// are planar gradiometers. Spaces are ignored (`MEG0111` also matches).
/// Anything else returns `None`.
pub fn infer_from_name(name: &str) -> Option<SensorType> {
    let norm: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = norm.strip_prefix("MEG")?;
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.as_bytes()[3] {
        b'1' => Some(SensorType::Mag),
        b'2' | b'3' => Some(SensorType::Grad),
        _ => None,
    }
}

/// Sensor type of every channel: explicit type when known, otherwise
/// inferred from the name.
pub fn resolve_types(signal: &SignalMatrix) -> Vec<Option<SensorType>> {
    signal
        .ch_types()
        .iter()
        .zip(signal.ch_names())
        .map(|(t, name)| t.or_else(|| infer_from_name(name)))
        .collect()
}

/// Sensor types present in `signal`, in preference order.
pub fn available(signal: &SignalMatrix) -> Vec<SensorType> {
    let types = resolve_types(signal);
    SensorType::PREFERENCE
        .into_iter()
        .filter(|st| types.contains(&Some(*st)))
        .collect()
}

/// The most suitable sensor type present in `signal`.
pub fn preferred(signal: &SignalMatrix) -> Option<SensorType> {
    available(signal).into_iter().next()
}

/// Indices of the channels of `sensor_type`.
pub fn indices_of(signal: &SignalMatrix, sensor_type: SensorType) -> Vec<usize> {
    resolve_types(signal)
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == Some(sensor_type))
        .map(|(i, _)| i)
        .collect()
}

/// New matrix holding only the channels of `sensor_type`.
pub fn pick(signal: &SignalMatrix, sensor_type: SensorType) -> Result<SignalMatrix> {
    let rows = indices_of(signal, sensor_type);
    if rows.is_empty() {
        return Err(MuscleError::empty(format!("no {sensor_type} channels in recording")));
    }
    let sub = signal.select_rows(&rows);
    let sfreq = sub.sfreq();
    let names = sub.ch_names().to_vec();
    // Names may have carried the type only implicitly; pin it down.
    SignalMatrix::with_channels(sub.into_data(), sfreq, names, vec![Some(sensor_type); rows.len()])
}
