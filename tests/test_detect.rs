mod common;
use common::{
    add_line, burst_data, burst_signal, mag_names, n_samples, noise_burst_signal, N_CHANNELS,
    SFREQ,
};
use megqc::{
    detect_muscle, detect_muscle_on, BandConfig, DetectionConfig, MuscleConfig, MuscleError,
    SensorType, SignalMatrix,
};
use ndarray::{concatenate, Array2, Axis};

fn run(signal: &SignalMatrix, threshold: f64) -> megqc::MuscleDetection {
    detect_muscle(signal, &BandConfig::default(), &DetectionConfig::with_threshold(threshold))
        .unwrap()
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn single_burst_detected() {
    let det = run(&burst_signal(&[(4.0, 5.0)]), 5.0);
    let ivs = det.intervals();

    assert_eq!(ivs.len(), 1, "expected one interval, got {ivs:?}");
    assert!((ivs[0].start_time_s - 4.0).abs() < 0.3, "start {}", ivs[0].start_time_s);
    assert!((ivs[0].end_time_s - 5.0).abs() < 0.3, "end {}", ivs[0].end_time_s);

    // Clean data away from the burst stays below threshold.
    for (t, v) in det.score.iter() {
        if !(3.5..=5.5).contains(&t) {
            assert!(v < 5.0, "score {v:.2} at t = {t:.3} s");
        }
    }
}

#[test]
fn short_gap_merges_bursts() {
    let det = run(&burst_signal(&[(2.0, 2.5), (2.6, 3.1)]), 5.0);
    let ivs = det.intervals();

    assert_eq!(ivs.len(), 1, "0.1 s gap must be merged, got {ivs:?}");
    assert!((ivs[0].start_time_s - 2.0).abs() < 0.2, "start {}", ivs[0].start_time_s);
    assert!((ivs[0].end_time_s - 3.1).abs() < 0.2, "end {}", ivs[0].end_time_s);
}

#[test]
fn long_gap_keeps_bursts_apart() {
    let det = run(&burst_signal(&[(2.0, 2.5), (3.5, 4.0)]), 5.0);
    let ivs = det.intervals();

    assert_eq!(ivs.len(), 2, "1 s gap must not be merged, got {ivs:?}");
    assert!(ivs[0].end_time_s < 3.0 && ivs[1].start_time_s > 3.0, "{ivs:?}");
}

#[test]
fn events_report_peak_inside_interval() {
    let det = run(&burst_signal(&[(4.0, 5.0)]), 5.0);
    let ev = &det.events[0];
    assert!(ev.peak_time_s >= ev.interval.start_time_s && ev.peak_time_s < ev.interval.end_time_s);
    assert!(ev.peak_score >= 5.0);
    assert_eq!(ev.peak_score, det.score.max());
}

// ── Band-limited noise bursts ─────────────────────────────────────────────────

#[test]
fn noise_burst_detected() {
    let det = run(&noise_burst_signal(N_CHANNELS, &[(4.0, 5.0)]), 5.0);
    let ivs = det.intervals();

    assert_eq!(ivs.len(), 1, "expected one interval, got {ivs:?}");
    assert!((ivs[0].start_time_s - 4.0).abs() < 0.3, "start {}", ivs[0].start_time_s);
    assert!((ivs[0].end_time_s - 5.0).abs() < 0.3, "end {}", ivs[0].end_time_s);
    for (t, v) in det.score.iter() {
        if !(3.5..=5.5).contains(&t) {
            assert!(v < 5.0, "score {v:.2} at t = {t:.3} s");
        }
    }
}

#[test]
fn noise_bursts_with_short_gap_merge() {
    let det = run(&noise_burst_signal(N_CHANNELS, &[(2.0, 2.5), (2.6, 3.1)]), 5.0);
    let ivs = det.intervals();

    assert_eq!(ivs.len(), 1, "0.1 s gap must be merged, got {ivs:?}");
    assert!((ivs[0].start_time_s - 2.0).abs() < 0.2, "start {}", ivs[0].start_time_s);
    assert!((ivs[0].end_time_s - 3.1).abs() < 0.2, "end {}", ivs[0].end_time_s);
}

#[test]
fn noise_bursts_with_long_gap_stay_apart() {
    let det = run(&noise_burst_signal(N_CHANNELS, &[(2.0, 2.5), (3.5, 4.0)]), 5.0);
    let ivs = det.intervals();

    assert_eq!(ivs.len(), 2, "1 s gap must not be merged, got {ivs:?}");
    assert!(ivs[0].end_time_s < 3.0 && ivs[1].start_time_s > 3.0, "{ivs:?}");
}

#[test]
fn single_channel_cannot_reach_threshold_five() {
    // One channel bursting 10 % of the time: the smoothed z-score inside the
    // burst sits near sqrt(0.9 / 0.1) = 3, so threshold 5 is out of reach.
    let det = run(&noise_burst_signal(1, &[(4.0, 5.0)]), 5.0);
    let max = det.score.max();
    assert!(det.intervals().is_empty(), "{:?}", det.intervals());
    assert!(max > 2.0 && max < 5.0, "max score {max:.2}");
    // The burst is still where the score peaks.
    let peak_t = det.score.iter().fold((0.0, f64::NEG_INFINITY), |b, c| if c.1 > b.1 { c } else { b }).0;
    assert!((3.8..=5.2).contains(&peak_t), "peak at {peak_t:.3} s");
}

// ── Invariants ────────────────────────────────────────────────────────────────

#[test]
fn score_has_one_value_per_sample() {
    let signal = burst_signal(&[(4.0, 5.0)]);
    for padding_s in [0.0, 1.0] {
        let cfg = DetectionConfig { padding_s, ..DetectionConfig::with_threshold(5.0) };
        let det = detect_muscle(&signal, &BandConfig::default(), &cfg).unwrap();
        assert_eq!(det.score.len(), n_samples(), "padding_s = {padding_s}");
        assert!(det.score.values().iter().all(|v| v.is_finite()));
    }
}

#[test]
fn padding_does_not_move_the_interval() {
    let signal = burst_signal(&[(4.0, 5.0)]);
    let cfg = DetectionConfig { padding_s: 1.0, ..DetectionConfig::with_threshold(5.0) };
    let padded = detect_muscle(&signal, &BandConfig::default(), &cfg).unwrap();
    let plain = run(&signal, 5.0);

    assert_eq!(padded.intervals().len(), 1);
    let (a, b) = (padded.intervals()[0], plain.intervals()[0]);
    assert!((a.start_time_s - b.start_time_s).abs() < 0.05, "{a:?} vs {b:?}");
    assert!((a.end_time_s - b.end_time_s).abs() < 0.05, "{a:?} vs {b:?}");
}

#[test]
fn intervals_sorted_disjoint_and_in_bounds() {
    let det = run(&burst_signal(&[(1.0, 1.4), (3.0, 3.5), (6.0, 7.0)]), 4.0);
    let ivs = det.intervals();
    assert!(!ivs.is_empty());
    let duration = n_samples() as f64 / SFREQ;
    for iv in &ivs {
        assert!(0.0 <= iv.start_time_s && iv.start_time_s < iv.end_time_s, "{iv:?}");
        assert!(iv.end_time_s <= duration, "{iv:?}");
    }
    for pair in ivs.windows(2) {
        assert!(pair[0].end_time_s < pair[1].start_time_s, "{pair:?}");
        // Separated gaps are never shorter than the merge distance.
        assert!(pair[1].start_time_s - pair[0].end_time_s >= 0.2 - 1e-9, "{pair:?}");
    }
}

#[test]
fn detection_is_deterministic() {
    let signal = burst_signal(&[(4.0, 5.0)]);
    let a = run(&signal, 5.0);
    let b = run(&signal, 5.0);
    assert_eq!(a.score, b.score);
    assert_eq!(a.events, b.events);
}

#[test]
fn higher_threshold_only_shrinks_intervals() {
    let signal = burst_signal(&[(1.0, 1.4), (3.0, 3.5), (6.0, 7.0)]);
    let det = run(&signal, 2.0);
    let low = det.intervals();
    for hi_t in [3.0, 5.0, 8.0] {
        for ev in det.rethreshold(hi_t) {
            let hi = ev.interval;
            assert!(
                low.iter().any(|lo| lo.start_time_s <= hi.start_time_s && hi.end_time_s <= lo.end_time_s),
                "interval {hi:?} at threshold {hi_t} not covered by {low:?}"
            );
        }
    }
}

#[test]
fn threshold_above_max_score_gives_nothing() {
    let det = run(&burst_signal(&[(4.0, 5.0)]), 5.0);
    assert!(det.rethreshold(det.score.max() + 1.0).is_empty());
}

// ── Degenerate channels ───────────────────────────────────────────────────────

#[test]
fn flat_channel_skipped_and_reported() {
    let data = burst_data(N_CHANNELS, &[(4.0, 5.0)]);
    let flat = Array2::<f64>::zeros((1, n_samples()));
    let data = concatenate(Axis(0), &[data.view(), flat.view()]).unwrap();
    let signal = SignalMatrix::with_channels(
        data,
        SFREQ,
        mag_names(N_CHANNELS + 1),
        vec![Some(SensorType::Mag); N_CHANNELS + 1],
    )
    .unwrap();

    let det = run(&signal, 5.0);
    assert_eq!(det.skipped.len(), 1);
    assert_eq!(det.skipped[0].index, N_CHANNELS);
    assert_eq!(det.channels_used.len(), N_CHANNELS);
    assert_eq!(det.intervals().len(), 1);
    assert!(det.score.values().iter().all(|v| v.is_finite()));
}

#[test]
fn all_flat_channels_fail() {
    let signal = SignalMatrix::new(Array2::zeros((4, n_samples())), SFREQ);
    let err = detect_muscle(&signal, &BandConfig::default(), &DetectionConfig::with_threshold(5.0))
        .unwrap_err();
    assert!(matches!(err, MuscleError::DegenerateSignal { channel: 0, .. }), "{err}");
}

#[test]
fn missing_threshold_rejected() {
    let signal = burst_signal(&[(4.0, 5.0)]);
    let err = detect_muscle(&signal, &BandConfig::default(), &DetectionConfig::default())
        .unwrap_err();
    assert!(matches!(err, MuscleError::Config(_)), "{err}");
}

// ── Power-line notch ──────────────────────────────────────────────────────────

#[test]
fn notch_recovers_burst_under_line_harmonic() {
    let mut data = burst_data(N_CHANNELS, &[(4.0, 5.0)]);
    add_line(&mut data, 120.0, 5e-12);
    let signal = SignalMatrix::with_channels(
        data,
        SFREQ,
        mag_names(N_CHANNELS),
        vec![Some(SensorType::Mag); N_CHANNELS],
    )
    .unwrap();

    let plain = run(&signal, 5.0);
    let cfg = DetectionConfig { notch_freqs_hz: vec![60.0, 120.0], ..DetectionConfig::with_threshold(5.0) };
    let notched = detect_muscle(&signal, &BandConfig::default(), &cfg).unwrap();

    let ivs = notched.intervals();
    assert_eq!(ivs.len(), 1, "{ivs:?}");
    assert!((ivs[0].start_time_s - 4.0).abs() < 0.3 && (ivs[0].end_time_s - 5.0).abs() < 0.3);
    assert!(notched.score.max() > plain.score.max());
}

// ── Sensor-type selection ─────────────────────────────────────────────────────

#[test]
fn picks_magnetometers_from_mixed_recording() {
    let mags = burst_data(N_CHANNELS, &[(4.0, 5.0)]);
    // Gradiometers see nothing but a flat trace.
    let grads = Array2::<f64>::zeros((2, n_samples()));
    let data = concatenate(Axis(0), &[mags.view(), grads.view()]).unwrap();
    let mut names = mag_names(N_CHANNELS);
    names.extend(["MEG 0112".to_string(), "MEG 0113".to_string()]);
    let signal = SignalMatrix::with_channels(data, SFREQ, names, vec![None; N_CHANNELS + 2]).unwrap();

    let cfg = MuscleConfig {
        detection: DetectionConfig::with_threshold(5.0),
        ..MuscleConfig::default()
    };
    let (ch_type, det) = detect_muscle_on(&signal, &cfg).unwrap();
    assert_eq!(ch_type, SensorType::Mag);
    assert_eq!(det.channels_used.len(), N_CHANNELS);
    assert_eq!(det.intervals().len(), 1);

    // Forcing gradiometers hits the all-flat failure.
    let grad_cfg = MuscleConfig { ch_type: Some(SensorType::Grad), ..cfg };
    assert!(matches!(
        detect_muscle_on(&signal, &grad_cfg),
        Err(MuscleError::DegenerateSignal { .. })
    ));
}

#[test]
fn summary_counts_events() {
    let det = run(&burst_signal(&[(2.0, 2.5), (6.0, 7.0)]), 5.0);
    let summary = det.summary(Some(SensorType::Mag));
    assert_eq!(summary.n_events, 2);
    assert_eq!(summary.n_channels_used, N_CHANNELS);
    approx::assert_abs_diff_eq!(summary.recording_duration_s, 10.0);
    assert!(summary.artifact_fraction > 0.1 && summary.artifact_fraction < 0.2,
        "fraction {}", summary.artifact_fraction);
}
