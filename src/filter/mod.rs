//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc FIR design (band-pass, low-pass,
//!   multi-line notch), matching `mne.filter.create_filter(fir_window='hamming',
//!   fir_design='firwin', phase='zero')`.
//! - [`apply`]: Overlap-add zero-phase convolution, matching MNE's
//!   `_overlap_add_filter` / `_1d_overlap_filter`.

pub mod apply;
pub mod design;

pub use apply::{filter_1d, filter_rows};
pub use design::{
    auto_filter_length, auto_h_trans_bandwidth, auto_l_trans_bandwidth, design_bandpass,
    design_lowpass, design_notch, firwin, gain_at, hamming,
};
