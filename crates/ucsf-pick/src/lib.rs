//! Peak picking on UCSF spectra: noise estimation, the parallel
//! local-extremum scan, sub-grid refinement and SPARKY peak lists.

pub mod auto;
pub mod error;
pub mod noise;
pub mod peaklist;
pub mod refine;
pub mod scanner;

pub use auto::{auto_pick_peaks, refine_sparky_peaks, PickOptions, PickReport};
pub use error::PickError;
pub use noise::sample_noise;
pub use peaklist::{read_peak_list, write_peak_list, write_refined};
pub use refine::{refine_by_shifts, refine_peak, refine_peaks, RefinedPeak};
pub use scanner::{
    filter_by_count, filter_by_height, find_peaks, is_local_maximum, is_local_maximum_by_shifts,
    GridPeak, Restraint, ScanParams,
};
