//! Discharge Segmenter
//!
//! Finds intervals where a site's battery carried the load instead of mains.
//!
//! ## Pipeline
//! - `segmenter`: sign classification, transition detection, candidate
//!   extraction and duration ranking
//! - `trimming`: boundary shift, voltage-stress validation and current-decay
//!   end trimming
//!
//! Candidates are reported longest first; equal lengths keep discovery order.

pub mod segmenter;
pub mod trimming;

pub use segmenter::{
    classify_currents, extract_candidates, find_transitions, rank_candidates, DischargeSegmenter,
};
pub use trimming::trim_candidate;
