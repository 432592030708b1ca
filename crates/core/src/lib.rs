//! sample-core
//!
//! Core library for preparing adversarial PE samples.
//!
//! This crate owns the sample record (configuration, validation, lifecycle and
//! result fields) and the binary inspector it delegates to (PE detection,
//! whole-file and code-section fingerprints).
//!
//! The optimizer, the classifier, persistence and any front end are external
//! collaborators: they read the record's input snapshot and write its output
//! snapshot and result fields.

pub mod inspect;
pub mod sample;

pub use sample::{ClassLabels, SampleOptions, SampleRecord};
