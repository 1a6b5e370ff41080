#![deny(missing_docs)]
#![doc = "Sensitivity design generation for campaign orchestration."]

/// Design generation for every sensitivity mode.
pub mod design;
/// Saltelli cross-sampling over Sobol base points.
pub mod saltelli;
/// Low-discrepancy Sobol sequence generator.
pub mod sobol;

pub use design::{generate, generate_design, SamplingSeed, SensitivityDesign, SensitivityRow};
pub use saltelli::{balanced_base_size, saltelli_row_count};
pub use sobol::{SobolSequence, MAX_DIMENSIONS};
