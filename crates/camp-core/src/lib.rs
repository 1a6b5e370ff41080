#![deny(missing_docs)]
#![doc = "Shared error surface, provenance records and seeding helpers for the campaign orchestrator."]

pub mod errors;
pub mod provenance;
pub mod rng;
pub mod serde;

pub use errors::{CampaignError, ErrorInfo};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, entropy_seed};
pub use crate::serde::{from_json_slice, stable_hash_string, to_canonical_json_bytes};
