//! AOI-driven staging of multi-tier geospatial archives.
//!
//! A run takes a processing directive (target date, AOI, declared content
//! per tier), walks the tiers in a fixed order, discovers granules whose
//! filenames encode the target date, filters them against the AOI through
//! a per-batch spatial index, and copies the matches into an output tree
//! mirroring the tier hierarchy. The store seam keeps local directories
//! and remote object storage interchangeable, chosen once per run.

pub mod columnar;
pub mod directive;
pub mod locate;
pub mod orchestrator;
pub mod store;
pub mod transfer;
pub mod vector;

pub use directive::{ProcessingDirective, TierContent, TierRoots};
pub use locate::Granule;
pub use orchestrator::{Orchestrator, RunSummary};
pub use store::{DataStore, LocalStore, RemoteStore, RemoteStoreConfig};
pub use transfer::CopyOutcome;
