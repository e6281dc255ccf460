pub mod orchestrator;
pub mod selection;

pub use orchestrator::{DeployOrchestrator, DeployReport, UpdateDisposition};
pub use selection::{PrSelection, SelectionStore, SelectionToken};
