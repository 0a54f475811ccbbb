pub mod aggregator;
pub mod config;
pub mod correlation;
pub mod csv;
pub mod error;
pub mod line;
pub mod output;
pub mod session;
pub mod store;
pub mod usage;

pub use aggregator::BuildOutputAggregator;
pub use config::{Config, LdsPolicy};
pub use correlation::CorrelationIndex;
pub use error::{Error, Result};
pub use line::{DisassemblyLine, FunctionalUnit, InstructionLine, LabelLine};
pub use output::{BuildOutputCollection, BuildOutputEntry, EntryKind, OutputFile, OutputFileKind, PipelineType};
pub use session::{read_session_metadata, SessionMetadata};
pub use store::EntrypointDisassemblyStore;
pub use usage::{HazardFlags, ResourceUsageAnalyzer, ResourceUsageRecord, ResourceUsageReport};
