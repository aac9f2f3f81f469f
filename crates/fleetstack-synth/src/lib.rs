//! fleetstack synthesis
//!
//! Renders a constructed stack into the provisioning engine's template
//! format and keeps the result under `.fleetstack/out`.

pub mod error;
pub mod store;
pub mod summary;
pub mod template;

pub use error::{Result, SynthError};
pub use store::ArtifactStore;
pub use summary::{ArtifactStatus, SynthSummary};
pub use template::{EngineOutput, EngineResource, EngineTemplate, FORMAT_VERSION};

use fleetstack_core::Stack;

/// Emit the resource graph of a stack and render it as an engine template
pub fn synthesize(stack: &Stack) -> Result<EngineTemplate> {
    let graph = stack.synth()?;
    EngineTemplate::from_graph(&graph)
}
