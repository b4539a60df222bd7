//! The eleven concrete content-producing workers, the `Agent` trait they
//! implement, and the registry the scheduler dispatches through.

mod agent;
mod agent_registry;
mod assembly_agent;
mod builders;
mod context;
mod literature_agent;
mod llm_agent;
mod prompts;
mod references_agent;

pub use agent::Agent;
pub use agent_registry::AgentRegistry;
pub use assembly_agent::AssemblyAgent;
pub use builders::default_agents;
pub use context::JobContext;
pub use literature_agent::LiteratureAgent;
pub use llm_agent::LlmAgent;
pub use references_agent::ReferencesAgent;
