//! Agents: the decision loop, the planner pipeline and the profile harvester.

mod bridge;
mod harvester;
mod planner;
mod prompt_engine;
mod smart_agent;

pub use bridge::{ExecutionReport, PlanBridge, StepReport, DEFAULT_WAIT_MS};
pub use harvester::{HarvestError, InsightHarvester};
pub use planner::{
    NeuroPlanner, Plan, PlanStep, PlannerError, MOCK_PLAN, PLANNING_ERROR_STEP,
};
pub use prompt_engine::{PromptEngine, RELEVANT_MEMORY_COUNT};
pub use smart_agent::{AgentConfig, AgentError, AgentOutcome, SmartAgent};
