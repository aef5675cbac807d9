pub mod executor;
pub mod plan;
pub mod resolver;

pub use executor::{run_plan, NodeResult, PlanExecutionResult, PlanExecutor};
pub use plan::{create_plan, Node, NodeSpec, Plan, PlanMetadata};
pub use resolver::resolve_input;
