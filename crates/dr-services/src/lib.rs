//! dr-services
//!
//! Use cases built on the dr-core ports: per-entity server actions, the
//! optimistic form controller, analytics aggregation with its LLM tools, and
//! benchmark recording.

pub mod actions;
pub mod analytics;
pub mod benchmarks;
pub mod controller;
pub mod tools;

pub use actions::{BoundActions, EntityActions};
pub use analytics::{AnalyticsFilter, AnalyticsService, ChartData, Metric};
pub use benchmarks::BenchmarkService;
pub use controller::{
    ActionResult, DeleteOutcome, FormState, MutationController, ServerActions, SharedList,
    SubmitOutcome, Toast,
};
pub use tools::{AnalyticsTools, ToolDefinition};
