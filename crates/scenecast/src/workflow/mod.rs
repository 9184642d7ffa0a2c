pub mod context;
pub mod engine;
pub mod event;
pub mod executor;
pub mod graph;
pub mod prompt;
pub mod reducers;
pub mod state;

pub use context::{
    Artifact, Context, ContextUpdate, Coordinates, LocationDescription, DEFAULT_TEMPERATURE,
    FALLBACK_LOCATION,
};
pub use engine::{Orchestrator, OrchestratorHandle, Snapshot};
pub use event::{EventKind, FlowEvent, LocationError, LocationErrorCode};
pub use executor::StepExecutor;
pub use graph::{Route, StateGraph};
pub use state::{FlowState, Step};
