//! Page lifecycle and resource-scheduling engine for a browser page.
//!
//! This crate owns navigation, subresource discovery and admission,
//! speculative prefetch/preconnect, network-aware policy, and lifecycle
//! milestone tracking for a single page. It drives the `DomBuilder`,
//! `ScriptHost`, `LayoutSolver`, and `Rasterizer` collaborators defined in
//! sibling crates but does not itself parse HTML, execute script, compute
//! layout, or rasterize.

// Resource catalog, priority ordering, and state machine (C1, C6).
pub mod catalog;
pub mod prioritizer;

// Network awareness (C2, C3).
pub mod bandwidth;
pub mod network_profile;

// Connection and speculative fetch management (C4, C5).
pub mod preconnect;
pub mod prefetch;

// Adaptive policy and predictive hints (C7, C8).
pub mod hints;
pub mod policy;

// Page lifecycle and milestones (C9, C10, C11).
pub mod milestones;
pub mod page_state;
pub mod render_gate;

// Root orchestrator (C12) and its message protocol.
pub mod command;
pub mod scheduler;

// Ambient stack.
pub mod config;
pub mod error;
pub mod snapshot;
pub mod telemetry;
pub mod transport;

pub use catalog::{Priority, PriorityLevel, RecordId, ResourceCatalog, ResourceRecord, ResourceState};
pub use command::{Command, DiscoverHint, PreconnectOutcome};
pub use config::SchedulerConfig;
pub use error::{Retriable, ScheduleError};
pub use hints::{HintGenerator, Prediction, ResourceHint};
pub use milestones::{Milestone, MilestoneTracker};
pub use page_state::{HistoryEntry, LoadState, NavigationKind, PageState, PageStateMachine};
pub use policy::{PolicyContext, PolicyEngine, PolicySettings};
pub use preconnect::PreconnectPool;
pub use prefetch::PrefetchQueue;
pub use scheduler::{MilestoneEvent, PredictionFeed, Scheduler};
pub use snapshot::PageStateSnapshot;
pub use telemetry::{ScheduleCounters, ScheduleStats};
pub use transport::{MockTransport, OpenOptions, ReqwestTransport, Transport, TransportError, TransportErrorKind, TransportEvent};
