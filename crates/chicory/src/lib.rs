//! Chicory: drives third-party application windows from a reasoning
//! service's action plan.
//!
//! The reasoning service sees a window capture and answers with detections
//! and actions. This crate turns those into absolute screen points and
//! dispatches them, one at a time, to a local automation backend.

pub mod action;
pub mod artifacts;
pub mod backend;
pub mod capture;
pub mod config;
pub mod dispatcher;
pub mod display;
pub mod errors;
pub mod geometry;
pub mod health;
pub mod plan;
pub mod reasoning;
pub mod scroll;
pub mod session;
pub mod types;
mod utils;

#[cfg(test)]
mod testing;

pub use action::{normalize_key_command, Action, ActionKind, RawAction, ScrollDirection, TargetRef};
pub use artifacts::{ArtifactRun, ArtifactStore};
pub use backend::{AutomationBackend, HttpBackend, DEFAULT_BACKEND_URL};
pub use capture::{Capture, CaptureService, XcapCapture};
pub use config::EngineConfig;
pub use dispatcher::{
    ActionDispatcher, DispatchState, ExecutionReport, PlannedStep, StepOutcome, StepStatus,
};
pub use display::{DisplayProvider, FixedDisplays, XcapDisplays};
pub use errors::{AutomationError, BackendError, ErrorBody};
pub use geometry::{to_screen_point, window_center, GeometryError};
pub use health::LivenessMonitor;
pub use plan::{Plan, PlanDocument};
pub use reasoning::{HttpReasoningClient, ReasoningResponse, ReasoningService};
pub use scroll::{BackendRoundTrip, RecaptureLoop, ScrollExtractor, ScrollReport, ScrollStrategy};
pub use session::{AnalysisOutcome, Session};
pub use types::{BoundingBox, Detection, Display, Rect, ScreenPoint, WindowInfo, WindowOwner};

pub use tokio_util::sync::CancellationToken;
