pub mod auction;
pub mod gateway;
pub mod stats;
pub mod workflow;

pub use auction::{evaluate_bids, AuctionEngine};
pub use gateway::{BidSource, BidderGateway};
pub use stats::{BidMetrics, PlatformSnapshot, PlatformStats};
pub use workflow::{
    DisplayOutcome, DisplayType, FeedbackReport, RevenueSplit, StepOutcome, StepStatus,
    UserContext, VisitData, WorkflowOrchestrator, WorkflowRun, WorkflowStatsSnapshot,
    WorkflowStatus, WorkflowSteps,
};
