/// Acquisition
///
/// Drives a [`FrameSource`] through the focus pipeline and hands results to
/// a [`ReportSink`]. [`FocusSession`] is strictly sequential;
/// [`PipelinedSession`] overlaps grabbing with scoring on two threads.
pub mod display;
pub mod pipeline;
pub mod queue;
pub mod report;
pub mod session;
pub mod source;

pub use display::{DisplaySink, DisplaySlot, NoDisplay};
pub use pipeline::PipelinedSession;
pub use queue::FrameQueue;
pub use report::{
    ErrorInfo, FocusReport, FrameFailure, JsonLinesReporter, ReportEvent, ReportSink, TextReporter,
};
pub use session::{
    CancelToken, FocusSession, LoopState, SessionConfig, SessionFailure, SessionSummary,
    StopReason,
};
pub use source::{FrameResult, FrameSource, SourceSettings};
