pub mod error;
pub mod insights;
pub mod job;
pub mod poller;
pub mod recovery;

// Re-export commonly used types
pub use error::{FlowError, Result};
pub use insights::{Label, SampledFrame, Shot, Track, TrackTimestamp, VideoContext, VideoInsights};
pub use job::{JobSnapshot, JobState, RemoteJob};
pub use poller::{PollPolicy, Poller};
pub use recovery::{Recoverable, Recovered, RecoverySource, recover};
