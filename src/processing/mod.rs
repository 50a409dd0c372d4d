pub mod coordinator;
pub mod progress;
pub mod scanner;

pub use coordinator::BatchCoordinator;
pub use progress::{ChannelProgress, MaxProgress, NoProgress, Progress, ProgressSink};
pub use scanner::MediaScanner;
