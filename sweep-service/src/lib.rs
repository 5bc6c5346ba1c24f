pub mod engine;
pub mod scheduler;
pub mod stickied;
pub mod stream;
pub mod title;

#[cfg(test)]
mod tests;

pub use engine::{RemovalSweepEngine, SweepTarget, TickReport};
pub use scheduler::Scheduler;
pub use stickied::{
    compose_reply, process_crosspost, quote_comment, submission_id_from_url, ReplyOutcome,
    StickiedReplyWatcher,
};
pub use stream::{StreamEvent, SubmissionStream};
pub use title::format_title;
