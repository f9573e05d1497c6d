//! Repository implementations for database operations.

pub mod aptitude_question;
pub mod discussion_group;
pub mod message;
pub mod profile;
pub mod submission;

pub use aptitude_question::AptitudeQuestionRepository;
pub use discussion_group::{
    CreateGroupResult, DiscussionGroupRepository, InviteeSkip, JoinResult, LeaveResult, NewGroup,
};
pub use message::{MessageRepository, MESSAGE_NOTIFY_CHANNEL};
pub use profile::{HistoryAppend, ProfileRepository};
pub use submission::{NewSubmission, SubmissionRepository};
