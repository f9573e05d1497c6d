//! Domain models for Placement Prep.

pub mod aptitude;
pub mod difficulty;
pub mod discussion_group;
pub mod generation;
pub mod leaderboard;
pub mod message;
pub mod profile;
pub mod submission;

pub use aptitude::AptitudeQuestion;
pub use difficulty::Difficulty;
pub use discussion_group::{DiscussionGroup, EvaluationState, GroupMember, GroupStatus};
pub use generation::{GeneratedTopic, QuizItem};
pub use leaderboard::{LeaderboardEntry, PlatformStats};
pub use message::GroupMessage;
pub use profile::{HistoryItem, HistoryKind, ProfileEvent, UserProfile, UserStats};
pub use submission::{Evaluation, GroupSubmission, Participation};
