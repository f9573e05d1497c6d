//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod aptitude_question;
pub mod discussion_group;
pub mod message;
pub mod profile;
pub mod submission;

pub use aptitude_question::AptitudeQuestionEntity;
pub use discussion_group::{
    DiscussionGroupEntity, EvaluationStateDb, GroupMemberEntity, GroupStatusDb,
};
pub use message::GroupMessageEntity;
pub use profile::{LeaderboardRowEntity, PlatformStatsEntity, UserEntity};
pub use submission::GroupSubmissionEntity;
