//! Stateless text extractors
//!
//! Each extractor is a pure function from a string to a structured value.

pub mod batch;
pub mod command;
pub mod git;
pub mod notification;
pub mod paths;
pub mod plan_status;
pub mod skill;

pub use batch::{parse_batch_announcements, BatchAnnouncement, BatchTask};
pub use command::{parse_command_tags, parse_phase_tokens, CommandInvocation, PhaseSelection};
pub use git::extract_commit_hashes;
pub use notification::{parse_task_notification, TaskNotification};
pub use paths::{extract_paths, is_file_like, is_manifest};
pub use plan_status::{parse_plan_status_command, shell_split, PlanOperation, PlanStatusCommand};
pub use skill::{parse_skill_payload, SkillPayload};
