//! Artifact generators.
//!
//! Each generator turns a structured request into domain artifacts by
//! invoking the content provider and normalizing its output, then repairs
//! whatever the provider left incomplete (missing identifiers, the absent
//! human participant, pre-completed action items).

pub mod meeting;
pub mod task;

pub use meeting::{GeneratedMeeting, MeetingGenerator, MeetingRequest, MeetingType};
pub use task::{Deliverable, GeneratedTask, TaskGenerator, TaskRequest, TaskResource};
