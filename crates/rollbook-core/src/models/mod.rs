//! Data models for the roster service.
//!
//! - `Identity`: the signed-in account
//! - `StudentRecord`: one stored student document
//! - `StudentDraft`: uncommitted form values for a new student

pub mod identity;
pub mod student;

pub use identity::Identity;
pub use student::{coerce_grade_level, DraftField, StudentDraft, StudentFields, StudentRecord};
