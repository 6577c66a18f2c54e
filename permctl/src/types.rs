//! Strongly-typed identifiers shared across the crate.

use uuid::Uuid;

pub type UserId = Uuid;
pub type GroupId = Uuid;
pub type ComponentId = Uuid;
