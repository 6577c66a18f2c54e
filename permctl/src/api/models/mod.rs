pub mod pagination;
pub mod permissions;
