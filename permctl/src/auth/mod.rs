//! Authentication for the admin API.
//!
//! Identity arrives via a trusted proxy header injected by an upstream SSO
//! proxy; the [`CurrentUser`] extractor resolves it to a stored user.
//! Authorization (global vs. project admin rights) is checked in handlers.

pub mod current_user;

pub use current_user::CurrentUser;
