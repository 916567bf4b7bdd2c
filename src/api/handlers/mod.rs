//! API handlers.
//!
//! `auth` carries the credential, token, and session machinery; `roles` and
//! `crm` build on its guards; `me` covers account self-service.

pub mod auth;
pub mod crm;
pub mod health;
pub mod me;
pub mod roles;
pub mod root;
