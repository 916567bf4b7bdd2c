//! CRM resource endpoints.
//!
//! Each resource follows the same CRUD shape behind bearer auth. Deletion is
//! open except for tickets (permission grant) and leads (owner or admin).

pub(crate) mod customers;
pub(crate) mod dashboard;
pub(crate) mod invoices;
pub(crate) mod leads;
pub(crate) mod meetings;
pub(crate) mod projects;
pub(crate) mod quotations;
pub(crate) mod tasks;
pub(crate) mod tickets;
