//! Terminal client for the animal dex.
//!
//! The dex is a catalog of species that a player unlocks by photographing
//! them. The backend owns all data; this crate keeps a local, derived view of
//! it:
//!
//! - [`session`] restores and persists who is logged in,
//! - [`api`] talks to the REST backend with the session's bearer token,
//! - [`dex`] joins the catalog with the player's unlock ledger, computes
//!   completion statistics and filters the result,
//! - [`tasks`] runs network calls in the background for the TUI.

pub mod admin;
pub mod api;
pub mod config;
pub mod dex;
pub mod export;
pub mod logging;
pub mod models;
pub mod session;
pub mod tasks;
