//! Record store for easel: the `jobs` table and its query functions.
//!
//! All queries are runtime-checked (`sqlx::query_as` with `.bind`), so the
//! crate builds without a live database. Status transitions use optimistic
//! `WHERE render_status = $from` guards; see [`queries::jobs`].

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
