//! Tax liability, document page triage and multi-year return summaries.

pub mod core;
