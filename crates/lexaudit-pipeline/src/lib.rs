//! Pipeline Coordinator: citation spans in, ordered audit report out
//!
//! ```text
//!  spans ──► normalize ──► retrieve ──► segment ──► debate ──► verdict
//!               │             │                        │
//!               ▼             ▼                        ▼
//!          resolution     search +                verifier
//!           service     fetch (cached)             panel
//! ```
//!
//! The coordinator owns the run: a bounded worker pool processes citations
//! concurrently, every collaborator failure folds into a terminal verdict
//! for its citation alone, and the report preserves input order with
//! exactly one verdict per span. A shared single-flight cache guarantees at
//! most one fetch per instrument per run, and a shared permit budget rates
//! all outbound calls. Only infrastructure failures abort a run.

pub mod pipeline;

pub use pipeline::AuditPipeline;
