//! Grounded question answering over a private technical document corpus,
//! fused with quantitative alarm analysis.
//!
//! The pipeline: documents are chunked page-wise ([`ingest`]), embedded into
//! a persisted similarity index ([`index`]), queried and confidence-gated at
//! serving time ([`retrieval`]), and optionally fused with time-series alarm
//! summaries ([`alarms`], [`fusion`]). [`service::Copilot`] is the facade the
//! external API layer talks to. Answers are never fabricated: weak evidence
//! produces a fixed fallback instead.

pub mod alarms;
pub mod config;
pub mod errors;
pub mod fusion;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod retrieval;
pub mod service;
