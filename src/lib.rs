//! # Analyst Harness
//!
//! A local-first query router over tabular datasets and documents.
//!
//! Free-text queries are classified by keyword scoring and sent either to the
//! tabular analyzer (CSV/XLSX aggregation, ranking, charts) or to the
//! document analyzer (chunking, embedding, flat inner-product retrieval,
//! extractive answers). Everything lives in memory for the life of the
//! process.
//!
//! ## Architecture
//!
//! ```text
//!                     ┌──────────────┐
//!   query ──────────▶ │    Router    │
//!                     └──────┬───────┘
//!                ┌───────────┴────────────┐
//!                ▼                        ▼
//!        ┌──────────────┐        ┌────────────────┐
//!        │   Tabular    │        │    Document    │
//!        │ CSV / XLSX   │        │ Chunk + Embed  │
//!        └──────────────┘        └────────────────┘
//!                ▲                        ▲
//!                └───────┬────────────────┘
//!                 ┌──────┴──────┐
//!                 │ Orchestrator│◀── CLI (analyst) / HTTP
//!                 └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! analyst profile sales.csv
//! analyst ask "what is the total Revenue in sales.csv" --file sales.csv
//! analyst search "attention" --file paper.pdf
//! analyst serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Domain error enums with stable codes |
//! | [`text`] | Cleaning, sentence splitting, tokens |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Sentence-packing chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Flat inner-product vector index |
//! | [`store`] | Ordered named stores |
//! | [`search`] | Cross-document retrieval |
//! | [`tabular`] | Dataset loading and queries |
//! | [`document`] | Document processing and Q&A |
//! | [`router`] | Query classification |
//! | [`orchestrator`] | Dispatch, intake, status |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod models;
pub mod orchestrator;
pub mod router;
pub mod search;
pub mod server;
pub mod store;
pub mod tabular;
pub mod text;
