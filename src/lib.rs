//! # faq-router
//!
//! Answers questions from a small FAQ corpus when a semantically similar
//! question is already on file, and from a large language model otherwise.
//!
//! ## Architecture
//!
//! ```text
//!   offline                                   per question
//!   ───────                                   ────────────
//!  ┌──────────────┐                          ┌──────────────┐
//!  │  FAQ file     │                          │  User query   │
//!  └──────┬───────┘                          └──────┬───────┘
//!         │ load                                     │ trim, embed
//!         ▼                                          ▼
//!  ┌──────────────┐   embed    ┌──────────────┐   search k=1
//!  │  FAQ store    │──────────▶│ Vector index  │◀─────┘
//!  │ (JSON / PG)   │           │ snapshot / PG │
//!  └──────────────┘            └──────┬───────┘
//!                                     │ distance → similarity = 1 − d
//!                                     ▼
//!                          ┌─────────────────────┐
//!                          │ similarity ≥ thresh? │
//!                          └────┬───────────┬────┘
//!                           yes │           │ no / no match
//!                               ▼           ▼
//!                        ┌──────────┐  ┌──────────────┐
//!                        │ FAQ answer│  │ LLM completion│
//!                        └──────────┘  └──────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, storage, routing and LLM settings
//! - [`error`] - `FaqError` and provider error classification
//! - [`models`] - Shared data types: `FaqEntry`, `FaqRecord`, `IndexHit`, `Answer`, request/response types
//! - [`store`] - FAQ persistence: JSON file or PostgreSQL
//! - [`search::vector`] - In-process cosine index published by atomic swap and persisted as a snapshot
//! - [`search::postgres`] - pgvector-backed cosine index over the FAQ table
//! - [`llm::embeddings`] - Batch embedding generation via Ollama or OpenAI-compatible APIs
//! - [`llm::completion`] - Single-turn generative answers
//! - [`llm::retry`] - Bounded exponential backoff for provider calls
//! - [`router`] - Threshold routing between FAQ answers and generated ones
//! - [`ingest`] - FAQ loading and embedding jobs
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state wiring the above together

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod router;
pub mod search;
pub mod state;
pub mod store;
