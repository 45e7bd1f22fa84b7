//! # askd
//!
//! A self-contained retrieval-augmented question answering daemon.
//!
//! askd answers natural-language questions, optionally grounded in
//! uploaded documents, through an interchangeable LLM backend (in-process
//! mock, local model server, or hosted inference API), while keeping
//! per-session conversation memory. Everything lives in memory; nothing
//! survives a restart.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────┐
//! │  Upload  │──▶│ Chunk + Embed │──▶│ VectorIndex │
//! └──────────┘   └───────────────┘   └──────┬──────┘
//!                                           │ top-k
//! ┌──────────┐   ┌───────────────┐   ┌──────▼──────┐   ┌─────────┐
//! │ Question │──▶│   Composer    │◀──│  Retriever  │   │ Session │
//! └──────────┘   │ prompt+invoke │──────────────────▶──│  Store  │
//!                └───────┬───────┘                     └─────────┘
//!                        ▼
//!                ┌───────────────┐
//!                │  LlmBackend   │  mock / local / remote
//!                └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! askd serve                          # start the HTTP service
//! askd chat "Qual a capital da França?"
//! askd ask "O que é machine learning?" --file exemplo.txt
//! askd health                         # probe the configured backend
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`chunk`] | Overlapping boundary-aware text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector similarity index |
//! | [`session`] | Per-session conversation memory |
//! | [`backend`] | LLM backend abstraction (mock, local, remote) |
//! | [`retrieve`] | Question-to-passages retrieval |
//! | [`compose`] | Answer composition and latency accounting |
//! | [`health`] | Backend reachability monitoring |
//! | [`service`] | Application context and entry points |
//! | [`server`] | HTTP layer |

pub mod backend;
pub mod chunk;
pub mod compose;
pub mod config;
pub mod embedding;
pub mod error;
pub mod health;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod server;
pub mod service;
pub mod session;
