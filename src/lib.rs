//! # AI Gateway
//!
//! One HTTP API in front of several hosted inference providers (Hugging Face
//! Inference, Google Gemini, OpenRouter). Every capability is served by an
//! ordered fallback chain of provider adapters; provider-specific payloads are
//! normalized into one result shape per capability.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐   ┌─────────────┐
//! │   HTTP   │──▶│  Capability  │──▶│    Chain     │──▶│  Adapters   │
//! │  (axum)  │   │ validate/map │   │ in-order try │   │ HF/Gem/OR   │
//! └──────────┘   └──────┬───────┘   └──────┬──────┘   └─────────────┘
//!                       │                  ▼
//!                       │            ┌──────────┐
//!                       │            │normalize │
//!                       ▼            └──────────┘
//!               ┌───────────────┐
//!               │ session memory│
//!               │ document store│
//!               └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`error`] | Provider, normalization and capability errors |
//! | [`models`] | Request enums and normalized result types |
//! | [`provider`] | HTTP clients for Hugging Face, Gemini and OpenRouter |
//! | [`orchestrator`] | `Adapter` trait and the ordered fallback `Chain` |
//! | [`normalize`] | Raw provider payloads to normalized results |
//! | [`memory`] | Per-session conversation memory |
//! | [`chunk`] | Recursive text splitting |
//! | [`extract`] | PDF, DOCX and plain text extraction |
//! | [`embedding`] | Embedder trait and cosine similarity |
//! | [`rag`] | Document store, upload and grounded answers |
//! | [`chat`] | Streaming chat with personas |
//! | [`summarize`] | Summarization |
//! | [`classify`] | Sentiment, topic and emotion classification |
//! | [`ocr`] | Text recognition from images |
//! | [`qna`] | Question answering |
//! | [`gateway`] | Wiring of all capabilities |
//! | [`server`] | HTTP router |

pub mod chat;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod memory;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod orchestrator;
pub mod provider;
pub mod qna;
pub mod rag;
pub mod server;
pub mod summarize;
