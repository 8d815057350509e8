//! # Pantry Match
//!
//! Finds meals you can cook from the ingredients you have on hand.
//!
//! A query (ingredients to include, ingredients to avoid) is normalized into
//! an order-independent signature and answered from a local SQLite cache when
//! possible. Otherwise the recipe provider is consulted, the candidates are
//! ranked by how few ingredients they are missing, and the result is stored
//! so the same query never hits the network twice.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ normalize  │──▶│ fingerprint │──▶│ orchestrator │──▶ render (HTML)
//! └────────────┘   └─────────────┘   └──────┬───────┘
//!                                           │
//!                   ┌───────────────────────┼──────────────────┐
//!                   ▼                       ▼                  ▼
//!             ┌──────────┐           ┌────────────┐      ┌───────────┐
//!             │  store   │           │  provider  │─────▶│  ranking  │
//!             │ (SQLite) │           │(Spoonacular│      │+translate │
//!             └──────────┘           └────────────┘      └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pantry init
//! pantry find eggs pasta tomatoes
//! pantry find carrot chicken onion --exclude potatoes
//! pantry cached list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Domain error taxonomy |
//! | [`models`] | Core data types |
//! | [`normalize`] | Ingredient key canonicalization |
//! | [`fingerprint`] | Query signatures and cache keys |
//! | [`store`] | Cache storage trait, SQLite and in-memory backends |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`provider`] | Recipe provider gateway |
//! | [`translate`] | Missing-ingredient translation |
//! | [`ranking`] | Matching, ranking, and nutrition picks |
//! | [`orchestrator`] | Cache lookup, provider retry, save |
//! | [`render`] | HTML artifact |
//! | [`find`] | `find` command |
//! | [`cached`] | `cached` commands |

pub mod cached;
pub mod config;
pub mod db;
pub mod error;
pub mod find;
pub mod fingerprint;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod provider;
pub mod ranking;
pub mod render;
pub mod store;
pub mod translate;
