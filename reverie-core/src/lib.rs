//! # Reverie Core Library
//!
//! Memory, world and movement for simulated personas living in a 2-D tile
//! town. Everything here is synchronous and free of language-model calls;
//! the cognition loop that drives it lives in `reverie-town`.
//!
//! - **Associative memory**: events, thoughts and chats, keyword indexed
//! - **Spatial memory**: the world → sector → arena → object tree a persona knows
//! - **Scratch**: identity, tuning, schedule and the action in progress
//! - **Retrieval**: keyword recall and recency/relevance/importance ranking
//! - **Maze**: the tile grid, its address index and per-tile events
//! - **Pathfinding**: wave-propagation shortest paths over collisions
//!
//! ## Performance Contract
//!
//! - Memory node insertion: O(keywords)
//! - Ranked retrieval: O(n log n) in events + thoughts
//! - Pathfinding: O(width × height), at most 150 wave rounds

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

pub mod clock;
pub mod config;
pub mod embedding;
pub mod error;
pub mod maze;
pub mod memory;
pub mod pathfinding;
pub mod perception;
pub mod persistence;
pub mod retrieval;
pub mod schedule;
pub mod types;

pub use config::ReverieConfig;
pub use error::{ReverieError, Result};
pub use maze::{Maze, MazeDefinition, TileEvent, TileLevel};
pub use memory::MemoryBank;
pub use schedule::{DailySchedule, ScheduleBlock};
pub use types::*;
