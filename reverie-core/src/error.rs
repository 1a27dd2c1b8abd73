//! Error types for the Reverie core library.
//!
//! Everything in here is a *structural* failure: bad world data, a planning
//! bug, or a corrupted save. Oracle uncertainty never reaches this type, it
//! is absorbed by retries and fail-safe values in `reverie-llm`.

use thiserror::Error;

use crate::types::{Coord, NodeId};

/// Top-level error type for all Reverie core operations.
#[derive(Error, Debug)]
pub enum ReverieError {
    /// An action address that the world never registered.
    #[error("Address not found in maze index: '{0}'")]
    AddressNotFound(String),

    /// A tile coordinate outside the maze bounds.
    #[error("Tile {tile:?} out of bounds (maze is {width}x{height})")]
    TileOutOfBounds {
        /// Requested (x, y).
        tile: Coord,
        /// Maze width in tiles.
        width: usize,
        /// Maze height in tiles.
        height: usize,
    },

    /// Two embedding vectors of different length were compared.
    #[error("Embedding dimension mismatch: {left} vs {right}")]
    EmbeddingDimensionMismatch {
        /// Length of the first vector.
        left: usize,
        /// Length of the second vector.
        right: usize,
    },

    /// A memory node references an embedding key with no stored vector.
    #[error("No embedding stored for key '{0}'")]
    EmbeddingMissing(String),

    /// A node id that does not exist in this memory.
    #[error("Memory node not found: {0}")]
    NodeNotFound(NodeId),

    /// The pathfinder could not connect start and end.
    #[error("No path from {start:?} to {end:?}")]
    NoPath {
        /// Start (x, y).
        start: Coord,
        /// End (x, y).
        end: Coord,
    },

    /// A persona name that is not part of the simulation.
    #[error("Unknown persona: '{0}'")]
    UnknownPersona(String),

    /// A schedule operation needed at least one block.
    #[error("Daily schedule is empty")]
    EmptySchedule,

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ReverieError>;
