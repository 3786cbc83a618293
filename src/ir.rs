//! Season intermediate representation.
//!
//! The parser produces a `Season` containing the entity names and the game
//! records. The compiler consumes this IR to build the rating system.

/// Index of a rated entity (team), 0-based, in `[0, N)`.
pub type EntityId = usize;

/// One head-to-head result. Indices are already converted to 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRecord {
    pub home: EntityId,
    pub away: EntityId,
    pub home_score: i64,
    pub away_score: i64,
}

impl GameRecord {
    /// Home score minus away score.
    pub fn differential(&self) -> i64 {
        self.home_score - self.away_score
    }
}

/// Names and games of one season, as read from the input files.
#[derive(Debug, Clone, Default)]
pub struct Season {
    /// Entity names; position in this list is the entity index.
    pub names: Vec<String>,
    pub games: Vec<GameRecord>,
}

impl Season {
    /// Number of entities.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
