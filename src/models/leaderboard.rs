// src/models/leaderboard.rs

use serde::{Deserialize, Serialize};

/// Best-attempt summary per (quiz, player) pair.
/// Invariant: `points` only increases once the entry exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: i64,
    pub quiz_id: i64,
    pub author_id: i64,
    /// Best total (base + bonus) seen across all finished attempts.
    pub points: f64,
    /// Bonus points associated with that best total.
    pub bonus: f64,
    pub attempts: i64,
}

/// Display row for a quiz leaderboard, joined with the player's username.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub username: String,
    pub points: f64,
    pub bonus: f64,
    pub attempts: i64,
}
