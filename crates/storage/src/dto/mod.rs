pub mod common;
pub mod events;
pub mod leaderboard;
pub mod score;
