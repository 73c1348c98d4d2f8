pub mod chat;
pub mod misc;
pub mod notebooks;
pub mod sources;
