//! dubmux - final-stage media synthesis for a video dubbing pipeline
//!
//! Turns a translated transcript, a dubbed audio track and a source video
//! into a speed-adjusted, music-mixed, subtitled and watermarked video by
//! driving ffmpeg, and separates vocals from accompaniment with a cached
//! external separator.

pub mod cli;
pub mod config;
pub mod error;
pub mod layout;
pub mod media;
pub mod resource;
pub mod separation;
pub mod subtitle;
pub mod synthesis;
pub mod transcript;
pub mod workflow;
