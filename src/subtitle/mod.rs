// Subtitle generation
//
// - segment: splits translated transcript entries into timed cues
// - srt: renders cues to a speed-scaled SRT track

pub mod segment;
pub mod srt;

pub use segment::*;
pub use srt::*;
