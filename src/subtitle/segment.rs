use crate::config::SegmenterConfig;
use crate::transcript::TranscriptEntry;

/// A timed subtitle unit derived from a transcript entry
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub speaker: String,
}

impl SubtitleCue {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Strategy for turning transcript entries into subtitle cues
pub trait SegmentationPolicy: Send + Sync {
    fn segment(&self, entries: &[TranscriptEntry]) -> Vec<SubtitleCue>;
}

/// Splits translations at ending punctuation and spreads each entry's
/// duration over its pieces by character count.
///
/// The timing is an approximation: every character of a translation is
/// assumed to take the same time to speak. The minimum sentence length and
/// the rule against splitting before another punctuation mark are tuned
/// for CJK text without word delimiters.
#[derive(Debug, Clone)]
pub struct PunctuationSegmenter {
    punctuation: Vec<char>,
    min_sentence_chars: usize,
}

impl PunctuationSegmenter {
    pub fn new<I: IntoIterator<Item = char>>(punctuation: I, min_sentence_chars: usize) -> Self {
        Self {
            punctuation: punctuation.into_iter().collect(),
            min_sentence_chars,
        }
    }

    pub fn from_config(config: &SegmenterConfig) -> Self {
        Self::new(config.punctuation.chars(), config.min_sentence_chars)
    }

    fn is_punctuation(&self, c: char) -> bool {
        self.punctuation.contains(&c)
    }

    fn split_entry(&self, entry: &TranscriptEntry, cues: &mut Vec<SubtitleCue>) {
        let chars: Vec<char> = entry.translation.chars().collect();
        if chars.is_empty() {
            return;
        }

        let last = chars.len() - 1;
        let per_char = entry.duration() / chars.len() as f64;
        let mut cursor = entry.start;
        let mut sentence_start = 0;

        for (i, &c) in chars.iter().enumerate() {
            let is_last = i == last;
            if !is_last {
                if !self.is_punctuation(c) {
                    continue;
                }
                if i - sentence_start < self.min_sentence_chars {
                    continue;
                }
                if self.is_punctuation(chars[i + 1]) {
                    continue;
                }
            }

            let sentence: String = chars[sentence_start..=i].iter().collect();
            let end = cursor + per_char * (i + 1 - sentence_start) as f64;

            cues.push(SubtitleCue {
                start: cursor,
                end,
                text: sentence,
                speaker: entry.speaker.clone(),
            });

            cursor = end;
            sentence_start = i + 1;
        }
    }
}

impl Default for PunctuationSegmenter {
    fn default() -> Self {
        Self::from_config(&SegmenterConfig::default())
    }
}

impl SegmentationPolicy for PunctuationSegmenter {
    fn segment(&self, entries: &[TranscriptEntry]) -> Vec<SubtitleCue> {
        let mut cues = Vec::new();
        for entry in entries {
            if entry.translation.is_empty() {
                continue;
            }
            self.split_entry(entry, &mut cues);
        }
        cues
    }
}
