//! Keyword-based emotion hints for user messages.
//!
//! The reading feeds a short note into the system prompt and a label that is
//! stored alongside each conversation turn.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Love,
    Excitement,
    Neutral,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Love => "love",
            Emotion::Excitement => "excitement",
            Emotion::Neutral => "neutral",
        }
    }

    fn is_negative(&self) -> bool {
        matches!(
            self,
            Emotion::Sadness | Emotion::Anger | Emotion::Fear | Emotion::Disgust
        )
    }

    fn is_positive(&self) -> bool {
        matches!(
            self,
            Emotion::Joy | Emotion::Excitement | Emotion::Love | Emotion::Surprise
        )
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Intensity {
    Mild,
    Moderate,
    Strong,
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Intensity::Mild => "mild",
            Intensity::Moderate => "moderate",
            Intensity::Strong => "strong",
        })
    }
}

// Table order breaks ties between equally matched emotions.
const KEYWORDS: &[(Emotion, &[&str])] = &[
    (
        Emotion::Joy,
        &[
            "happy", "great", "wonderful", "awesome", "perfect", "amazing", "fantastic",
            "excellent", "yay", "😊", "😄", "🎉",
        ],
    ),
    (
        Emotion::Sadness,
        &[
            "sad", "unhappy", "depressed", "down", "upset", "disappointed", "miserable", "hurt",
            "cry", "crying", "lonely", "😢", "😞", "💔",
        ],
    ),
    (
        Emotion::Anger,
        &[
            "angry", "mad", "furious", "annoyed", "frustrated", "irritated", "pissed", "rage",
            "hate", "😠", "😡", "🤬",
        ],
    ),
    (
        Emotion::Fear,
        &[
            "scared", "afraid", "worried", "anxious", "nervous", "terrified", "frightened",
            "panic", "stress", "stressed", "😰", "😨",
        ],
    ),
    (
        Emotion::Surprise,
        &[
            "surprising", "surprised", "shocked", "amazed", "unexpected", "wow", "omg",
            "incredible", "unbelievable", "😲", "😮",
        ],
    ),
    (
        Emotion::Disgust,
        &[
            "disgusting", "gross", "awful", "terrible", "horrible", "nasty", "revolting", "🤢",
            "🤮",
        ],
    ),
    (
        Emotion::Love,
        &[
            "love", "adore", "cherish", "affection", "care", "appreciate", "grateful", "thankful",
            "blessed", "❤️", "💕", "🥰",
        ],
    ),
    (
        Emotion::Excitement,
        &[
            "excited", "thrilled", "eager", "pumped", "hyped", "enthusiastic", "can't wait",
            "🔥", "⚡", "🎊",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmotionReading {
    pub emotion: Emotion,
    pub intensity: Intensity,
}

impl EmotionReading {
    pub fn should_show_empathy(&self) -> bool {
        self.emotion.is_negative() && self.intensity >= Intensity::Moderate
    }

    pub fn should_celebrate(&self) -> bool {
        self.emotion.is_positive() && self.intensity >= Intensity::Moderate
    }

    /// Guidance for the system prompt; `None` for neutral messages.
    pub fn context_note(&self) -> Option<String> {
        let (emotion, intensity) = (self.emotion, self.intensity);
        if emotion == Emotion::Neutral {
            None
        } else if self.should_show_empathy() {
            Some(format!(
                "The user seems to be feeling {emotion} ({intensity} intensity). Show empathy and support."
            ))
        } else if self.should_celebrate() {
            Some(format!(
                "The user is feeling {emotion} ({intensity} intensity). Share their excitement!"
            ))
        } else {
            Some(format!("The user's emotional state: {emotion} ({intensity})."))
        }
    }
}

fn keyword_matches(lower: &str, words: &[&str], keyword: &str) -> bool {
    // Plain words match whole tokens so "care" does not fire on "scared".
    if keyword.chars().all(|c| c.is_ascii_alphabetic()) {
        words.contains(&keyword)
    } else {
        lower.contains(keyword)
    }
}

pub fn analyze(text: &str) -> EmotionReading {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();

    let mut best: Option<(Emotion, usize)> = None;
    for (emotion, keywords) in KEYWORDS {
        let matches = keywords
            .iter()
            .filter(|k| keyword_matches(&lower, &words, k))
            .count();
        if matches > 0 && best.is_none_or(|(_, n)| matches > n) {
            best = Some((*emotion, matches));
        }
    }

    let Some((emotion, matches)) = best else {
        return EmotionReading {
            emotion: Emotion::Neutral,
            intensity: Intensity::Mild,
        };
    };

    let exclamations = text.chars().filter(|c| *c == '!').count().min(3);
    let intensity = match matches * 2 + exclamations {
        0..=1 => Intensity::Mild,
        2..=3 => Intensity::Moderate,
        _ => Intensity::Strong,
    };

    EmotionReading { emotion, intensity }
}
