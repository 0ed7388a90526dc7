// Language policy table
// Every ja/en rule used by chunking, word extraction and prompting lives here as data


use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RagError;

/// Source language of a knowledge base or a speech session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ja,
    En,
}

/// How a single predicted word is pulled out of a raw completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordExtraction {
    /// Take the first whitespace-delimited token
    FirstToken,
    /// Use the whole response with trailing punctuation removed
    StripTrailingPunctuation,
}

/// Language-specific rules, one static record per [`Language`]
#[derive(Debug, PartialEq, Eq)]
pub struct LanguagePolicy {
    pub language: Language,
    /// Characters that end a sentence-like unit (newline included)
    pub sentence_terminators: &'static [char],
    /// Inserted between sentences when they are accumulated into a chunk
    pub sentence_joiner: &'static str,
    /// Interim transcripts shorter than this (in chars) are not worth predicting on
    pub min_interim_chars: usize,
    pub word_extraction: WordExtraction,
    /// Stripped from the end of a completion (and of the context's last word)
    pub trailing_punctuation: &'static [char],
    pub knowledge_label: &'static str,
    pub context_label: &'static str,
    pub history_label: &'static str,
    pub rag_system_prompt: &'static str,
    pub plain_system_prompt: &'static str,
}

const JA_POLICY: LanguagePolicy = LanguagePolicy {
    language: Language::Ja,
    sentence_terminators: &['。', '！', '？', '\n'],
    sentence_joiner: "",
    min_interim_chars: 5,
    word_extraction: WordExtraction::FirstToken,
    trailing_punctuation: &[
        '。', '、', '！', '？', '」', '』', '）', '】', '"', '\'', '.', ',', '!', '?', ')', ']',
    ],
    knowledge_label: "関連知識",
    context_label: "話者の発言",
    history_label: "これまでの会話",
    rag_system_prompt: "あなたは話者の次の一語を予測するアシスタントです。\
関連知識を参考に、話者が次に話す可能性が最も高い単語を一つだけ答えてください。\
説明や句読点は付けないでください。",
    plain_system_prompt: "あなたは話者の次の一語を予測するアシスタントです。\
会話の流れから、話者が次に話す可能性が最も高い単語を予測し、\
{\"word\": \"単語\", \"confidence\": 0.0から1.0, \"reasoning\": \"理由\"} \
のJSONのみで答えてください。",
};

const EN_POLICY: LanguagePolicy = LanguagePolicy {
    language: Language::En,
    sentence_terminators: &['.', '!', '?', '\n'],
    sentence_joiner: " ",
    min_interim_chars: 10,
    word_extraction: WordExtraction::StripTrailingPunctuation,
    trailing_punctuation: &[
        '.', ',', '!', '?', ';', ':', '"', '\'', ')', ']', '}', '>', '`',
    ],
    knowledge_label: "Relevant knowledge",
    context_label: "Speaker said",
    history_label: "Conversation so far",
    rag_system_prompt: "You predict the next word a speaker is about to say. \
Use the relevant knowledge to choose the single most likely next word. \
Answer with that one word only, without explanation or punctuation.",
    plain_system_prompt: "You predict the next word a speaker is about to say. \
From the flow of the conversation, predict the single most likely next word and answer \
only with JSON of the form {\"word\": \"word\", \"confidence\": 0.0-1.0, \"reasoning\": \"why\"}.",
};

impl Language {
    #[inline]
    pub const fn policy(self) -> &'static LanguagePolicy {
        match self {
            Self::Ja => &JA_POLICY,
            Self::En => &EN_POLICY,
        }
    }

    #[inline]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ja => "ja",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = RagError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ja" | "ja-jp" | "japanese" => Ok(Self::Ja),
            "en" | "en-us" | "en-gb" | "english" => Ok(Self::En),
            other => Err(RagError::Config(format!("Unsupported language: {}", other))),
        }
    }
}

impl LanguagePolicy {
    #[inline]
    pub fn is_terminator(&self, c: char) -> bool {
        self.sentence_terminators.contains(&c)
    }

    /// Split text into trimmed, non-empty sentence-like units, keeping each terminator
    #[inline]
    pub fn split_sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split_inclusive(|c| self.is_terminator(c))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Pull a single predicted word out of a raw completion
    #[inline]
    pub fn extract_word(&self, raw: &str) -> Option<String> {
        let word = match self.word_extraction {
            WordExtraction::FirstToken => raw.split_whitespace().next().unwrap_or_default(),
            WordExtraction::StripTrailingPunctuation => self.strip_trailing_punctuation(raw),
        };
        (!word.is_empty()).then(|| word.to_string())
    }

    #[inline]
    pub fn strip_trailing_punctuation<'a>(&self, text: &'a str) -> &'a str {
        text.trim()
            .trim_end_matches(|c| self.trailing_punctuation.contains(&c))
            .trim_end()
    }

    /// Last whitespace-delimited word of the context, punctuation removed
    #[inline]
    pub fn last_word<'a>(&self, context: &'a str) -> Option<&'a str> {
        context
            .split_whitespace()
            .last()
            .map(|w| self.strip_trailing_punctuation(w))
            .filter(|w| !w.is_empty())
    }

    #[inline]
    pub fn meets_interim_length(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.min_interim_chars
    }
}
