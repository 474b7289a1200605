use crate::types::Topic;
use std::collections::HashSet;
use tracing::debug;

/// The topic a run will write about, and how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Shares no word with any recent post.
    Fresh(Topic),
    /// Every candidate overlapped a recent post; the first one was taken.
    Fallback(Topic),
}

impl Selection {
    pub fn topic(&self) -> &str {
        match self {
            Selection::Fresh(topic) | Selection::Fallback(topic) => topic,
        }
    }

    pub fn into_topic(self) -> Topic {
        match self {
            Selection::Fresh(topic) | Selection::Fallback(topic) => topic,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Selection::Fallback(_))
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|word| word.to_lowercase()).collect()
}

/// Two topics are similar when their lower-cased words overlap.
pub fn is_similar(a: &str, b: &str) -> bool {
    let words_a = words(a);
    words(b).iter().any(|word| words_a.contains(word))
}

/// Greedy, order-preserving choice of the next topic to write about.
#[derive(Debug, Clone)]
pub struct TopicSelector {
    stop_keywords: Vec<String>,
}

impl TopicSelector {
    pub fn new<I, S>(stop_keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stop_keywords = stop_keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Self { stop_keywords }
    }

    /// Drops candidates that contain any stop keyword.
    pub fn filter(&self, candidates: &[Topic]) -> Vec<Topic> {
        candidates
            .iter()
            .filter(|topic| {
                let lowered = topic.to_lowercase();
                !self.stop_keywords.iter().any(|keyword| lowered.contains(keyword.as_str()))
            })
            .cloned()
            .collect()
    }

    /// First filtered candidate unrelated to every recent topic, else the
    /// first filtered candidate, else nothing.
    pub fn select<R: AsRef<str>>(&self, candidates: &[Topic], recent: &[R]) -> Option<Selection> {
        let filtered = self.filter(candidates);
        debug!(
            "{} of {} candidate topics left after stop-keyword filter",
            filtered.len(),
            candidates.len()
        );

        let fresh = filtered
            .iter()
            .find(|topic| !recent.iter().any(|recent| is_similar(topic, recent.as_ref())));

        match fresh {
            Some(topic) => Some(Selection::Fresh(topic.clone())),
            None => filtered.into_iter().next().map(Selection::Fallback),
        }
    }
}

impl Default for TopicSelector {
    fn default() -> Self {
        Self::new(["news"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_is_word_overlap_ignoring_case() {
        assert!(is_similar("AI tools guide", "ai tools overview"));
        assert!(is_similar("Crypto BASICS", "basics of baking"));
        assert!(!is_similar("Crypto basics", "ai tools overview"));
        assert!(!is_similar("", "anything"));
    }

    #[test]
    fn similarity_does_not_split_on_punctuation() {
        assert!(!is_similar("AI,", "ai"));
        assert!(is_similar("AI, tools", "AI, gadgets"));
    }

    #[test]
    fn empty_stop_keywords_are_ignored() {
        let selector = TopicSelector::new(["", "  "]);
        let candidates = vec!["Anything".to_string()];
        assert_eq!(selector.filter(&candidates), candidates);
    }
}
