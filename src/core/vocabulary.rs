use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};

/// Ordered list of unique words; a word's position is its feature index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    words: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new(words: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(words.len());
        for (position, word) in words.iter().enumerate() {
            if index.insert(word.clone(), position).is_some() {
                return Err(RoutingError::Format(format!(
                    "duplicate vocabulary entry '{word}'"
                )));
            }
        }
        Ok(Self { words, index })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Exact, case-sensitive lookup.
    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words
    }
}

impl Eq for Vocabulary {}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = RoutingError;

    fn try_from(words: Vec<String>) -> Result<Self> {
        Self::new(words)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.words
    }
}

/// Vocabulary selection policy used when training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VocabularyPolicy {
    /// Most frequent words per layout, unioned and sorted.
    #[default]
    LayoutAware,
    /// Most frequent words over the whole corpus.
    LayoutAgnostic,
}

/// The `size` most frequent words over all documents.
///
/// Every occurrence counts once. Words with equal counts keep the order in
/// which they were first seen while scanning the corpus.
pub fn build_global_vocabulary<D, W>(documents: &[D], size: usize) -> Vocabulary
where
    D: AsRef<[W]>,
    W: AsRef<str>,
{
    let mut counter = FrequencyCounter::default();
    for document in documents {
        counter.extend(document.as_ref());
    }
    let words = counter.most_common(size);
    tracing::debug!(words = words.len(), size, "built global vocabulary");
    Vocabulary::from_unique(words)
}

/// Per-layout most frequent words, unioned and sorted lexicographically.
///
/// Each distinct label contributes its `ceil(size / labels) + 1` most
/// frequent words, so the result is close to, but not exactly, `size`.
pub fn build_balanced_vocabulary<D, W, L>(
    documents: &[D],
    size: usize,
    labels: &[L],
) -> Result<Vocabulary>
where
    D: AsRef<[W]>,
    W: AsRef<str>,
    L: AsRef<str>,
{
    if documents.len() != labels.len() {
        return Err(RoutingError::InvalidInput(format!(
            "{} documents but {} labels",
            documents.len(),
            labels.len()
        )));
    }

    let mut per_label: Vec<(&str, FrequencyCounter)> = Vec::new();
    for (document, label) in documents.iter().zip(labels) {
        let label = label.as_ref();
        let position = match per_label.iter().position(|(l, _)| *l == label) {
            Some(position) => position,
            None => {
                per_label.push((label, FrequencyCounter::default()));
                per_label.len() - 1
            }
        };
        per_label[position].1.extend(document.as_ref());
    }

    if per_label.is_empty() {
        return Ok(Vocabulary::default());
    }

    let words_per_label = size.div_ceil(per_label.len()) + 1;
    let mut words: Vec<String> = per_label
        .into_iter()
        .flat_map(|(_, counter)| counter.most_common(words_per_label))
        .collect();
    words.sort();
    words.dedup();

    tracing::debug!(words = words.len(), size, words_per_label, "built balanced vocabulary");
    Ok(Vocabulary::from_unique(words))
}

impl Vocabulary {
    fn from_unique(words: Vec<String>) -> Self {
        let index = words
            .iter()
            .enumerate()
            .map(|(position, word)| (word.clone(), position))
            .collect();
        Self { words, index }
    }
}

#[derive(Debug, Default)]
struct FrequencyCounter {
    slots: HashMap<String, usize>,
    counts: Vec<(String, usize)>,
}

impl FrequencyCounter {
    fn extend<W: AsRef<str>>(&mut self, words: &[W]) {
        for word in words {
            let word = word.as_ref();
            match self.slots.get(word) {
                Some(&slot) => self.counts[slot].1 += 1,
                None => {
                    self.slots.insert(word.to_string(), self.counts.len());
                    self.counts.push((word.to_string(), 1));
                }
            }
        }
    }

    fn most_common(self, n: usize) -> Vec<String> {
        let mut counts = self.counts;
        // stable sort keeps first-seen order among equal counts
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.into_iter().take(n).map(|(word, _)| word).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Word;
    use pretty_assertions::assert_eq;

    fn words(vocabulary: &Vocabulary) -> Vec<&str> {
        vocabulary.words().iter().map(String::as_str).collect()
    }

    #[test]
    fn global_vocabulary_breaks_ties_by_first_occurrence() {
        let corpus = vec![vec!["a", "a", "b"], vec!["a", "c"]];
        let vocabulary = build_global_vocabulary(&corpus, 2);
        assert_eq!(words(&vocabulary), vec!["a", "b"]);
    }

    #[test]
    fn global_vocabulary_may_be_shorter_than_requested() {
        let corpus = vec![vec!["x", "y"], vec!["y"]];
        let vocabulary = build_global_vocabulary(&corpus, 10);
        assert_eq!(words(&vocabulary), vec!["y", "x"]);
    }

    #[test]
    fn global_vocabulary_accepts_ocr_words() {
        let corpus = vec![vec![
            Word::new("Invoice", 0, 10, 0, 5),
            Word::new("Total", 0, 10, 10, 15),
            Word::new("Total", 0, 10, 20, 25),
        ]];
        let vocabulary = build_global_vocabulary(&corpus, 1);
        assert_eq!(words(&vocabulary), vec!["Total"]);
    }

    #[test]
    fn empty_corpus_gives_empty_vocabulary() {
        let corpus: Vec<Vec<&str>> = Vec::new();
        assert!(build_global_vocabulary(&corpus, 5).is_empty());
        let labels: Vec<&str> = Vec::new();
        assert!(build_balanced_vocabulary(&corpus, 5, &labels)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn balanced_vocabulary_takes_words_from_every_label() {
        let corpus = vec![
            vec!["invoice", "total", "total", "vat"],
            vec!["invoice", "total", "iban"],
            vec!["receipt", "cash", "cash", "change", "thanks"],
        ];
        let labels = ["invoice", "invoice", "receipt"];
        // ceil(2 / 2) + 1 = 2 words per label
        let vocabulary = build_balanced_vocabulary(&corpus, 2, &labels).unwrap();
        assert_eq!(words(&vocabulary), vec!["cash", "invoice", "receipt", "total"]);
    }

    #[test]
    fn balanced_vocabulary_deduplicates_shared_words() {
        let corpus = vec![vec!["date", "a"], vec!["date", "b"]];
        let vocabulary = build_balanced_vocabulary(&corpus, 2, &["x", "y"]).unwrap();
        assert_eq!(words(&vocabulary), vec!["a", "b", "date"]);
    }

    #[test]
    fn balanced_vocabulary_rejects_label_mismatch() {
        let corpus = vec![vec!["a"], vec!["b"]];
        let result = build_balanced_vocabulary(&corpus, 2, &["x"]);
        assert!(matches!(result, Err(RoutingError::InvalidInput(_))));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let vocabulary = Vocabulary::new(vec!["Total".into(), "invoice".into()]).unwrap();
        assert_eq!(vocabulary.index_of("invoice"), Some(1));
        assert_eq!(vocabulary.index_of("total"), None);
    }

    #[test]
    fn rejects_duplicate_entries() {
        let result = Vocabulary::new(vec!["a".into(), "a".into()]);
        assert!(matches!(result, Err(RoutingError::Format(_))));
    }
}
