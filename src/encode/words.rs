use crate::core::model::Word;
use crate::core::vocabulary::Vocabulary;

/// Binary presence vector: slot `i` is 1 when `vocabulary[i]` occurs in `words`.
pub fn encode_words(words: &[Word], vocabulary: &Vocabulary) -> Vec<f64> {
    let mut presence = vec![0.0; vocabulary.len()];
    for word in words {
        if let Some(index) = vocabulary.index_of(&word.text) {
            presence[index] = 1.0;
        }
    }
    presence
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vocabulary(words: &[&str]) -> Vocabulary {
        Vocabulary::new(words.iter().map(|w| w.to_string()).collect()).unwrap()
    }

    #[test]
    fn marks_present_words() {
        let words = [Word::new("total", 0, 10, 0, 10)];
        let encoded = encode_words(&words, &vocabulary(&["total", "invoice"]));
        assert_eq!(encoded, vec![1.0, 0.0]);
    }

    #[test]
    fn repeats_do_not_accumulate() {
        let words = [
            Word::new("invoice", 0, 10, 0, 10),
            Word::new("invoice", 20, 30, 0, 10),
            Word::new("Invoice", 40, 50, 0, 10),
        ];
        let encoded = encode_words(&words, &vocabulary(&["total", "invoice"]));
        assert_eq!(encoded, vec![0.0, 1.0]);
    }

    #[test]
    fn length_follows_vocabulary() {
        let words = [Word::new("x", 0, 1, 0, 1), Word::new("b", 0, 1, 0, 1)];
        for entries in [&[][..], &["a"][..], &["a", "b", "c", "d"][..]] {
            let encoded = encode_words(&words, &vocabulary(entries));
            assert_eq!(encoded.len(), entries.len());
            assert!(encoded.iter().all(|&v| v == 0.0 || v == 1.0));
        }
    }
}
