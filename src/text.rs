//! Small text utilities shared by the pipeline stages.

/// Split text into sentences, keeping the terminating punctuation with
/// each sentence.
///
/// Splits on `.`, `!` and `?`. A trailing fragment without terminal
/// punctuation is kept as its own entry. Whitespace around each sentence
/// is trimmed, so joining the results with single spaces reconstructs
/// the original text up to inter-sentence whitespace.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() && trimmed.chars().any(|c| c.is_alphanumeric()) {
                sentences.push(trimmed.to_owned());
            }
            current.clear();
        }
    }

    let trailing = current.trim();
    if !trailing.is_empty() {
        sentences.push(trailing.to_owned());
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = split_sentences("Hello! How are you? Fine.");
        assert_eq!(sentences, vec!["Hello!", "How are you?", "Fine."]);
    }

    #[test]
    fn concatenation_reconstructs_trimmed_text() {
        let original = "Hello! How are you? Fine.";
        let joined = split_sentences(original).join(" ");
        assert_eq!(joined, original);
    }

    #[test]
    fn keeps_trailing_fragment() {
        let sentences = split_sentences("First one. and then some");
        assert_eq!(sentences, vec!["First one.", "and then some"]);
    }

    #[test]
    fn empty_and_punctuation_only_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("...").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn single_sentence_without_punctuation() {
        assert_eq!(split_sentences("just words"), vec!["just words"]);
    }
}
