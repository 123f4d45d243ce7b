//! Matched-content and summary extraction for result display.

const FALLBACK_SNIPPET_CHARS: usize = 100;
const SUMMARY_MAX_CHARS: usize = 50;
const SUMMARY_TRUNCATED_CHARS: usize = 47;

/// The sentence with the most query words in it.
///
/// Sentences come from the prompt, plan, reasoning and outcome, in that
/// order; the earliest sentence wins a tie. When no sentence contains a
/// query word, the first 100 characters of the prompt are returned.
pub fn matched_content(query_words: &[String], sections: &[&str], prompt: &str) -> String {
    let mut best: Option<(usize, &str)> = None;

    for section in sections {
        for sentence in section.split(['.', '!', '?', '\n']) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let lower = sentence.to_lowercase();
            let hits = query_words
                .iter()
                .filter(|word| lower.contains(word.as_str()))
                .count();
            if hits > 0 && best.map_or(true, |(top, _)| hits > top) {
                best = Some((hits, sentence));
            }
        }
    }

    match best {
        Some((_, sentence)) => sentence.to_string(),
        None => prompt.chars().take(FALLBACK_SNIPPET_CHARS).collect(),
    }
}

/// Short one-line summary of a prompt.
pub fn summarize(prompt: &str) -> String {
    if prompt.chars().count() > SUMMARY_MAX_CHARS {
        let head: String = prompt.chars().take(SUMMARY_TRUNCATED_CHARS).collect();
        format!("{}...", head)
    } else {
        prompt.to_string()
    }
}
