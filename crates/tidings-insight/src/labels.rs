//! Class-based TF-IDF cluster labels.
//!
//! Each cluster is treated as one large document. A term's weight in a
//! cluster is its frequency there scaled by `ln(1 + A / f)`, where `A` is the
//! average token count per cluster and `f` the term's frequency across all
//! clusters. Terms frequent in one cluster and rare elsewhere rank highest.

use std::collections::HashMap;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "however", "if", "in", "into", "is", "it", "its",
    "itself", "just", "last", "like", "may", "me", "might", "more", "most", "much", "must", "my",
    "myself", "new", "no", "nor", "not", "now", "of", "off", "on", "once", "one", "only", "or",
    "other", "our", "ours", "ourselves", "out", "over", "own", "said", "same", "says", "she",
    "should", "since", "so", "some", "still", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "two", "under", "until", "up", "us", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "year", "years",
    "you", "your", "yours", "yourself", "yourselves",
];

/// Lowercased word tokens of `text`, without stop words, single characters
/// or bare numbers.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
}

/// Ranks label terms per cluster with class-based TF-IDF.
#[derive(Debug, Clone)]
pub struct ClassTfIdf {
    label_words: usize,
}

impl ClassTfIdf {
    pub fn new(label_words: usize) -> Self {
        Self {
            label_words: label_words.max(1),
        }
    }

    /// Compute labels for every class. `classes[i]` holds the texts of the
    /// documents in class `i`; the result lines up with `classes`.
    pub fn labels<S: AsRef<str>>(&self, classes: &[Vec<S>]) -> Vec<Vec<String>> {
        let class_counts: Vec<HashMap<String, usize>> = classes
            .iter()
            .map(|docs| {
                let mut counts = HashMap::new();
                for doc in docs {
                    for token in tokenize(doc.as_ref()) {
                        *counts.entry(token).or_insert(0) += 1;
                    }
                }
                counts
            })
            .collect();

        let mut corpus_freq: HashMap<&str, usize> = HashMap::new();
        let mut total_tokens = 0usize;
        for counts in &class_counts {
            for (term, count) in counts {
                *corpus_freq.entry(term.as_str()).or_insert(0) += count;
                total_tokens += count;
            }
        }
        let avg_tokens = if class_counts.is_empty() {
            0.0
        } else {
            total_tokens as f64 / class_counts.len() as f64
        };

        class_counts
            .iter()
            .map(|counts| {
                let mut weighted: Vec<(&str, f64)> = counts
                    .iter()
                    .map(|(term, &tf)| {
                        let freq = corpus_freq.get(term.as_str()).copied().unwrap_or(1) as f64;
                        (term.as_str(), tf as f64 * (1.0 + avg_tokens / freq).ln())
                    })
                    .collect();
                weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                weighted
                    .into_iter()
                    .take(self.label_words)
                    .map(|(term, _)| term.to_string())
                    .collect()
            })
            .collect()
    }
}
