//! Keyword retriever over the document snapshot.
//!
//! Documents are split into passages of at most [`MAX_PASSAGE_CHARS`]
//! characters along line boundaries, breaking longer lines between words.
//! A query matches passages by keyword overlap (OR logic); passages matching
//! more distinct keywords rank first, then by total occurrences, then by
//! snapshot order.

use std::collections::HashMap;

use rocky_core::{Document, DocumentSnapshot};

const MAX_PASSAGE_CHARS: usize = 1_500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub document_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub matched_keywords: usize,
    pub occurrences: usize,
}

#[derive(Debug)]
struct IndexedPassage {
    passage: Passage,
    term_counts: HashMap<String, usize>,
}

/// In-memory passage index rebuilt from each snapshot.
#[derive(Debug, Default)]
pub struct DocumentIndex {
    passages: Vec<IndexedPassage>,
}

impl DocumentIndex {
    pub fn build(snapshot: &DocumentSnapshot) -> Self {
        let passages: Vec<IndexedPassage> = snapshot
            .indexable()
            .flat_map(split_passages)
            .map(|passage| {
                let mut term_counts = HashMap::new();
                for term in tokenize(&passage.text) {
                    *term_counts.entry(term).or_insert(0) += 1;
                }
                IndexedPassage { passage, term_counts }
            })
            .collect();

        tracing::debug!(
            documents = snapshot.indexable().count(),
            passages = passages.len(),
            "built keyword index"
        );
        Self { passages }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Best `top_k` passages sharing at least one keyword with `query`.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredPassage> {
        let mut keywords = tokenize(query);
        keywords.sort();
        keywords.dedup();
        if keywords.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredPassage> = self
            .passages
            .iter()
            .filter_map(|indexed| {
                let counts: Vec<usize> =
                    keywords.iter().filter_map(|k| indexed.term_counts.get(k).copied()).collect();
                if counts.is_empty() {
                    return None;
                }
                Some(ScoredPassage {
                    passage: indexed.passage.clone(),
                    matched_keywords: counts.len(),
                    occurrences: counts.iter().sum(),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.matched_keywords
                .cmp(&a.matched_keywords)
                .then_with(|| b.occurrences.cmp(&a.occurrences))
        });
        scored.truncate(top_k);
        scored
    }
}

/// Lowercase alphanumeric words of at least two characters.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

fn split_passages(document: &Document) -> Vec<Passage> {
    let mut passages = Vec::new();
    let mut current = String::new();

    let pieces = document.text.lines().map(str::trim).filter(|l| !l.is_empty()).flat_map(|line| {
        if line.chars().count() > MAX_PASSAGE_CHARS { split_long_line(line) } else { vec![line.to_string()] }
    });

    for piece in pieces {
        if !current.is_empty() && current.chars().count() + piece.chars().count() + 1 > MAX_PASSAGE_CHARS {
            passages.push(Passage { document_id: document.id.clone(), text: std::mem::take(&mut current) });
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&piece);
    }
    if !current.is_empty() {
        passages.push(Passage { document_id: document.id.clone(), text: current });
    }
    passages
}

/// Break a line longer than [`MAX_PASSAGE_CHARS`] on word boundaries. Single
/// words over the limit are cut on char boundaries.
fn split_long_line(line: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();

    for mut word in line.split_whitespace() {
        while word.chars().count() > MAX_PASSAGE_CHARS {
            let cut = word.char_indices().nth(MAX_PASSAGE_CHARS).map_or(word.len(), |(i, _)| i);
            if !piece.is_empty() {
                pieces.push(std::mem::take(&mut piece));
            }
            pieces.push(word[..cut].to_string());
            word = &word[cut..];
        }
        if word.is_empty() {
            continue;
        }
        if !piece.is_empty() && piece.chars().count() + word.chars().count() + 1 > MAX_PASSAGE_CHARS {
            pieces.push(std::mem::take(&mut piece));
        }
        if !piece.is_empty() {
            piece.push(' ');
        }
        piece.push_str(word);
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}
