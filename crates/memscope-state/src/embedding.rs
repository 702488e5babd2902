//! Hashed term-frequency embeddings for `search`.
//!
//! Each lowercase alphanumeric token is hashed with SHA-256 into one of
//! `EMBEDDING_DIM` buckets; the bucket counts are L2-normalised so cosine
//! similarity reduces to a dot product.

use sha2::{Digest, Sha256};

use memscope_core::MemoryEntry;

pub const EMBEDDING_DIM: usize = 256;

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn bucket(token: &str) -> usize {
    let digest = Sha256::digest(token.as_bytes());
    usize::from(u16::from_be_bytes([digest[0], digest[1]])) % EMBEDDING_DIM
}

/// Embed `text`. Text without tokens yields the zero vector.
pub fn embed(text: &str) -> Vec<f64> {
    let mut vector = vec![0.0; EMBEDDING_DIM];
    for token in tokens(text) {
        vector[bucket(&token)] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Embed the searchable text of an entry: key, value and tags.
pub fn embed_entry(entry: &MemoryEntry) -> Vec<f64> {
    let mut text = String::with_capacity(entry.key.len() + entry.value.len() + 16);
    text.push_str(&entry.key);
    text.push(' ');
    text.push_str(&entry.value);
    for tag in &entry.tags {
        text.push(' ');
        text.push_str(tag);
    }
    embed(&text)
}

/// Cosine similarity of two normalised vectors. Mismatched lengths score 0.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
