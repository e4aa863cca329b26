// ============================================================
// Layer 4 — Raw Corpus Readers
// ============================================================
// Turns the two supported on-disk layouts into one uniform
// shape: tokenised documents plus integer label tuples.
//
//   PlainText — X.txt with one document per line, and one
//               integer-label file per hierarchy level
//               (YL1.txt, YL2.txt, Y.txt).
//
//   Tabular   — one CSV with columns l1,l2,l3,text. The label
//               columns hold arbitrary strings, so each column
//               gets dense integer ids assigned in encounter
//               order while reading.
//
// A count mismatch between documents and any label file is a
// configuration error and aborts the run.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{LabeledExample, Tokenization};

/// Uniform output of both readers.
#[derive(Debug)]
pub struct RawCorpus {
    /// Tokenised documents with their label tuples, corpus order
    /// preserved.
    pub examples: Vec<LabeledExample>,
    /// For the tabular schema: per-level `label string → id`
    /// maps, so predictions can be translated back.
    pub class_maps: Option<Vec<HashMap<String, i64>>>,
}

/// Split a line according to the chosen tokenization mode.
pub fn tokenize(line: &str, mode: Tokenization) -> Vec<String> {
    match mode {
        Tokenization::Whitespace => line.split_whitespace().map(str::to_string).collect(),
        Tokenization::Word => word_tokenize(line),
    }
}

// Whitespace split plus breaking punctuation runs out of words,
// so "cat," becomes ["cat", ","]. Apostrophes stay attached
// ("don't" is one token). Not a full linguistic tokenizer —
// that is out of scope — but stable and deterministic.
fn word_tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for chunk in line.split_whitespace() {
        let mut current = String::new();
        for ch in chunk.chars() {
            if ch.is_alphanumeric() || ch == '\'' {
                current.push(ch);
            } else {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(ch.to_string());
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
    }
    tokens
}

/// Read the plain-text directory schema.
///
/// Levels are read from `YL1.txt`, `YL2.txt`, `Y.txt` in that
/// order — `Y.txt` holds the finest level.
pub fn read_plain_text(dir: &Path, mode: Tokenization) -> Result<RawCorpus> {
    let documents = read_document_lines(&dir.join("X.txt"), mode)?;

    let mut levels: Vec<Vec<i64>> = Vec::new();
    for file in ["YL1.txt", "YL2.txt", "Y.txt"] {
        let labels = read_label_lines(&dir.join(file))?;
        ensure!(
            labels.len() == documents.len(),
            "label file '{}' has {} lines but X.txt has {} documents",
            file,
            labels.len(),
            documents.len()
        );
        levels.push(labels);
    }

    let examples = documents
        .into_iter()
        .enumerate()
        .map(|(i, tokens)| LabeledExample::new(tokens, levels.iter().map(|lv| lv[i]).collect()))
        .collect();

    Ok(RawCorpus {
        examples,
        class_maps: None,
    })
}

fn read_document_lines(path: &Path, mode: Tokenization) -> Result<Vec<Vec<String>>> {
    let file = File::open(path)
        .with_context(|| format!("cannot open corpus file '{}'", path.display()))?;
    let mut docs = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        docs.push(tokenize(line.trim(), mode));
    }
    Ok(docs)
}

fn read_label_lines(path: &Path) -> Result<Vec<i64>> {
    let file = File::open(path)
        .with_context(|| format!("cannot open label file '{}'", path.display()))?;
    let mut labels = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let value: i64 = line.trim().parse().with_context(|| {
            format!("'{}' line {}: expected an integer label", path.display(), n + 1)
        })?;
        labels.push(value);
    }
    Ok(labels)
}

#[derive(Debug, Deserialize, Serialize)]
struct TabularRow {
    l1: String,
    l2: String,
    l3: String,
    text: String,
}

/// Read the tabular CSV schema, assigning dense per-column label
/// ids on the fly (first encounter gets the next free id).
pub fn read_tabular(path: &Path, mode: Tokenization) -> Result<RawCorpus> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("cannot open tabular corpus '{}'", path.display()))?;

    let mut class_maps: Vec<HashMap<String, i64>> = vec![HashMap::new(); 3];
    let mut examples = Vec::new();

    for record in reader.deserialize() {
        let row: TabularRow = record
            .with_context(|| format!("malformed row in '{}'", path.display()))?;
        let labels = [&row.l1, &row.l2, &row.l3]
            .iter()
            .zip(class_maps.iter_mut())
            .map(|(name, map)| {
                let next = map.len() as i64;
                *map.entry((*name).clone()).or_insert(next)
            })
            .collect();
        examples.push(LabeledExample::new(tokenize(&row.text, mode), labels));
    }

    Ok(RawCorpus {
        examples,
        class_maps: Some(class_maps),
    })
}
