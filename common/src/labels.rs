//! Ordered label set persisted next to the trained model.
//!
//! The model output is positional, so the order of the labels in the file is the contract
//! between training and inference.
use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use thiserror::Error;

/// Class names of the ASL alphabet dataset in sorted directory order.
pub const ASL_ALPHABET: [&str; 29] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S",
    "T", "U", "V", "W", "X", "Y", "Z", "del", "nothing", "space",
];

#[derive(Debug, Error)]
pub enum LabelsError {
    #[error("failed to access labels file: {0}")]
    Io(#[from] io::Error),
    #[error("labels file contains no labels")]
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self, LabelsError> {
        if labels.is_empty() {
            return Err(LabelsError::Empty);
        }
        Ok(Self { labels })
    }

    /// The fixed alphabet, used when no labels file was produced by the trainer.
    pub fn asl_alphabet() -> Self {
        Self {
            labels: ASL_ALPHABET.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Parse one label per line, skipping blank lines.
    pub fn parse(content: &str) -> Result<Self, LabelsError> {
        let labels = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        Self::new(labels)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelsError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LabelsError> {
        let mut file = fs::File::create(path)?;
        for label in self.labels.iter() {
            writeln!(file, "{label}")?;
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
