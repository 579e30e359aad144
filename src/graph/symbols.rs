//! Word symbol table (`word id` per line).

use crate::error::{LatgenError, Result};
use crate::graph::Label;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    words: HashMap<Label, String>,
    ids: HashMap<String, Label>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut table = Self::new();
        for (line_no, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let (Some(word), Some(id)) = (fields.next(), fields.next()) else {
                if line.trim().is_empty() {
                    continue;
                }
                return Err(format!("line {}: expected '<word> <id>'", line_no + 1));
            };
            if fields.next().is_some() {
                return Err(format!("line {}: trailing fields", line_no + 1));
            }
            let id: Label = id
                .parse()
                .map_err(|_| format!("line {}: invalid id '{}'", line_no + 1, id))?;
            table.insert(word, id).map_err(|e| format!("line {}: {}", line_no + 1, e))?;
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let load_err = |message: String| LatgenError::SymbolTableLoad {
            path: path.display().to_string(),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        Self::parse(&text).map_err(load_err)
    }

    /// Add a word. Ids and words must both be unique.
    pub fn insert(&mut self, word: &str, id: Label) -> std::result::Result<(), String> {
        if let Some(existing) = self.words.get(&id) {
            return Err(format!("id {} already assigned to '{}'", id, existing));
        }
        if self.ids.contains_key(word) {
            return Err(format!("word '{}' listed twice", word));
        }
        self.words.insert(id, word.to_string());
        self.ids.insert(word.to_string(), id);
        Ok(())
    }

    pub fn word(&self, id: Label) -> Option<&str> {
        self.words.get(&id).map(String::as_str)
    }

    pub fn id(&self, word: &str) -> Option<Label> {
        self.ids.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
