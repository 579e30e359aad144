//! Transition-id table: the graph's input labels mapped to pdfs and phones.

use serde::{Deserialize, Serialize};

/// What one transition id stands for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransitionEntry {
    pub pdf: usize,
    pub phone: u32,
}

/// Maps 1-based transition ids to their pdf and phone.
///
/// Id 0 is reserved for epsilon in the decode graph and has no entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct TransitionModel {
    entries: Vec<TransitionEntry>,
}

impl TransitionModel {
    pub fn new(entries: Vec<TransitionEntry>) -> Self {
        Self { entries }
    }

    /// Number of transition ids (the largest valid id).
    pub fn num_transition_ids(&self) -> usize {
        self.entries.len()
    }

    fn entry(&self, transition_id: u32) -> Option<&TransitionEntry> {
        (transition_id as usize)
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
    }

    pub fn pdf(&self, transition_id: u32) -> Option<usize> {
        self.entry(transition_id).map(|e| e.pdf)
    }

    pub fn phone(&self, transition_id: u32) -> Option<u32> {
        self.entry(transition_id).map(|e| e.phone)
    }

    /// Largest pdf id referenced, if any.
    pub fn max_pdf(&self) -> Option<usize> {
        self.entries.iter().map(|e| e.pdf).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> TransitionModel {
        TransitionModel::new(vec![
            TransitionEntry { pdf: 0, phone: 1 },
            TransitionEntry { pdf: 2, phone: 7 },
        ])
    }

    #[test]
    fn ids_are_one_based() {
        let tm = model();
        assert_eq!(tm.pdf(0), None);
        assert_eq!(tm.pdf(1), Some(0));
        assert_eq!(tm.pdf(2), Some(2));
        assert_eq!(tm.phone(2), Some(7));
        assert_eq!(tm.pdf(3), None);
        assert_eq!(tm.num_transition_ids(), 2);
        assert_eq!(tm.max_pdf(), Some(2));
    }

    #[test]
    fn deserializes_from_plain_list() {
        let tm: TransitionModel =
            serde_json::from_str(r#"[{"pdf": 0, "phone": 1}, {"pdf": 2, "phone": 7}]"#).unwrap();
        assert_eq!(tm, model());
    }
}
