use std::collections::HashMap;

/// Bidirectional mapping between tokens and dense ids, with per-id counts.
///
/// Ids are assigned in insertion order and never change.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: Vec<String>,
    ids: HashMap<String, u32>,
    freqs: Vec<u64>,
    total: u64,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    /// Add `count` occurrences of `word`, assigning it the next id if it is new.
    pub fn add(&mut self, word: &str, count: u64) -> u32 {
        let id = match self.ids.get(word) {
            Some(&id) => id,
            None => {
                let id = self.words.len() as u32;
                self.words.push(word.to_string());
                self.ids.insert(word.to_string(), id);
                self.freqs.push(0);
                id
            }
        };
        self.freqs[id as usize] += count;
        self.total += count;
        id
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, id: u32) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    pub fn id(&self, word: &str) -> Option<u32> {
        self.ids.get(word).copied()
    }

    /// Occurrence count of `id`, or 0 for an unknown id.
    pub fn id_freq(&self, id: u32) -> u64 {
        self.freqs.get(id as usize).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total_freq(&self) -> u64 {
        self.total
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// Keep the words whose count satisfies `keep`, preserving their relative
    /// order. Returns the new dictionary and, for every old id, its new id.
    pub(crate) fn retain<F>(&self, keep: F) -> (Dictionary, Vec<Option<u32>>)
    where
        F: Fn(u64) -> bool,
    {
        let mut kept = Dictionary::new();
        let remap = self
            .words
            .iter()
            .zip(&self.freqs)
            .map(|(word, &freq)| keep(freq).then(|| kept.add(word, freq)))
            .collect();
        (kept, remap)
    }
}

#[cfg(test)]
mod tests {
    use super::Dictionary;

    #[test]
    fn ids_follow_first_appearance() {
        let mut dic = Dictionary::new();
        for w in "b a b c a b".split(' ') {
            dic.add(w, 1);
        }
        assert_eq!(dic.len(), 3);
        assert_eq!(dic.id("b"), Some(0));
        assert_eq!(dic.id("a"), Some(1));
        assert_eq!(dic.word(2), Some("c"));
        assert_eq!(dic.word(3), None);
        assert_eq!(dic.id("zzz"), None);
        assert_eq!(dic.id_freq(0), 3);
        assert_eq!(dic.id_freq(9), 0);
        assert_eq!(dic.total_freq(), 6);
    }

    #[test]
    fn retain_remaps_ids() {
        let mut dic = Dictionary::new();
        dic.add("x", 1);
        dic.add("y", 5);
        dic.add("z", 3);
        let (kept, remap) = dic.retain(|f| f >= 3);
        assert_eq!(kept.len(), 2);
        assert_eq!(remap, vec![None, Some(0), Some(1)]);
        assert_eq!(kept.word(0), Some("y"));
        assert_eq!(kept.id_freq(1), 3);
        assert_eq!(kept.total_freq(), 8);
    }
}
