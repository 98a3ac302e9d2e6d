use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{models::Show, store::ShowStore};

#[derive(Debug, PartialEq)]
pub enum MemoryState<'a> {
    /// Nothing in the vault to remember.
    Empty,
    Showing(&'a Show),
}

impl MemoryState<'_> {
    pub fn message(&self) -> Option<(&'static str, &'static str)> {
        match self {
            MemoryState::Empty => Some((
                "No memories yet",
                "Add a few shows to your vault to see random memories here.",
            )),
            MemoryState::Showing(_) => None,
        }
    }
}

/// Picks a uniformly random show, again whenever the store changes or the
/// user asks for another one. Repeats are allowed.
pub struct RandomMemory<R = StdRng> {
    rng: R,
    selected: Option<usize>,
    seen_revision: Option<u64>,
}

impl RandomMemory<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for RandomMemory<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RandomMemory<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            selected: None,
            seen_revision: None,
        }
    }

    pub fn current<'a>(&mut self, store: &'a ShowStore) -> MemoryState<'a> {
        if self.seen_revision != Some(store.revision()) {
            self.seen_revision = Some(store.revision());
            self.pick(store.len());
        }
        self.state(store)
    }

    /// "Show another memory".
    pub fn shuffle<'a>(&mut self, store: &'a ShowStore) -> MemoryState<'a> {
        self.seen_revision = Some(store.revision());
        self.pick(store.len());
        self.state(store)
    }

    fn pick(&mut self, len: usize) {
        self.selected = (len > 0).then(|| self.rng.gen_range(0..len));
    }

    fn state<'a>(&self, store: &'a ShowStore) -> MemoryState<'a> {
        match self.selected.and_then(|index| store.shows().get(index)) {
            Some(show) => MemoryState::Showing(show),
            None => MemoryState::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Vibe;
    use crate::store::MemorySlot;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn seeded() -> RandomMemory<StdRng> {
        RandomMemory::with_rng(StdRng::seed_from_u64(7))
    }

    fn show(id: &str) -> Show {
        Show {
            id: id.to_string(),
            artist: id.to_uppercase(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            location: "Venue".to_string(),
            vibe: Vibe::Intimate,
            media: Vec::new(),
        }
    }

    #[test]
    fn empty_store_never_selects() {
        let store = ShowStore::load(Box::new(MemorySlot::default()));
        let mut memory = seeded();
        assert_eq!(memory.current(&store), MemoryState::Empty);
        assert_eq!(memory.shuffle(&store), MemoryState::Empty);
        assert!(memory.current(&store).message().is_some());
    }

    #[test]
    fn always_returns_a_member_of_the_store() {
        let mut store = ShowStore::load(Box::new(MemorySlot::default()));
        for id in ["a", "b", "c", "d"] {
            let _ = store.append(show(id));
        }
        let ids: HashSet<_> = store.shows().iter().map(|s| s.id.clone()).collect();

        let mut memory = seeded();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            match memory.shuffle(&store) {
                MemoryState::Showing(picked) => {
                    assert!(ids.contains(&picked.id));
                    seen.insert(picked.id.clone());
                }
                MemoryState::Empty => panic!("non-empty store must yield a show"),
            }
        }
        assert_eq!(seen, ids);
    }

    #[test]
    fn selection_is_stable_until_the_store_changes() {
        let mut store = ShowStore::load(Box::new(MemorySlot::default()));
        let _ = store.append(show("only"));
        let mut memory = seeded();

        let first = match memory.current(&store) {
            MemoryState::Showing(show) => show.id.clone(),
            MemoryState::Empty => panic!("expected a show"),
        };
        for _ in 0..5 {
            assert_eq!(memory.current(&store), MemoryState::Showing(&store.shows()[0]));
        }
        assert_eq!(first, "only");

        let _ = store.append(show("second"));
        assert!(matches!(memory.current(&store), MemoryState::Showing(_)));
    }
}
