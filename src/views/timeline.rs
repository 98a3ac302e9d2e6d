use crate::models::Show;

/// What the timeline renders. An empty vault and a search with no hits are
/// different states with different messages.
#[derive(Debug, PartialEq)]
pub enum TimelineState<'a> {
    EmptyVault,
    NoMatches,
    Entries(Vec<&'a Show>),
}

impl TimelineState<'_> {
    pub fn message(&self) -> Option<(&'static str, &'static str)> {
        match self {
            TimelineState::EmptyVault => Some((
                "Your vault is empty",
                "Use `add` to start saving your show memories!",
            )),
            TimelineState::NoMatches => Some((
                "No results found",
                "Try adjusting your search terms.",
            )),
            TimelineState::Entries(_) => None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Timeline {
    search: String,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
        }
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn project<'a>(&self, shows: &'a [Show]) -> TimelineState<'a> {
        if shows.is_empty() {
            return TimelineState::EmptyVault;
        }

        let sorted = newest_first(shows);
        let term = self.search.trim().to_lowercase();
        if term.is_empty() {
            return TimelineState::Entries(sorted);
        }

        let hits: Vec<&Show> = sorted
            .into_iter()
            .filter(|show| matches(show, &term))
            .collect();
        if hits.is_empty() {
            TimelineState::NoMatches
        } else {
            TimelineState::Entries(hits)
        }
    }
}

/// Stable: shows on the same date keep their insertion order.
pub fn newest_first(shows: &[Show]) -> Vec<&Show> {
    let mut sorted: Vec<&Show> = shows.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted
}

fn matches(show: &Show, term: &str) -> bool {
    show.artist.to_lowercase().contains(term)
        || show.location.to_lowercase().contains(term)
        || show.display_date().to_lowercase().contains(term)
}
