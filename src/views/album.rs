use crate::{models::Show, utils::clean_text};

pub const DEFAULT_ALBUM_NAME: &str = "Epic Night";
pub const DEFAULT_INVITEES: [&str; 2] = ["Alex", "Bia"];
pub const NO_SHOWS: (&str, &str) = (
    "No shows to build an album from",
    "Add a show memory first to start a collaborative album.",
);

#[derive(Debug, PartialEq, Eq)]
pub enum InviteOutcome {
    /// Nobody is actually contacted.
    Simulated { album: String, invitees: usize },
}

/// Session-only album state, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumDraft {
    name: String,
    invitees: Vec<String>,
    selected_show: Option<String>,
}

impl AlbumDraft {
    /// `None` when there is no show to build an album from.
    pub fn new(shows: &[Show]) -> Option<Self> {
        let first = shows.first()?;
        Some(Self {
            name: DEFAULT_ALBUM_NAME.to_string(),
            invitees: DEFAULT_INVITEES.iter().map(|s| s.to_string()).collect(),
            selected_show: Some(first.id.clone()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn invitees(&self) -> &[String] {
        &self.invitees
    }

    /// Ignores blank names and names already on the list.
    pub fn invite(&mut self, name: &str) -> bool {
        let name = clean_text(name);
        if name.is_empty() || self.invitees.contains(&name) {
            return false;
        }
        self.invitees.push(name);
        true
    }

    /// Selecting an unknown id clears the selection.
    pub fn select_show(&mut self, shows: &[Show], id: &str) -> bool {
        self.selected_show = shows
            .iter()
            .find(|show| show.id == id)
            .map(|show| show.id.clone());
        self.selected_show.is_some()
    }

    pub fn selected<'a>(&self, shows: &'a [Show]) -> Option<&'a Show> {
        let id = self.selected_show.as_deref()?;
        shows.iter().find(|show| show.id == id)
    }

    pub fn send_invites(&self) -> InviteOutcome {
        tracing::info!(
            "simulated invites for album '{}' to {} friends",
            self.name,
            self.invitees.len()
        );
        InviteOutcome::Simulated {
            album: self.name.clone(),
            invitees: self.invitees.len(),
        }
    }
}
