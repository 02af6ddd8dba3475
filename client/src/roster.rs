//! Participants of a session and their fixed ordinal indices

use crate::config::Participant;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub user_id: UserId,
    pub display_name: String,
    pub ordinal: usize,
}

/// Known participants, frozen for the lifetime of a session.
///
/// Ordinals come from sorting user ids, so the same set of participants
/// always yields the same ordinals no matter the order it was supplied in.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new(local_user: &str, participants: &[Participant]) -> Self {
        let mut pairs: Vec<(UserId, String)> = participants
            .iter()
            .map(|p| (p.user_id.clone(), p.display_name.clone()))
            .collect();

        if !pairs.iter().any(|(id, _)| id == local_user) {
            pairs.push((local_user.to_string(), local_user.to_string()));
        }

        // Stable sort keeps the first display name supplied for a duplicate id.
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.dedup_by(|later, earlier| later.0 == earlier.0);

        let entries = pairs
            .into_iter()
            .enumerate()
            .map(|(ordinal, (user_id, display_name))| RosterEntry {
                user_id,
                display_name,
                ordinal,
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn get(&self, user_id: &str) -> Option<&RosterEntry> {
        self.entries
            .binary_search_by(|entry| entry.user_id.as_str().cmp(user_id))
            .ok()
            .map(|index| &self.entries[index])
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.get(user_id).is_some()
    }

    pub fn ordinal(&self, user_id: &str) -> Option<usize> {
        self.get(user_id).map(|entry| entry.ordinal)
    }

    /// Falls back to the raw id for users outside the roster.
    pub fn display_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.get(user_id)
            .map(|entry| entry.display_name.as_str())
            .unwrap_or(user_id)
    }

    pub fn opponents_of<'a, 'b>(&'a self, local_user: &'b str) -> impl Iterator<Item = &'a RosterEntry> + use<'a, 'b> {
        self.entries
            .iter()
            .filter(move |entry| entry.user_id != local_user)
    }

    /// Uniform pick among everyone but `local_user`.
    pub fn random_opponent<R: Rng + ?Sized>(&self, local_user: &str, rng: &mut R) -> Option<&UserId> {
        let opponents: Vec<&RosterEntry> = self.opponents_of(local_user).collect();
        opponents.choose(rng).copied().map(|entry| &entry.user_id)
    }
}
