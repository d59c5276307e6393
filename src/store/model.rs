//! Domain model — games, pairs and registration placement.

use serde::{Deserialize, Serialize};

/// A game holds at most this many confirmed pairs.
pub const MAX_CONFIRMED_PAIRS: usize = 3;

/// Separator between the two participant names inside a pair label.
pub const PAIR_SEPARATOR: &str = " / ";

/// Two named participants registering together as a unit.
///
/// Stored and displayed as a `"First / Second"` label. The requester is
/// always the first name; ordering is part of the pair's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pair(String);

impl Pair {
    /// Build a pair from two display names, requester first.
    pub fn new(first: &str, second: &str) -> Self {
        Self(format!(
            "{}{PAIR_SEPARATOR}{}",
            collapse_whitespace(first),
            collapse_whitespace(second)
        ))
    }

    /// Wrap an already-formatted `"First / Second"` label.
    pub fn from_label(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The display label of this pair.
    pub fn label(&self) -> &str {
        &self.0
    }

    /// The participant names making up this pair.
    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.0.split(PAIR_SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Whether two pairs are the same registration, ignoring case and
    /// whitespace differences.
    pub fn matches(&self, other: &Pair) -> bool {
        normalize_name(&self.0) == normalize_name(&other.0)
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical form of a participant name for duplicate detection:
/// trimmed, inner whitespace collapsed, case-folded.
pub fn normalize_name(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

/// Trim and collapse runs of whitespace to single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One organized match with a capacity of 3 confirmed pairs.
#[derive(Debug, Clone)]
pub struct Game {
    pub id: i64,
    pub location: String,
    pub date: String,
    pub time: String,
    pub organizer1_name: String,
    pub organizer1_user_id: i64,
    pub organizer1_username: Option<String>,
    pub organizer2_name: String,
    /// Confirmed pairs, insertion order = confirmation order. Never
    /// exceeds [`MAX_CONFIRMED_PAIRS`].
    pub pairs: Vec<Pair>,
    /// Pairs awaiting promotion, head first. Non-empty only while the
    /// confirmed list is at capacity.
    pub waiting_list: Vec<Pair>,
    pub is_closed: bool,
    /// Announcement message in the broadcast channel, set on first publish.
    pub channel_message_id: Option<i64>,
}

impl Game {
    /// Whether the confirmed list has a free slot.
    pub fn has_free_slot(&self) -> bool {
        self.pairs.len() < MAX_CONFIRMED_PAIRS
    }

    /// Normalized names of every participant across confirmed and waiting
    /// pairs.
    pub fn registered_participants(&self) -> Vec<String> {
        self.pairs
            .iter()
            .chain(self.waiting_list.iter())
            .flat_map(Pair::participants)
            .map(normalize_name)
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// Fields required to create a game. The organizer pair is pre-seeded
/// into the confirmed list at creation.
#[derive(Debug, Clone)]
pub struct NewGame {
    pub location: String,
    pub date: String,
    pub time: String,
    pub organizer1_name: String,
    pub organizer1_user_id: i64,
    pub organizer1_username: Option<String>,
    pub organizer2_name: String,
}

impl NewGame {
    /// The organizer pair seeded as the first confirmed pair.
    pub fn organizer_pair(&self) -> Pair {
        Pair::new(&self.organizer1_name, &self.organizer2_name)
    }
}

/// Where a join request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The pair occupies one of the 3 confirmed slots.
    Confirmed,
    /// The confirmed list was full; the pair was queued.
    Waiting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_label_is_requester_first() {
        let pair = Pair::new("Ann Lee", "Bob Kim");
        assert_eq!(pair.label(), "Ann Lee / Bob Kim");
    }

    #[test]
    fn pair_collapses_whitespace() {
        let pair = Pair::new("  Ann   Lee ", " Bob  Kim ");
        assert_eq!(pair.label(), "Ann Lee / Bob Kim");
    }

    #[test]
    fn pair_participants_split_on_separator() {
        let pair = Pair::new("Ann Lee", "Bob Kim");
        let names: Vec<&str> = pair.participants().collect();
        assert_eq!(names, vec!["Ann Lee", "Bob Kim"]);
    }

    #[test]
    fn pair_matches_is_case_insensitive() {
        let a = Pair::new("Ann Lee", "Bob Kim");
        let b = Pair::new("ann lee", "BOB KIM");
        assert!(a.matches(&b));
    }

    #[test]
    fn pair_matches_respects_order() {
        let a = Pair::new("Ann Lee", "Bob Kim");
        let b = Pair::new("Bob Kim", "Ann Lee");
        assert!(!a.matches(&b));
    }

    #[test]
    fn normalize_name_folds_case_and_whitespace() {
        assert_eq!(normalize_name("  Ann   LEE "), "ann lee");
    }

    #[test]
    fn registered_participants_covers_both_lists() {
        let game = Game {
            id: 1,
            location: "Court A".into(),
            date: "01.01.2026".into(),
            time: "18:00".into(),
            organizer1_name: "Ann Lee".into(),
            organizer1_user_id: 7,
            organizer1_username: None,
            organizer2_name: "Bob Kim".into(),
            pairs: vec![Pair::new("Ann Lee", "Bob Kim")],
            waiting_list: vec![Pair::new("Cid Vale", "Dee Wong")],
            is_closed: false,
            channel_message_id: None,
        };
        let names = game.registered_participants();
        assert_eq!(names, vec!["ann lee", "bob kim", "cid vale", "dee wong"]);
    }

    #[test]
    fn free_slot_up_to_capacity() {
        let mut game = Game {
            id: 1,
            location: "c".into(),
            date: "d".into(),
            time: "t".into(),
            organizer1_name: "a".into(),
            organizer1_user_id: 1,
            organizer1_username: None,
            organizer2_name: "b".into(),
            pairs: vec![Pair::new("a", "b")],
            waiting_list: vec![],
            is_closed: false,
            channel_message_id: None,
        };
        assert!(game.has_free_slot());
        game.pairs.push(Pair::new("c", "d"));
        game.pairs.push(Pair::new("e", "f"));
        assert!(!game.has_free_slot());
    }
}
