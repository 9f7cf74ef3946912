use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassTag {
    A,
    B,
    C,
    D,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub username: String,
    pub club: String,
    pub position: String,
    #[serde(rename = "class", alias = "classTag")]
    pub class_tag: ClassTag,
    #[serde(rename = "ovr", alias = "rating")]
    pub rating: i32,
    pub wage: u64,
}

impl PlayerRecord {
    pub fn new(
        username: &str,
        club: &str,
        position: &str,
        class_tag: ClassTag,
        rating: i32,
        wage: u64,
    ) -> Self {
        Self {
            username: username.to_string(),
            club: club.to_string(),
            position: position.to_string(),
            class_tag,
            rating,
            wage,
        }
    }
}

/// Immutable snapshot of the player list. Everything the UI shows is derived
/// from one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    players: Vec<PlayerRecord>,
}

impl Roster {
    /// Builds a roster, rejecting empty or duplicate usernames.
    pub fn new(players: Vec<PlayerRecord>) -> Result<Self> {
        let mut seen: HashSet<&str> = HashSet::new();
        for (idx, p) in players.iter().enumerate() {
            if p.username.trim().is_empty() {
                return Err(anyhow!("player #{} has an empty username", idx + 1));
            }
            if !seen.insert(p.username.as_str()) {
                return Err(anyhow!("duplicate username in roster: {}", p.username));
            }
        }
        Ok(Self { players })
    }

    pub fn players(&self) -> &[PlayerRecord] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, username: &str) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.username == username)
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> + '_ {
        self.players.iter().map(|p| p.username.as_str())
    }
}

/// The club roster the viewer ships with.
pub fn seed_roster() -> Roster {
    Roster {
        players: vec![
            PlayerRecord::new("deashui", "Bayern Munich", "CAM", ClassTag::A, 85, 252_000),
            PlayerRecord::new("MPS_Kante", "Bayern Munich", "ST", ClassTag::A, 86, 258_000),
            PlayerRecord::new("iLegendZico", "Bayern Munich", "CDM", ClassTag::C, 79, 217_000),
        ],
    }
}

pub fn parse_roster_json(raw: &str) -> Result<Roster> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Roster::new(Vec::new());
    }
    let players: Vec<PlayerRecord> = serde_json::from_str(trimmed).context("invalid roster json")?;
    Roster::new(players)
}

pub fn load_roster_file(path: &Path) -> Result<Roster> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading roster {}", path.display()))?;
    parse_roster_json(&raw).with_context(|| format!("failed loading roster {}", path.display()))
}

/// Loads `path` when given, otherwise falls back to the built-in roster.
pub fn load_roster(path: Option<&Path>) -> Result<Roster> {
    match path {
        Some(path) => load_roster_file(path),
        None => Ok(seed_roster()),
    }
}

pub fn class_label(class_tag: ClassTag) -> &'static str {
    match class_tag {
        ClassTag::A => "Class A",
        ClassTag::B => "Class B",
        ClassTag::C => "Class C",
        ClassTag::D => "Class D",
    }
}
