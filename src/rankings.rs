use std::collections::HashSet;

use crate::roster::{PlayerRecord, Roster};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedPlayer<'a> {
    pub rank: usize,
    pub player: &'a PlayerRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClubOverview<'a> {
    pub club: String,
    pub players: Vec<&'a PlayerRecord>,
    pub wage_used: u64,
    pub wage_budget: u64,
}

impl ClubOverview<'_> {
    /// Negative when the club is over budget. Exact for any pair of `u64`s.
    pub fn wage_remaining(&self) -> i128 {
        i128::from(self.wage_budget) - i128::from(self.wage_used)
    }

    pub fn over_budget(&self) -> bool {
        self.wage_used > self.wage_budget
    }
}

/// Whole roster ordered by rating, best first. `sort_by` is stable, so players
/// with equal ratings keep their roster order.
pub fn global_ranking(roster: &Roster) -> Vec<&PlayerRecord> {
    let mut ranked: Vec<&PlayerRecord> = roster.players().iter().collect();
    ranked.sort_by(|a, b| b.rating.cmp(&a.rating));
    ranked
}

/// Global ranking restricted to one position. `rank` counts within the
/// filtered list, not the global one.
pub fn ranking_for_position<'a>(roster: &'a Roster, position: &str) -> Vec<RankedPlayer<'a>> {
    global_ranking(roster)
        .into_iter()
        .filter(|p| p.position == position)
        .enumerate()
        .map(|(idx, player)| RankedPlayer {
            rank: idx + 1,
            player,
        })
        .collect()
}

pub fn players_for_club<'a>(roster: &'a Roster, club: &str) -> Vec<&'a PlayerRecord> {
    roster.players().iter().filter(|p| p.club == club).collect()
}

pub fn wage_total(roster: &Roster, club: &str) -> u64 {
    roster
        .players()
        .iter()
        .filter(|p| p.club == club)
        .fold(0, |total: u64, p| total.saturating_add(p.wage))
}

pub fn global_rank_of(roster: &Roster, username: &str) -> Option<usize> {
    global_ranking(roster)
        .iter()
        .position(|p| p.username == username)
        .map(|idx| idx + 1)
}

pub fn club_overview<'a>(roster: &'a Roster, club: &str, wage_budget: u64) -> ClubOverview<'a> {
    let players = players_for_club(roster, club);
    let wage_used = players.iter().fold(0, |total: u64, p| total.saturating_add(p.wage));
    ClubOverview {
        club: club.to_string(),
        players,
        wage_used,
        wage_budget,
    }
}

/// Distinct clubs in first-seen roster order.
pub fn clubs(roster: &Roster) -> Vec<&str> {
    distinct(roster.players().iter().map(|p| p.club.as_str()))
}

/// Distinct positions in first-seen roster order.
pub fn positions(roster: &Roster) -> Vec<&str> {
    distinct(roster.players().iter().map(|p| p.position.as_str()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(*v)).collect()
}
