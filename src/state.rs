use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::rankings;
use crate::roster::{PlayerRecord, Roster};

pub const CARD_COLUMNS: usize = 3;

/// Screen cell a popup hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Anchor {
    pub x: u16,
    pub y: u16,
}

/// The single overlay on top of the card grid. Opening one replaces whatever
/// was open before.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    None,
    ClubView(String),
    PositionView(String),
    PlayerPopup {
        username: String,
        anchor: Anchor,
    },
}

/// Club or position label that can be clicked to switch context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextLink {
    Club,
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarStatus {
    Pending,
    Resolved,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub roster: Arc<Roster>,
    pub wage_budget: u64,
    pub fallback_url: String,
    pub avatars: HashMap<String, String>,
    pub avatars_done: bool,
    pub selected: usize,
    pub overlay: Overlay,
    pub overlay_scroll: u16,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl AppState {
    pub fn new(roster: Arc<Roster>, wage_budget: u64, fallback_url: &str) -> Self {
        Self {
            roster,
            wage_budget,
            fallback_url: fallback_url.to_string(),
            avatars: HashMap::new(),
            avatars_done: false,
            selected: 0,
            overlay: Overlay::None,
            overlay_scroll: 0,
            logs: VecDeque::new(),
            help_overlay: false,
        }
    }

    pub fn selected_player(&self) -> Option<&PlayerRecord> {
        self.roster.players().get(self.selected)
    }

    pub fn select_next(&mut self) {
        let total = self.roster.len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1) % total;
    }

    pub fn select_prev(&mut self) {
        let total = self.roster.len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        if self.selected == 0 {
            self.selected = total - 1;
        } else {
            self.selected -= 1;
        }
    }

    /// Moves one card row down; stays put on the last row.
    pub fn select_down(&mut self) {
        let next = self.selected + CARD_COLUMNS;
        if next < self.roster.len() {
            self.selected = next;
        }
    }

    pub fn select_up(&mut self) {
        if self.selected >= CARD_COLUMNS {
            self.selected -= CARD_COLUMNS;
        }
    }

    /// Resolved URL, or the fallback while the avatar is still pending.
    pub fn avatar_for(&self, username: &str) -> &str {
        self.avatars
            .get(username)
            .map(String::as_str)
            .unwrap_or(self.fallback_url.as_str())
    }

    pub fn avatar_status(&self, username: &str) -> AvatarStatus {
        match self.avatars.get(username) {
            None => AvatarStatus::Pending,
            Some(url) if *url == self.fallback_url => AvatarStatus::Fallback,
            Some(_) => AvatarStatus::Resolved,
        }
    }

    pub fn avatars_settled(&self) -> usize {
        self.roster
            .usernames()
            .filter(|name| self.avatars.contains_key(*name))
            .count()
    }

    /// Player the club/position shortcuts act on: the popup's player when a
    /// popup is open, otherwise the selected card.
    fn context_player(&self) -> Option<&PlayerRecord> {
        if let Overlay::PlayerPopup { username, .. } = &self.overlay {
            return self.roster.get(username);
        }
        self.selected_player()
    }

    pub fn open_club_view(&mut self) {
        let Some(club) = self.context_player().map(|p| p.club.clone()) else {
            return;
        };
        self.set_overlay(Overlay::ClubView(club));
    }

    pub fn open_position_view(&mut self) {
        let Some(position) = self.context_player().map(|p| p.position.clone()) else {
            return;
        };
        self.set_overlay(Overlay::PositionView(position));
    }

    pub fn open_player_popup(&mut self, anchor: Anchor) {
        let Some(username) = self.selected_player().map(|p| p.username.clone()) else {
            return;
        };
        self.set_overlay(Overlay::PlayerPopup { username, anchor });
    }

    /// Follows a link for the popup's player, or the selected card.
    pub fn follow_link(&mut self, link: ContextLink) {
        match link {
            ContextLink::Club => self.open_club_view(),
            ContextLink::Position => self.open_position_view(),
        }
    }

    /// Follows a link printed on card `idx`, which becomes the selection.
    pub fn follow_card_link(&mut self, idx: usize, link: ContextLink) {
        if idx >= self.roster.len() {
            return;
        }
        self.selected = idx;
        self.overlay = Overlay::None;
        self.follow_link(link);
    }

    pub fn close_overlay(&mut self) {
        self.set_overlay(Overlay::None);
    }

    fn set_overlay(&mut self, overlay: Overlay) {
        self.overlay = overlay;
        self.overlay_scroll = 0;
    }

    pub fn scroll_overlay_down(&mut self) {
        self.overlay_scroll = self.overlay_scroll.saturating_add(1);
    }

    pub fn scroll_overlay_up(&mut self) {
        self.overlay_scroll = self.overlay_scroll.saturating_sub(1);
    }

    pub fn global_rank_of(&self, username: &str) -> Option<usize> {
        rankings::global_rank_of(&self.roster, username)
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    AvatarResolved { username: String, image_url: String },
    AvatarsFinished { resolved: usize, fallback: usize },
    Log(String),
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::AvatarResolved {
            username,
            image_url,
        } => {
            // First confirmed value wins; the cache never resolves twice anyway.
            state.avatars.entry(username).or_insert(image_url);
        }
        Delta::AvatarsFinished { resolved, fallback } => {
            state.avatars_done = true;
            state.push_log(format!(
                "[INFO] Avatars ready ({resolved} resolved, {fallback} default)"
            ));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

/// `$1,234,567` style, like a locale-formatted wage.
pub fn format_money(amount: u64) -> String {
    group_dollars(&amount.to_string())
}

/// Budget headroom, which can go below zero.
pub fn format_signed_money(amount: i128) -> String {
    let dollars = group_dollars(&amount.unsigned_abs().to_string());
    if amount < 0 {
        format!("-{dollars}")
    } else {
        dollars
    }
}

fn group_dollars(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
