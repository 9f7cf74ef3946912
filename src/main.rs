use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use iff_roster::avatar_feed::spawn_avatar_provider;
use iff_roster::config::{self, AppConfig};
use iff_roster::rankings;
use iff_roster::roster::{self, ClassTag, PlayerRecord, class_label};
use iff_roster::state::{
    Anchor, AppState, AvatarStatus, CARD_COLUMNS, ContextLink, Delta, Overlay, apply_delta,
    format_money, format_signed_money,
};

const CARD_HEIGHT: u16 = 9;
// Rows inside a card (below its top border) holding the position and club labels.
const CARD_POSITION_ROW: u16 = 4;
const CARD_CLUB_ROW: u16 = 5;
// Rows inside the player popup holding the club and position labels.
const POPUP_CLUB_ROW: u16 = 1;
const POPUP_POSITION_ROW: u16 = 2;

/// Clickable club/position label. `card` is `None` for labels in the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LinkArea {
    card: Option<usize>,
    link: ContextLink,
    area: Rect,
}

struct App {
    state: AppState,
    should_quit: bool,
    card_areas: Vec<(usize, Rect)>,
    link_areas: Vec<LinkArea>,
    overlay_area: Option<Rect>,
}

impl App {
    fn new(state: AppState) -> Self {
        Self {
            state,
            should_quit: false,
            card_areas: Vec::new(),
            link_areas: Vec::new(),
            overlay_area: None,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc | KeyCode::Char('b') => {
                if self.state.help_overlay {
                    self.state.help_overlay = false;
                } else {
                    self.state.close_overlay();
                }
            }
            KeyCode::Char('c') | KeyCode::Char('C') => self.state.follow_link(ContextLink::Club),
            KeyCode::Char('p') | KeyCode::Char('P') => {
                self.state.follow_link(ContextLink::Position)
            }
            KeyCode::Enter => {
                let anchor = self.selected_anchor();
                self.state.open_player_popup(anchor);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if self.overlay_scrolls() {
                    self.state.scroll_overlay_down();
                } else {
                    self.state.select_down();
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.overlay_scrolls() {
                    self.state.scroll_overlay_up();
                } else {
                    self.state.select_up();
                }
            }
            KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => self.state.select_next(),
            KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => self.state.select_prev(),
            _ => {}
        }
    }

    /// Overlay labels win over whatever is drawn underneath, and a click
    /// elsewhere inside an overlay is swallowed.
    fn on_mouse(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        let (x, y) = (mouse.column, mouse.row);

        let popup_link = self
            .link_areas
            .iter()
            .find(|l| l.card.is_none() && contains(l.area, x, y));
        if let Some(hit) = popup_link.copied() {
            self.state.follow_link(hit.link);
            return;
        }
        if self.overlay_area.is_some_and(|area| contains(area, x, y)) {
            return;
        }

        let card_link = self
            .link_areas
            .iter()
            .find_map(|l| l.card.filter(|_| contains(l.area, x, y)).map(|idx| (idx, l.link)));
        if let Some((idx, link)) = card_link {
            self.state.follow_card_link(idx, link);
            return;
        }

        match self.card_areas.iter().find(|(_, area)| contains(*area, x, y)) {
            Some((idx, _)) => {
                self.state.selected = *idx;
                self.state.open_player_popup(Anchor { x, y });
            }
            None => self.state.close_overlay(),
        }
    }

    fn overlay_scrolls(&self) -> bool {
        matches!(
            self.state.overlay,
            Overlay::ClubView(_) | Overlay::PositionView(_)
        )
    }

    fn selected_anchor(&self) -> Anchor {
        self.card_areas
            .iter()
            .find(|(idx, _)| *idx == self.state.selected)
            .map(|(_, area)| Anchor {
                x: area.x + area.width / 2,
                y: area.y + 2,
            })
            .unwrap_or_default()
    }
}

fn contains(area: Rect, x: u16, y: u16) -> bool {
    x >= area.x && x < area.x + area.width && y >= area.y && y < area.y + area.height
}

/// One-row strip inside a bordered block, or `None` if the block is too short.
fn label_row(block: Rect, row: u16) -> Option<Rect> {
    if row + 1 >= block.height || block.width < 3 {
        return None;
    }
    Some(Rect {
        x: block.x + 1,
        y: block.y + row,
        width: block.width - 2,
        height: 1,
    })
}

fn main() -> Result<()> {
    config::load_dotenv();
    let config = AppConfig::from_env();
    init_tracing(config.log_path.as_deref())?;

    let roster = Arc::new(roster::load_roster(config.roster_path.as_deref())?);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    spawn_avatar_provider(tx, Arc::clone(&roster), config.avatar.clone());

    let mut state = AppState::new(roster, config.wage_budget, &config.avatar.fallback_url);
    state.push_log(format!("[INFO] Loaded {} players", state.roster.len()));
    let mut app = App::new(state);
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

/// Diagnostics go to a file, and only when one is configured; stderr belongs
/// to the terminal UI.
fn init_tracing(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("failed creating log file {}", path.display()))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("iff_roster=debug")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    app.card_areas = render_cards(frame, chunks[1], &app.state);
    app.link_areas.clear();
    for &(idx, area) in &app.card_areas {
        let rows = [
            (ContextLink::Position, CARD_POSITION_ROW),
            (ContextLink::Club, CARD_CLUB_ROW),
        ];
        for (link, row) in rows {
            if let Some(area) = label_row(area, row) {
                app.link_areas.push(LinkArea {
                    card: Some(idx),
                    link,
                    area,
                });
            }
        }
    }

    let footer = Paragraph::new(footer_text(&app.state))
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    let area = frame.size();
    app.overlay_area = match &app.state.overlay {
        Overlay::None => None,
        Overlay::ClubView(club) => Some(render_club_overlay(frame, area, &app.state, club)),
        Overlay::PositionView(position) => {
            Some(render_position_overlay(frame, area, &app.state, position))
        }
        Overlay::PlayerPopup { username, anchor } => {
            let popup = render_player_popup(frame, area, &app.state, username, *anchor);
            if let Some(popup) = popup {
                let rows = [
                    (ContextLink::Club, POPUP_CLUB_ROW),
                    (ContextLink::Position, POPUP_POSITION_ROW),
                ];
                for (link, row) in rows {
                    if let Some(area) = label_row(popup, row) {
                        app.link_areas.push(LinkArea {
                            card: None,
                            link,
                            area,
                        });
                    }
                }
            }
            popup
        }
    };

    if app.state.help_overlay {
        app.overlay_area = Some(render_help_overlay(frame, area));
    }
}

fn header_text(state: &AppState) -> String {
    let avatars = if state.avatars_done {
        "avatars ready".to_string()
    } else {
        format!(
            "avatars {}/{}",
            state.avatars_settled(),
            state.roster.len()
        )
    };
    format!(
        "  I F F   S P R E A D S H E E T\n  {} players | {}",
        state.roster.len(),
        avatars
    )
}

fn footer_text(state: &AppState) -> String {
    let keys = match state.overlay {
        Overlay::None => "←/→/↑/↓ Move | Enter Player | c Club | p Position | ? Help | q Quit",
        Overlay::PlayerPopup { .. } => "c Club | p Position | Esc Close | q Quit",
        _ => "j/k Scroll | Esc Close | q Quit",
    };
    match state.logs.back() {
        Some(last) => format!("{keys}    {last}"),
        None => keys.to_string(),
    }
}

fn class_color(class_tag: ClassTag) -> Color {
    match class_tag {
        ClassTag::A => Color::Rgb(220, 38, 38),
        ClassTag::B => Color::Rgb(249, 115, 22),
        ClassTag::C => Color::Rgb(234, 179, 8),
        ClassTag::D => Color::Rgb(34, 197, 94),
    }
}

/// Draws the visible card rows and returns the area of each drawn card.
fn render_cards(frame: &mut Frame, area: Rect, state: &AppState) -> Vec<(usize, Rect)> {
    let players = state.roster.players();
    if players.is_empty() {
        let empty = Paragraph::new("Roster is empty").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return Vec::new();
    }
    if area.height < CARD_HEIGHT {
        let empty = Paragraph::new("Card grid needs more height")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return Vec::new();
    }

    let total_rows = players.len().div_ceil(CARD_COLUMNS);
    let visible_rows = (area.height / CARD_HEIGHT) as usize;
    let selected_row = state.selected / CARD_COLUMNS;
    let first_row = (selected_row + 1).saturating_sub(visible_rows);
    let last_row = (first_row + visible_rows).min(total_rows);

    let mut drawn = Vec::new();
    for (i, row) in (first_row..last_row).enumerate() {
        let row_area = Rect {
            x: area.x,
            y: area.y + (i as u16) * CARD_HEIGHT,
            width: area.width,
            height: CARD_HEIGHT,
        };
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, CARD_COLUMNS as u32); CARD_COLUMNS])
            .split(row_area);
        for (col, card_area) in cols.iter().enumerate() {
            let idx = row * CARD_COLUMNS + col;
            let Some(player) = players.get(idx) else {
                break;
            };
            render_card(frame, *card_area, state, player, idx == state.selected);
            drawn.push((idx, *card_area));
        }
    }
    drawn
}

fn render_card(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    player: &PlayerRecord,
    selected: bool,
) {
    let color = class_color(player.class_tag);
    let mut border = Style::default().fg(color);
    if selected {
        border = border.add_modifier(Modifier::BOLD | Modifier::REVERSED);
    }

    let muted = Style::default().fg(Color::DarkGray);
    let avatar = match state.avatar_status(&player.username) {
        AvatarStatus::Pending => Span::styled("◌ default avatar (loading)", muted),
        AvatarStatus::Fallback => Span::styled("○ default avatar", muted),
        AvatarStatus::Resolved => Span::styled(
            format!("● {}", state.avatar_for(&player.username)),
            Style::default().fg(color),
        ),
    };
    let label = Style::default().fg(Color::Gray);
    let link = Style::default().add_modifier(Modifier::UNDERLINED);
    // Line order must match CARD_POSITION_ROW / CARD_CLUB_ROW.
    let lines = vec![
        Line::from(avatar),
        Line::from(Span::styled(
            player.username.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled(
                player.rating.to_string(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" OVR"),
        ]),
        Line::from(vec![
            Span::styled("Position  ", label),
            Span::styled(player.position.clone(), link),
        ]),
        Line::from(vec![
            Span::styled("Club      ", label),
            Span::styled(player.club.clone(), link),
        ]),
        Line::from(vec![
            Span::styled("Wage      ", label),
            Span::raw(format_money(player.wage)),
        ]),
    ];

    let card = Paragraph::new(lines).block(
        Block::default()
            .title(class_label(player.class_tag))
            .borders(Borders::ALL)
            .border_style(border),
    );
    frame.render_widget(card, area);
}

fn render_club_overlay(frame: &mut Frame, area: Rect, state: &AppState, club: &str) -> Rect {
    let popup_area = centered_rect(50, 60, area);
    frame.render_widget(Clear, popup_area);

    let overview = rankings::club_overview(&state.roster, club, state.wage_budget);
    let muted = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(Span::styled("Club Overview", Style::default().fg(Color::Gray))),
        Line::from(""),
    ];
    for p in &overview.players {
        lines.push(Line::from(vec![
            Span::raw(format!("{:<24}", p.username)),
            Span::styled(
                format!("{} OVR", p.rating),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]));
    }
    if overview.players.is_empty() {
        lines.push(Line::from(Span::styled("No players", muted)));
    }
    lines.push(Line::from(""));
    let wage_style = if overview.over_budget() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Gray)
    };
    lines.push(Line::from(Span::styled(
        format!(
            "Wage Used: {} / {}",
            format_money(overview.wage_used),
            format_money(overview.wage_budget)
        ),
        wage_style,
    )));
    lines.push(Line::from(Span::styled(
        format!("Remaining: {}", format_signed_money(overview.wage_remaining())),
        wage_style,
    )));

    let widget = Paragraph::new(lines)
        .scroll((state.overlay_scroll, 0))
        .block(Block::default().title(club.to_string()).borders(Borders::ALL));
    frame.render_widget(widget, popup_area);
    popup_area
}

fn render_position_overlay(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    position: &str,
) -> Rect {
    let popup_area = centered_rect(50, 60, area);
    frame.render_widget(Clear, popup_area);

    let ranked = rankings::ranking_for_position(&state.roster, position);
    let mut lines = vec![
        Line::from(Span::styled(
            "Sorted by Overall Rating",
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
    ];
    for entry in &ranked {
        lines.push(Line::from(vec![
            Span::raw(format!("#{} {:<24}", entry.rank, entry.player.username)),
            Span::styled(
                entry.player.rating.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]));
    }
    if ranked.is_empty() {
        lines.push(Line::from(Span::styled(
            "No players",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let widget = Paragraph::new(lines)
        .scroll((state.overlay_scroll, 0))
        .block(
            Block::default()
                .title(format!("{position} Rankings"))
                .borders(Borders::ALL),
        );
    frame.render_widget(widget, popup_area);
    popup_area
}

fn render_player_popup(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    username: &str,
    anchor: Anchor,
) -> Option<Rect> {
    let player = state.roster.get(username)?;
    const WIDTH: u16 = 44;
    const HEIGHT: u16 = 8;
    let width = WIDTH.min(area.width);
    let height = HEIGHT.min(area.height);
    // Offset from the anchor, pulled back inside the frame near the edges.
    let x = anchor
        .x
        .saturating_add(2)
        .min(area.x + area.width.saturating_sub(width));
    let y = anchor
        .y
        .saturating_add(1)
        .min(area.y + area.height.saturating_sub(height));
    let popup_area = Rect {
        x,
        y,
        width,
        height,
    };
    frame.render_widget(Clear, popup_area);

    let rank = state
        .global_rank_of(&player.username)
        .map(|r| format!("#{r}"))
        .unwrap_or_else(|| "-".to_string());
    let link = Style::default().add_modifier(Modifier::UNDERLINED);
    let muted = Style::default().fg(Color::DarkGray);
    // Line order must match POPUP_CLUB_ROW / POPUP_POSITION_ROW.
    let lines = vec![
        Line::from(vec![
            Span::raw("Club: "),
            Span::styled(player.club.clone(), link),
        ]),
        Line::from(vec![
            Span::raw("Position: "),
            Span::styled(player.position.clone(), link),
        ]),
        Line::from(format!("Global Rank: {rank}")),
        Line::from(""),
        Line::from(Span::styled(
            "Click a club or position to switch context",
            muted,
        )),
        Line::from(Span::styled("c Club | p Position | Esc Close", muted)),
    ];
    let widget = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(player.username.clone())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(class_color(player.class_tag))),
    );
    frame.render_widget(widget, popup_area);
    Some(popup_area)
}

fn render_help_overlay(frame: &mut Frame, area: Rect) -> Rect {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "IFF Spreadsheet - Help",
        "",
        "Cards:",
        "  ←/→ or h/l   Previous / next card",
        "  ↑/↓ or k/j   Row up / down",
        "  Enter        Player popup (or click a card)",
        "  c            Club overview (or click a club)",
        "  p            Position rankings (or click a position)",
        "",
        "Overlays:",
        "  j/k          Scroll",
        "  b / Esc      Close",
        "",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
    popup_area
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
