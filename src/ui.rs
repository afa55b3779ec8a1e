use crate::client::AppSnapshot;
use case_opener::objects::{
    ObjectId,
    OwnedObject,
    Rarity,
    rarity_label,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tokio::sync::mpsc;
use unicode_width::{
    UnicodeWidthChar,
    UnicodeWidthStr,
};

const ID_WIDTH: usize = 24;

pub enum UserEvent {
    Quit,
    Redraw,
    DismissErrors,
    Refresh,
    Mint,
    OpenSelected,
    SelectCase(ObjectId),
    ClearSelection,
    Discard(ObjectId),
    ToggleWallet,
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    focus: Panel,
    case_idx: usize,
    skin_idx: usize,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    ConfirmDiscard(ObjectId),
    QuitModal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Panel {
    #[default]
    Cases,
    Skins,
}

impl Panel {
    fn toggled(self) -> Self {
        match self {
            Panel::Cases => Panel::Skins,
            Panel::Skins => Panel::Cases,
        }
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // One persistent Terminal so buffers survive across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

/// Reads terminal input on a dedicated thread so the async loop never blocks on it.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let ev = event::read();
            let failed = ev.is_err();
            if tx.send(ev).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(input_events: &mut InputEventReceiver) -> Result<Event> {
    match input_events.recv().await {
        Some(ev) => ev.wrap_err("failed to read terminal input"),
        None => Err(eyre!("terminal input stream closed")),
    }
}

/// Maps a raw terminal event onto an action, updating cursor and modal state.
pub fn interpret_event(
    state: &mut UiState,
    snap: &AppSnapshot,
    event: Event,
) -> Option<UserEvent> {
    let key = match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if is_ctrl_c(&key) {
        return Some(UserEvent::Quit);
    }
    clamp_cursors(state, snap);

    match &state.mode {
        Mode::QuitModal => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    Some(UserEvent::Quit)
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::ConfirmDiscard(skin_id) => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    let skin_id = skin_id.clone();
                    state.mode = Mode::Normal;
                    Some(UserEvent::Discard(skin_id))
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::Normal => {}
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            Some(UserEvent::Redraw)
        }
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
            state.focus = state.focus.toggled();
            Some(UserEvent::Redraw)
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let idx = focused_cursor(state);
            *idx = idx.saturating_sub(1);
            Some(UserEvent::Redraw)
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let len = match state.focus {
                Panel::Cases => snap.cases.len(),
                Panel::Skins => snap.skins.len(),
            };
            let idx = focused_cursor(state);
            if *idx + 1 < len {
                *idx += 1;
            }
            Some(UserEvent::Redraw)
        }
        KeyCode::Enter | KeyCode::Char(' ') => match state.focus {
            Panel::Cases => snap
                .cases
                .get(state.case_idx)
                .map(|case| UserEvent::SelectCase(case.id.clone())),
            Panel::Skins => confirm_discard(state, snap),
        },
        KeyCode::Char('d') => {
            state.focus = Panel::Skins;
            confirm_discard(state, snap)
        }
        KeyCode::Char('x') => Some(UserEvent::ClearSelection),
        KeyCode::Char('n') => Some(UserEvent::Mint),
        KeyCode::Char('o') => Some(UserEvent::OpenSelected),
        KeyCode::Char('r') => Some(UserEvent::Refresh),
        KeyCode::Char('w') => Some(UserEvent::ToggleWallet),
        KeyCode::Char('c') => Some(UserEvent::DismissErrors),
        _ => None,
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn focused_cursor(state: &mut UiState) -> &mut usize {
    match state.focus {
        Panel::Cases => &mut state.case_idx,
        Panel::Skins => &mut state.skin_idx,
    }
}

fn confirm_discard(state: &mut UiState, snap: &AppSnapshot) -> Option<UserEvent> {
    let skin = snap.skins.get(state.skin_idx)?;
    state.mode = Mode::ConfirmDiscard(skin.id.clone());
    Some(UserEvent::Redraw)
}

fn clamp_cursors(state: &mut UiState, snap: &AppSnapshot) {
    state.case_idx = state.case_idx.min(snap.cases.len().saturating_sub(1));
    state.skin_idx = state.skin_idx.min(snap.skins.len().saturating_sub(1));
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    clamp_cursors(state, snap);
    if let Some(mut term) = state.terminal.take() {
        let drawn = term.draw(|f| ui(f, state, snap)).map(|_| ());
        state.terminal = Some(term);
        drawn?;
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // wallet + network
            Constraint::Min(8),    // cases + skins
            Constraint::Length(8), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_inventory(f, state, chunks[1], snap);
    draw_status(f, chunks[2], snap);
    draw_help(f, chunks[3]);
    draw_modals(f, state);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let wallet = match (&snap.address, snap.connected) {
        (Some(address), true) => Span::styled(
            format!("Connected: {address}"),
            Style::default().fg(Color::Green),
        ),
        (Some(address), false) => Span::styled(
            format!("Disconnected ({})", short_id(address, ID_WIDTH)),
            Style::default().fg(Color::Yellow),
        ),
        (None, _) => Span::styled(
            "No wallet account",
            Style::default().fg(Color::Red),
        ),
    };
    let mut lines = vec![Line::from(vec![Span::raw("Wallet: "), wallet])];
    lines.push(Line::from(format!(
        "Network: {} | Package: {}",
        snap.network,
        short_id(&snap.package, ID_WIDTH)
    )));
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Case Opener"));
    f.render_widget(widget, area);
}

fn draw_inventory(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let case_lines: Vec<Line> = snap
        .cases
        .iter()
        .enumerate()
        .map(|(idx, case)| {
            let selected = snap.selection.as_ref() == Some(&case.id);
            let marker = if selected { "● " } else { "  " };
            let text = format!("{marker}{}", short_id(case.id.as_str(), ID_WIDTH));
            styled_row(text, state.focus == Panel::Cases && idx == state.case_idx, selected)
        })
        .collect();
    let title = format!("Cases ({})", snap.cases.len());
    draw_list(
        f,
        cols[0],
        title,
        case_lines,
        state.case_idx,
        state.focus == Panel::Cases,
    );

    let skin_lines: Vec<Line> = snap
        .skins
        .iter()
        .enumerate()
        .map(|(idx, skin)| {
            let text = format!(
                "{:<10} {}",
                skin.rarity_label(),
                short_id(skin.id.as_str(), ID_WIDTH)
            );
            styled_row(text, state.focus == Panel::Skins && idx == state.skin_idx, false)
                .patch_style(rarity_style(skin))
        })
        .collect();
    let title = match rarity_summary(&snap.skins) {
        Some(summary) => format!("Skins ({}) {summary}", snap.skins.len()),
        None => format!("Skins ({})", snap.skins.len()),
    };
    draw_list(
        f,
        cols[1],
        title,
        skin_lines,
        state.skin_idx,
        state.focus == Panel::Skins,
    );
}

fn draw_list(
    f: &mut Frame,
    area: Rect,
    title: String,
    mut lines: Vec<Line>,
    cursor: usize,
    focused: bool,
) {
    if lines.is_empty() {
        lines.push(Line::styled("None", Style::default().fg(Color::DarkGray)));
    }
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let visible_rows = area.height.saturating_sub(2) as usize;
    let offset = (cursor + 1).saturating_sub(visible_rows);
    let widget = Paragraph::new(lines)
        .scroll((u16::try_from(offset).unwrap_or(u16::MAX), 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(title),
        );
    f.render_widget(widget, area);
}

fn styled_row(text: String, under_cursor: bool, selected: bool) -> Line<'static> {
    let mut style = Style::default();
    if selected {
        style = style.add_modifier(Modifier::BOLD).fg(Color::Yellow);
    }
    if under_cursor {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Line::styled(text, style)
}

fn rarity_style(skin: &OwnedObject) -> Style {
    let color = match skin.rarity() {
        Some(Rarity::Common) => Color::Gray,
        Some(Rarity::Rare) => Color::Blue,
        Some(Rarity::Epic) => Color::Magenta,
        Some(Rarity::Legendary) => Color::Yellow,
        None => Color::DarkGray,
    };
    Style::default().fg(color)
}

/// "2× Common | 1× Legendary", ordered by rarity.
fn rarity_summary(skins: &[OwnedObject]) -> Option<String> {
    if skins.is_empty() {
        return None;
    }
    let summary = skins
        .iter()
        .map(|skin| skin.rarity)
        .sorted()
        .dedup_with_count()
        .map(|(count, rarity)| format!("{count}× {}", rarity_label(rarity)))
        .join(" | ");
    Some(summary)
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = Vec::new();
    if let Some(pending) = &snap.pending {
        lines.push(Line::styled(
            format!("⏳ {pending}"),
            Style::default().fg(Color::Yellow),
        ));
    }
    if snap.status.trim().is_empty() {
        lines.push(Line::from("Ready"));
    } else {
        lines.push(Line::styled(
            snap.status.clone(),
            Style::default().fg(Color::Green),
        ));
    }
    for e in &snap.errors {
        lines.push(Line::styled(e.clone(), Style::default().fg(Color::Red)));
    }
    let title = if snap.errors.is_empty() {
        "Status"
    } else {
        "Status / Errors (c to dismiss)"
    };
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "↑/↓ move | Tab panel | Enter select | x clear | n mint | o open | d delete | r refresh | w wallet | q quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    let (title, text) = match &state.mode {
        Mode::QuitModal => ("Confirm Quit", String::from("Quit? (Y/N)")),
        Mode::ConfirmDiscard(skin_id) => (
            "Confirm Delete",
            format!(
                "Permanently delete skin {}? (Y/N)",
                short_id(skin_id.as_str(), ID_WIDTH)
            ),
        ),
        Mode::Normal => return,
    };
    let area = centered_rect(50, 20, f.area());
    let block = Block::default().borders(Borders::ALL).title(title);
    let p = Paragraph::new(text).wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(p, block.inner(area));
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Shortens `id` to at most `max_width` columns by eliding its middle.
pub fn short_id(id: &str, max_width: usize) -> String {
    if id.width() <= max_width || max_width < 3 {
        return id.to_string();
    }
    let budget = max_width - 1;
    let head_budget = budget.div_ceil(2);
    let tail_budget = budget - head_budget;

    let mut head = String::new();
    let mut used = 0;
    for c in id.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > head_budget {
            break;
        }
        head.push(c);
        used += w;
    }
    let mut tail: Vec<char> = Vec::new();
    used = 0;
    for c in id.chars().rev() {
        let w = c.width().unwrap_or(0);
        if used + w > tail_budget {
            break;
        }
        tail.push(c);
        used += w;
    }
    tail.reverse();
    format!("{head}…{}", tail.into_iter().collect::<String>())
}
