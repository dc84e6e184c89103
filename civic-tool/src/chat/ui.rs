use civic_api::Sender;
use civic_session::{Identity, LoadingState};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use super::app::{ChatApp, Focus};

pub fn render(frame: &mut Frame, app: &ChatApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(1),    // Sidebar + messages
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(1)])
        .split(chunks[1]);

    render_header(frame, app, chunks[0]);
    render_sidebar(frame, app, body[0]);
    render_messages(frame, app, body[1]);
    render_input(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);
}

fn render_header(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let who = match app.identity() {
        Identity::Authenticated { .. } => "signed in".to_string(),
        Identity::Guest { guest_id: Some(id) } => format!("guest {}", id),
        Identity::Guest { guest_id: None } => "guest".to_string(),
    };

    let conversation = match app.session.conversation_id() {
        Some(id) => format!("  conversation: {}", id),
        None => String::new(),
    };

    let title = format!("civ chat - {}{}", who, conversation);
    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    frame.render_widget(header, area);
}

fn render_sidebar(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let focused = app.focus == Focus::Search;
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let search = Paragraph::new(app.search_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title("Search"),
    );
    frame.render_widget(search, chunks[0]);
    if focused {
        let x = chunks[0].x + 1 + app.search_input.chars().count() as u16;
        frame.set_cursor_position((x, chunks[0].y + 1));
    }

    let state = app.search_state();
    let title = if state.pending {
        "Conversations (searching...)"
    } else {
        "Conversations"
    };

    let mut items: Vec<ListItem> = state
        .conversations
        .iter()
        .map(|c| {
            let label = c.title.as_deref().unwrap_or(c.id.as_str());
            let style = if app.session.conversation_id().as_deref() == Some(c.id.as_str()) {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            ListItem::new(label.to_string()).style(style)
        })
        .collect();

    if !app.is_authenticated() {
        items.push(ListItem::new("Sign in to see history").style(Style::default().fg(Color::DarkGray)));
    } else if let Some(error) = &state.error {
        items.push(ListItem::new(format!("! {}", error)).style(Style::default().fg(Color::Red)));
    }

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    if focused && !state.conversations.is_empty() {
        list_state.select(Some(app.selected));
    }

    frame.render_stateful_widget(list, chunks[1], &mut list_state);
}

fn render_messages(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();

    for msg in app.messages() {
        let (role, style) = match msg.sender() {
            Sender::User => ("You", Style::default().fg(Color::Green)),
            Sender::Assistant => ("Assistant", Style::default().fg(Color::Blue)),
        };

        let mut header = vec![Span::styled(
            format!("{}:", role),
            style.add_modifier(Modifier::BOLD),
        )];
        header.push(Span::styled(
            format!(" {}", msg.timestamp().format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ));
        lines.push(Line::from(header));

        for line in msg.text().lines() {
            lines.push(Line::from(format!("  {}", line)));
        }

        if let Some(insight) = msg.insight().filter(|i| !i.is_empty()) {
            let dim = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
            if let Some(text) = &insight.insight {
                lines.push(Line::from(Span::styled(format!("  [Insight] {}", text), dim)));
            }
            if !insight.categories.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("  [Categories] {}", insight.categories.join(", ")),
                    dim,
                )));
            }
            let mood: Vec<&str> = [insight.sentiment.as_deref(), insight.emotion.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if !mood.is_empty() {
                lines.push(Line::from(Span::styled(format!("  [Tone] {}", mood.join(" / ")), dim)));
            }
        }

        lines.push(Line::from("")); // Empty line between messages
    }

    if let Some(label) = app.loading().label() {
        lines.push(Line::from(Span::styled(
            format!("{}...", label),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        )));
    }

    if let Some(ref error) = app.last_error {
        lines.push(Line::from(Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red),
        )));
    }

    let messages_block = Block::default().borders(Borders::ALL).title("Messages");

    // Calculate scroll offset to show the bottom of the conversation
    let visible_height = area.height.saturating_sub(2) as usize;
    let total_lines = lines.len();
    let scroll = if total_lines > visible_height {
        (total_lines - visible_height).saturating_sub(app.messages_scroll as usize)
    } else {
        0
    };

    let paragraph = Paragraph::new(Text::from(lines))
        .block(messages_block)
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));

    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let focused = app.focus == Focus::Composer;
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title("Message");

    let (display_text, style) = if app.input.is_empty() {
        (
            "Ask about city services...".to_string(),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (app.input.clone(), Style::default())
    };

    let input_paragraph = Paragraph::new(display_text)
        .style(style)
        .block(input_block);

    frame.render_widget(input_paragraph, area);

    if focused {
        let cursor_x = area.x + 1 + app.input[..app.cursor_pos].chars().count() as u16;
        frame.set_cursor_position((cursor_x, area.y + 1));
    }
}

fn render_status_bar(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let status = match (app.focus, app.loading()) {
        (Focus::Search, _) => "↑/↓: Select  Enter: Open  Tab/Esc: Back",
        (Focus::Composer, LoadingState::Processing | LoadingState::Thinking | LoadingState::Generating) => {
            "Waiting for response...  Ctrl+↑/↓: Scroll  Esc: Quit"
        }
        (Focus::Composer, _) => {
            "Enter: Send  ↑/↓: History  Tab: Search  Ctrl+N: New  Ctrl+↑/↓: Scroll  Esc: Quit"
        }
    };

    let status_bar = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));

    frame.render_widget(status_bar, area);
}
