//! Header, verdict banner and status bar

use crate::session::SessionState;
use crate::ui::app::InputSummary;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Text shown in the verdict banner, if the session has one
pub fn verdict_text(state: &SessionState) -> Option<String> {
    match state {
        SessionState::Succeeded => Some("Success!!!".to_string()),
        SessionState::Failed(detail) => Some(format!("Fail :( {detail}")),
        SessionState::Ready | SessionState::Running => None,
    }
}

/// Render the one-line header describing the input
pub fn render_header(frame: &mut Frame, area: Rect, summary: &InputSummary) {
    let label = Style::default()
        .bg(DEFAULT_THEME.success)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD);
    let value = Style::default()
        .bg(DEFAULT_THEME.current_line_bg)
        .fg(DEFAULT_THEME.fg);

    let mut spans = vec![
        Span::styled(" Debugger ", label),
        Span::styled(format!(" tx {} ", summary.txid), value),
        Span::styled(format!(" input {} ", summary.input_index), value),
        Span::styled(format!(" {} sats ", summary.amount_sats), value),
    ];

    if let Some(token) = &summary.token_data {
        spans.push(Span::styled(
            format!(
                " token {} amount {} ",
                hex::encode(token.category),
                token.amount
            ),
            value.fg(DEFAULT_THEME.secondary),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(DEFAULT_THEME.current_line_bg))
        .alignment(Alignment::Left);
    frame.render_widget(paragraph, area);
}

/// Render the success or failure banner
pub fn render_verdict(frame: &mut Frame, area: Rect, state: &SessionState) {
    let Some(text) = verdict_text(state) else {
        return;
    };

    let color = if *state == SessionState::Succeeded {
        DEFAULT_THEME.success
    } else {
        DEFAULT_THEME.error
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
    let paragraph = Paragraph::new(Span::styled(
        text,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
    .block(block);
    frame.render_widget(paragraph, area);
}

/// Render the status bar at the bottom
pub fn render_status_bar(
    frame: &mut Frame,
    area: Rect,
    message: &str,
    steps_taken: usize,
    state: &SessionState,
) {
    // Split status bar into left and right
    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let step_bg = match state {
        SessionState::Succeeded => DEFAULT_THEME.success,
        SessionState::Failed(_) => DEFAULT_THEME.error,
        SessionState::Ready | SessionState::Running => DEFAULT_THEME.primary,
    };

    let left_spans = vec![
        Span::styled(
            format!(" Step {} ", steps_taken),
            Style::default()
                .bg(step_bg)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " | ",
            Style::default()
                .bg(DEFAULT_THEME.current_line_bg)
                .fg(DEFAULT_THEME.comment),
        ),
        Span::styled(
            format!(" {} ", message),
            Style::default()
                .bg(DEFAULT_THEME.current_line_bg)
                .fg(DEFAULT_THEME.fg),
        ),
    ];

    let left_paragraph = Paragraph::new(Line::from(left_spans))
        .style(Style::default().bg(DEFAULT_THEME.current_line_bg))
        .alignment(Alignment::Left);

    frame.render_widget(left_paragraph, layout[0]);

    // Right side: Keybinds with visual grouping
    let key_style = Style::default().bg(DEFAULT_THEME.comment).fg(Color::Black);
    let desc_style = Style::default()
        .bg(DEFAULT_THEME.current_line_bg)
        .fg(DEFAULT_THEME.fg);
    let sep_style = Style::default()
        .bg(DEFAULT_THEME.current_line_bg)
        .fg(DEFAULT_THEME.comment);

    let mut right_spans = vec![
        Span::styled(" ←/F3 ", key_style),
        Span::styled(" back ", desc_style),
        Span::styled("│", sep_style),
        Span::styled(" ", desc_style),
        Span::styled(" →/F4 ", key_style),
        Span::styled(" forward ", desc_style),
        Span::styled("│", sep_style),
        Span::styled(" ", desc_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", desc_style),
    ];

    let indicator = match state {
        SessionState::Ready => Some((" START ", DEFAULT_THEME.success)),
        SessionState::Succeeded | SessionState::Failed(_) => Some((" END ", DEFAULT_THEME.error)),
        SessionState::Running => None,
    };
    if let Some((text, bg)) = indicator {
        right_spans.push(Span::styled("│", sep_style));
        right_spans.push(Span::styled(
            text,
            Style::default()
                .bg(bg)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let right_paragraph = Paragraph::new(Line::from(right_spans))
        .style(Style::default().bg(DEFAULT_THEME.current_line_bg))
        .alignment(Alignment::Right);

    frame.render_widget(right_paragraph, layout[1]);
}
