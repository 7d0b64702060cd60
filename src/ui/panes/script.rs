//! Script segment panes
//!
//! Tokens are laid out on wrapped lines in disassembly order. The token the
//! interpreter will run next is highlighted while execution is in progress,
//! and tokens recorded in the branch record are drawn in the error color.

use crate::script::ScriptSegment;
use crate::session::View;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// How a single token is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMark {
    Current,
    Skipped,
    Normal,
}

/// Classify the token at `segment`/`offset` for the given view
pub fn mark_for(view: &View<'_>, segment: usize, offset: usize) -> TokenMark {
    let at_cursor = view.position.segment == segment && view.position.offset == offset;
    if at_cursor && !view.state.is_terminal() {
        TokenMark::Current
    } else if view.is_skipped(segment, offset) {
        TokenMark::Skipped
    } else {
        TokenMark::Normal
    }
}

fn token_style(token: &str, mark: TokenMark) -> Style {
    match mark {
        TokenMark::Current => Style::default()
            .bg(DEFAULT_THEME.current_line_bg)
            .fg(DEFAULT_THEME.secondary)
            .add_modifier(Modifier::BOLD),
        TokenMark::Skipped => Style::default()
            .fg(DEFAULT_THEME.error)
            .add_modifier(Modifier::BOLD),
        TokenMark::Normal if token.starts_with("OP_") => Style::default().fg(DEFAULT_THEME.opcode),
        TokenMark::Normal => Style::default().fg(DEFAULT_THEME.data),
    }
}

/// Render one script segment
pub fn render_script_pane(frame: &mut Frame, area: Rect, segment: &ScriptSegment, view: &View<'_>) {
    let index = segment.kind().index();
    let is_running = !view.state.is_terminal() && view.position.segment == index;

    let border_style = if is_running {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    };

    let block = Block::default()
        .title(format!(" {} ", segment.kind().title()))
        .borders(Borders::ALL)
        .border_style(border_style);

    let line = if segment.is_empty() {
        Line::from(Span::styled(
            "(empty)",
            Style::default().fg(DEFAULT_THEME.comment),
        ))
    } else {
        let mut spans = Vec::with_capacity(segment.len() * 2);
        for (offset, token) in segment.tokens().iter().enumerate() {
            let mark = mark_for(view, index, offset);
            spans.push(Span::styled(token.clone(), token_style(token, mark)));
            spans.push(Span::raw(" "));
        }
        Line::from(spans)
    };

    let paragraph = Paragraph::new(line)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Render the instruction about to execute
pub fn render_next_instruction(frame: &mut Frame, area: Rect, view: &View<'_>) {
    let block = Block::default()
        .title(" Next Instruction ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(DEFAULT_THEME.border_normal));

    let line = match view.next_instruction {
        Some(token) if !view.state.is_terminal() => {
            let segment = view
                .segments
                .get(view.position.segment)
                .map_or("", |segment| segment.kind().title());
            Line::from(vec![
                Span::styled(
                    token.to_string(),
                    Style::default()
                        .fg(DEFAULT_THEME.secondary)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  ({} #{})", segment, view.position.offset),
                    Style::default().fg(DEFAULT_THEME.comment),
                ),
            ])
        }
        _ => Line::from(Span::styled(
            "(none)",
            Style::default().fg(DEFAULT_THEME.comment),
        )),
    };

    frame.render_widget(Paragraph::new(line).block(block), area);
}
