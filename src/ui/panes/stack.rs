//! Stack pane rendering

use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

/// Stack items top first, as `(depth, hex)` pairs
pub fn stack_lines(items: &[Vec<u8>]) -> Vec<(usize, String)> {
    items
        .iter()
        .rev()
        .enumerate()
        .map(|(depth, item)| {
            let text = if item.is_empty() {
                "(empty)".to_string()
            } else {
                hex::encode(item)
            };
            (depth, text)
        })
        .collect()
}

/// Render a stack, top item first
pub fn render_stack_pane(frame: &mut Frame, area: Rect, title: &str, items: &[Vec<u8>]) {
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(DEFAULT_THEME.border_normal));

    let lines = stack_lines(items);
    let list_items: Vec<ListItem> = if lines.is_empty() {
        vec![ListItem::new(Line::from(Span::styled(
            "(no items)",
            Style::default().fg(DEFAULT_THEME.comment),
        )))]
    } else {
        lines
            .into_iter()
            .map(|(depth, text)| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:>3} ", depth),
                        Style::default().fg(DEFAULT_THEME.stack_index),
                    ),
                    Span::styled(text, Style::default().fg(DEFAULT_THEME.fg)),
                ]))
            })
            .collect()
    };

    frame.render_widget(List::new(list_items).block(block), area);
}
