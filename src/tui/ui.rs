//! Shared rendering helpers: themes, boxes and text cropping.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear},
};

use crate::config::Theme;

/// What a piece of text is, so the theme can pick a style for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Default,
    BoxTitle,
    Header,
    Selected,
    Number,
    Directory,
    Flag,
    Error,
}

/// Style for `role` under `theme`.
pub fn style(theme: Theme, role: Role) -> Style {
    let base = match theme {
        Theme::DarkBg => Style::default().bg(Color::Black).fg(Color::White),
        _ => Style::default(),
    };
    if theme == Theme::Off {
        return match role {
            Role::Selected | Role::Header => base.add_modifier(Modifier::REVERSED),
            Role::BoxTitle | Role::Error => base.add_modifier(Modifier::BOLD),
            _ => base,
        };
    }
    match role {
        Role::Default => base,
        Role::BoxTitle => base.fg(Color::Blue).add_modifier(Modifier::BOLD),
        Role::Header => Style::default().bg(Color::Cyan).fg(Color::Black),
        Role::Selected => Style::default().bg(Color::Green).fg(Color::Black),
        Role::Number => base.fg(Color::Yellow).add_modifier(Modifier::BOLD),
        Role::Directory => base.fg(Color::Blue).add_modifier(Modifier::BOLD),
        Role::Flag => base.fg(Color::Red),
        Role::Error => base.fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

/// Shorten `text` to `width` columns by replacing its middle with `...`.
pub fn crop_str(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len <= width {
        return text.to_string();
    }
    if width < 4 {
        return text.chars().take(width).collect();
    }
    let head = width / 2 - 1;
    let tail = width - head - 3;
    let mut out: String = text.chars().take(head).collect();
    out.push_str("...");
    out.extend(text.chars().skip(len - tail));
    out
}

/// A `height` x `width` rectangle centered in `area`, clamped to fit.
pub fn centered_rect(area: Rect, height: u16, width: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Clear a centered box, draw its border and title and return the whole box area.
pub fn draw_box(frame: &mut Frame, theme: Theme, height: u16, width: u16, title: &str) -> Rect {
    let area = centered_rect(frame.area(), height, width);
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(format!(" {title} "), style(theme, Role::BoxTitle)))
        .style(style(theme, Role::Default));
    frame.render_widget(block, area);
    area
}

/// Write `text` at `(row, col)` relative to `area`, clipped to its width.
pub fn put(frame: &mut Frame, area: Rect, row: u16, col: u16, text: &str, style: Style) {
    if row >= area.height || col >= area.width {
        return;
    }
    let line = Rect {
        x: area.x + col,
        y: area.y + row,
        width: area.width - col,
        height: 1,
    };
    frame.render_widget(Span::styled(text.to_string(), style), line);
}
