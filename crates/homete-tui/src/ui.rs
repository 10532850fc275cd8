use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use homete_core::ChatEntry;
use unicode_width::UnicodeWidthChar;

use crate::app::{App, InputMode};
use crate::markdown::render_markdown;

pub fn render<G>(app: &mut App<G>, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.input_mode == InputMode::ImagePicker {
        render_image_picker(app, frame, area);
    }
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" homete ", Style::default().fg(Color::Magenta).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

/// Transcript lines: a role label, the entry body, then a blank line
fn transcript_lines<G>(app: &App<G>) -> Vec<Line<'static>> {
    let user_label = Line::from(Span::styled(
        "You:",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ));
    let reply_label = Line::from(Span::styled(
        "homete:",
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
    ));

    let mut lines: Vec<Line<'static>> = Vec::new();
    for entry in app.controller.entries() {
        match entry {
            ChatEntry::UserText(text) => {
                lines.push(user_label.clone());
                lines.extend(text.lines().map(|line| Line::from(line.to_string())));
            }
            ChatEntry::UserImage(image) => {
                lines.push(user_label.clone());
                lines.push(Line::from(vec![
                    Span::styled("[image] ", Style::default().fg(Color::Magenta)),
                    Span::styled(image.display_name(), Style::default().underlined()),
                ]));
            }
            ChatEntry::Loading => {
                lines.push(reply_label.clone());
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
            ChatEntry::System(content) => {
                lines.push(reply_label.clone());
                lines.extend(render_markdown(content));
            }
        }
        lines.push(Line::default());
    }
    lines
}

/// The part of `text` that fits in `width` columns with the cursor kept in view,
/// and the cursor's column within it. Widths are display columns, so
/// full-width characters count twice.
fn visible_window(text: &str, cursor: usize, width: usize) -> (String, u16) {
    if width == 0 {
        return (String::new(), 0);
    }

    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());
    let char_width = |c: &char| c.width().unwrap_or(0);

    // Drop leading characters until the text before the cursor plus the cursor cell fits
    let mut start = 0;
    let mut before_cursor: usize = chars[..cursor].iter().map(char_width).sum();
    while start < cursor && before_cursor + 1 > width {
        before_cursor -= char_width(&chars[start]);
        start += 1;
    }

    let mut used = 0;
    let visible: String = chars[start..]
        .iter()
        .take_while(|c| {
            used += char_width(*c);
            used <= width
        })
        .collect();

    (visible, before_cursor as u16)
}

fn render_chat<G>(app: &mut App<G>, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner_width = area.width.saturating_sub(2);
    app.chat_height = area.height.saturating_sub(2);

    let text = if app.controller.is_empty() {
        Text::from(Span::styled(
            "Say anything and get praised. Ctrl+O sends an image.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(transcript_lines(app))
    };

    let chat = Paragraph::new(text).wrap(Wrap { trim: false });

    // Count rows with the same word wrapping used to draw, before the borders are added
    let total_rows = u16::try_from(chat.line_count(inner_width)).unwrap_or(u16::MAX);
    app.chat_max_scroll = total_rows.saturating_sub(app.chat_height);
    if app.follow_tail {
        app.chat_scroll = app.chat_max_scroll;
    } else {
        app.chat_scroll = app.chat_scroll.min(app.chat_max_scroll);
    }

    let chat = chat.block(block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input<G>(app: &App<G>, frame: &mut Frame, area: Rect) {
    let pending = app.controller.is_pending();
    let (title, border_color) = if pending {
        (" Waiting for a reply... ", Color::DarkGray)
    } else if app.input_mode == InputMode::Editing {
        (" Message (Enter to send) ", Color::Yellow)
    } else {
        (" Message ", Color::DarkGray)
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = visible_window(&app.input, app.cursor, inner_width);

    let text_color = if pending { Color::DarkGray } else { Color::Cyan };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor only while the box accepts input
    if app.input_mode == InputMode::Editing && !pending {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer<G>(app: &App<G>, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Ctrl+O ", key_style),
            Span::styled(" image ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::ImagePicker => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send image ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ],
    };

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_image_picker<G>(app: &App<G>, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 70.min(area.width.saturating_sub(4));
    let popup_height = 6;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    // Short terminals get a truncated popup rather than drawing past the frame
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height).intersection(area);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Send an image ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);
    if inner.height == 0 {
        return;
    }

    // Without room for the instructions the path field takes the first row
    let input_row = if inner.height >= 3 {
        let instructions = Paragraph::new("Type or drop an image path (jpg, png, webp, gif, bmp).")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));
        inner.y + 2
    } else {
        inner.y
    };

    // Input field, scrolled to keep the cursor visible
    let input_area = Rect::new(inner.x, input_row, inner.width, 1);
    let (visible, cursor_x) = visible_window(
        &app.image_path_input,
        app.image_path_cursor,
        input_area.width as usize,
    );

    frame.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
        input_area,
    );
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}
