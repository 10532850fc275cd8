//! Markdown to styled terminal lines, for rendering model replies.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// Render markdown into lines: paragraphs separated by a blank line, bullet and numbered
/// lists indented by nesting depth, headings and emphasis styled.
pub fn render_markdown(content: &str) -> Vec<Line<'static>> {
    let mut renderer = Renderer::default();
    for event in Parser::new_ext(content, Options::ENABLE_STRIKETHROUGH) {
        renderer.push(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    // One entry per open list: next number for ordered lists, None for bullets
    lists: Vec<Option<u64>>,
    in_code_block: bool,
}

impl Renderer {
    fn push(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) if self.in_code_block => {
                let style = Style::default().fg(Color::Yellow);
                for line in text.lines() {
                    self.lines.push(Line::from(Span::styled(format!("  {}", line), style)));
                }
            }
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                let style = self.style();
                self.current.push(Span::styled(text.into_string(), style));
            }
            Event::Code(code) => {
                self.current
                    .push(Span::styled(code.into_string(), Style::default().fg(Color::Yellow)));
            }
            Event::SoftBreak => self.current.push(Span::raw(" ")),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.separate();
                self.lines.push(Line::from(Span::styled(
                    "────────",
                    Style::default().fg(Color::DarkGray),
                )));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                // Inside a list item the marker is already on the current line
                if self.lists.is_empty() {
                    self.separate();
                }
            }
            Tag::Heading { .. } => {
                self.separate();
                self.styles
                    .push(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
            }
            Tag::BlockQuote(_) => {
                self.separate();
                self.styles.push(Style::default().fg(Color::DarkGray));
            }
            Tag::CodeBlock(_) => {
                self.separate();
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.separate();
                } else {
                    self.flush();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.current.push(Span::raw(format!("{}{}", indent, marker)));
            }
            Tag::Emphasis => self.styles.push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.styles.push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.styles.push(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Item => self.flush(),
            TagEnd::Heading(_) | TagEnd::BlockQuote(_) => {
                self.flush();
                self.styles.pop();
            }
            TagEnd::CodeBlock => self.in_code_block = false,
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            _ => {}
        }
    }

    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default(), |acc, style| acc.patch(*style))
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    /// Close the current line and leave one blank line before the next block
    fn separate(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        self.lines
    }
}
