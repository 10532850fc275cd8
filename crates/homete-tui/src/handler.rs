use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use homete_core::Gateway;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event<G>(app: &mut App<G>, event: AppEvent) -> Result<()>
where
    G: Gateway + Clone + Send + Sync + 'static,
{
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }

    // Pick up a finished exchange on every event, not just ticks
    app.poll_exchange().await;
    Ok(())
}

fn handle_key<G>(app: &mut App<G>, key: KeyEvent)
where
    G: Gateway + Clone + Send + Sync + 'static,
{
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Editing => handle_editing(app, key),
        InputMode::ImagePicker => handle_image_picker(app, key),
    }
}

fn handle_editing<G>(app: &mut App<G>, key: KeyEvent)
where
    G: Gateway + Clone + Send + Sync + 'static,
{
    // Scrolling and quitting work while a reply is pending
    match key.code {
        KeyCode::Esc => {
            app.should_quit = true;
            return;
        }
        KeyCode::PageUp => {
            app.scroll_page_up();
            return;
        }
        KeyCode::PageDown => {
            app.scroll_page_down();
            return;
        }
        KeyCode::Up => {
            app.scroll_up(1);
            return;
        }
        KeyCode::Down => {
            app.scroll_down(1);
            return;
        }
        _ => {}
    }

    // Input is disabled while an exchange is in flight
    if app.is_pending() {
        return;
    }

    match key.code {
        // Only a plain Enter sends; modified Enter is left alone
        KeyCode::Enter if key.modifiers.is_empty() => app.submit_text(),
        KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.open_image_picker();
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn handle_image_picker<G>(app: &mut App<G>, key: KeyEvent)
where
    G: Gateway + Clone + Send + Sync + 'static,
{
    match key.code {
        KeyCode::Esc => app.close_image_picker(),
        KeyCode::Enter if key.modifiers.is_empty() => app.submit_image(),
        KeyCode::Backspace => {
            if app.image_path_cursor > 0 {
                app.image_path_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.image_path_input, app.image_path_cursor);
                app.image_path_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.image_path_cursor = app.image_path_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.image_path_input.chars().count();
            app.image_path_cursor = (app.image_path_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.image_path_cursor = 0;
        }
        KeyCode::End => {
            app.image_path_cursor = app.image_path_input.chars().count();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(&app.image_path_input, app.image_path_cursor);
            app.image_path_input.insert(byte_pos, c);
            app.image_path_cursor += 1;
        }
        _ => {}
    }
}

/// Insert pasted text at the cursor. Line breaks become spaces so a paste never sends.
fn handle_paste<G>(app: &mut App<G>, text: &str) {
    let cleaned: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    let (buffer, cursor) = match app.input_mode {
        InputMode::Editing if !app.controller.is_pending() => (&mut app.input, &mut app.cursor),
        InputMode::ImagePicker => (&mut app.image_path_input, &mut app.image_path_cursor),
        _ => return,
    };

    let byte_pos = char_to_byte_index(buffer, *cursor);
    buffer.insert_str(byte_pos, &cleaned);
    *cursor += cleaned.chars().count();
}

fn handle_mouse<G>(app: &mut App<G>, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
