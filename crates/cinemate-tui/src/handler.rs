use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Reply { id, result } => app.on_reply(id, result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Popups take every key while open
    if app.show_credential_input {
        handle_credential_input(app, key);
        return;
    }
    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Start typing
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.draft_cursor = app.controller.draft().chars().count();
        }

        // Chat / quiz
        KeyCode::Char('m') => app.toggle_mode(),

        // Quick prompts
        KeyCode::Char(c @ '1'..='9') => {
            let index = (c as usize) - ('1' as usize);
            app.quick_prompt(index);
        }

        // Popups
        KeyCode::Char('K') => app.open_credential_input(),
        KeyCode::Char('M') => app.open_model_picker(),

        // Chat scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }
        KeyCode::PageDown => app.scroll_half_page_down(),
        KeyCode::PageUp => app.scroll_half_page_up(),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_to_top(),
        KeyCode::Char('G') | KeyCode::End => app.scroll_chat_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('t') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.toggle_mode();
        return;
    }

    let mut draft = app.controller.draft().to_string();

    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            return;
        }
        KeyCode::Enter => {
            // Submit is disabled while the draft is empty
            if !draft.is_empty() {
                app.submit_draft();
                app.draft_cursor = app.controller.draft().chars().count();
                app.input_mode = InputMode::Normal;
            }
            return;
        }
        KeyCode::Backspace => {
            if app.draft_cursor > 0 {
                app.draft_cursor -= 1;
                let byte_pos = char_to_byte_index(&draft, app.draft_cursor);
                draft.remove(byte_pos);
            } else {
                return;
            }
        }
        KeyCode::Delete => {
            let char_count = draft.chars().count();
            if app.draft_cursor < char_count {
                let byte_pos = char_to_byte_index(&draft, app.draft_cursor);
                draft.remove(byte_pos);
            } else {
                return;
            }
        }
        KeyCode::Left => {
            app.draft_cursor = app.draft_cursor.saturating_sub(1);
            return;
        }
        KeyCode::Right => {
            let char_count = draft.chars().count();
            app.draft_cursor = (app.draft_cursor + 1).min(char_count);
            return;
        }
        KeyCode::Home => {
            app.draft_cursor = 0;
            return;
        }
        KeyCode::End => {
            app.draft_cursor = draft.chars().count();
            return;
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&draft, app.draft_cursor);
            draft.insert(byte_pos, c);
            app.draft_cursor += 1;
        }
        _ => return,
    }

    app.controller.set_draft(draft);
}

fn handle_credential_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_credential_input(),
        KeyCode::Enter => app.confirm_credential(),
        KeyCode::Backspace => {
            if app.credential_cursor > 0 {
                app.credential_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.credential_input, app.credential_cursor);
                app.credential_input.remove(byte_pos);
            }
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.credential_input, app.credential_cursor);
            app.credential_input.insert(byte_pos, c);
            app.credential_cursor += 1;
        }
        KeyCode::Left => {
            app.credential_cursor = app.credential_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.credential_input.chars().count();
            app.credential_cursor = (app.credential_cursor + 1).min(char_count);
        }
        _ => {}
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_model_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.model_picker_nav_down();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.model_picker_nav_up();
        }
        KeyCode::Enter => {
            app.select_model();
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);

    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
