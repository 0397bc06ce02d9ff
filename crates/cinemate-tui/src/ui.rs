use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use cinemate_core::{ChatRole, Mode};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use crate::app::{App, InputMode};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            // Consume the second *
            chars.next();

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
                if found_close {
                    current_text.push_str("**");
                }
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    Line::from(spans)
}

fn role_label(role: ChatRole) -> Line<'static> {
    match role {
        ChatRole::User => Line::from(Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        ChatRole::Assistant => Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let banner_height = if app.controller.last_error().is_some() { 1 } else { 0 };

    let [header_area, chat_area, banner_area, prompts_area, input_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(banner_height),
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if banner_height > 0 {
        render_error_banner(app, frame, banner_area);
    }
    render_quick_prompts(app, frame, prompts_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_credential_input {
        render_credential_input(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mode = app.controller.mode();
    let mode_style = match mode {
        Mode::Chat => Style::default().bg(Color::Blue).fg(Color::White),
        Mode::Quiz => Style::default().bg(Color::Magenta).fg(Color::White),
    };

    let key_status = if app.controller.has_credential() {
        Span::styled(" key set ", Style::default().fg(Color::Green))
    } else {
        Span::styled(" no API key (K) ", Style::default().fg(Color::Red))
    };

    let title = Line::from(vec![
        Span::styled(" Cinemate ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", mode.label()), mode_style),
        Span::raw(" "),
        Span::styled(app.controller.model().to_string(), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        key_status,
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

/// The transcript as drawn inside the chat border. Scrolling measures this
/// same paragraph so the wrapped row count matches what is on screen.
pub(crate) fn chat_paragraph(app: &App) -> Paragraph<'static> {
    let mut lines: Vec<Line> = Vec::new();

    for msg in app.controller.messages() {
        lines.push(role_label(msg.role));
        for line in msg.content.split('\n') {
            match msg.role {
                ChatRole::User => lines.push(Line::from(line.to_string())),
                ChatRole::Assistant => lines.push(parse_markdown_line(line)),
            }
        }
        lines.push(Line::default());
    }

    if app.controller.is_loading() {
        lines.push(role_label(ChatRole::Assistant));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false })
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store areas for mouse hit-testing and scroll calculations (inner size minus borders)
    let height = area.height.saturating_sub(2);
    let width = area.width.saturating_sub(2);
    let resized = height != app.chat_height || width != app.chat_width;
    app.chat_area = Some(area);
    app.chat_height = height;
    app.chat_width = width;

    // Wrapping changes with the viewport, so re-follow the tail
    if resized {
        app.scroll_chat_to_bottom();
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let chat = chat_paragraph(app)
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_error_banner(app: &App, frame: &mut Frame, area: Rect) {
    let message = app.controller.last_error().unwrap_or_default();
    let banner = Paragraph::new(format!(" ! {} ", message))
        .style(Style::default().bg(Color::Red).fg(Color::White).add_modifier(Modifier::BOLD));
    frame.render_widget(banner, area);
}

fn render_quick_prompts(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.controller.is_loading();
    let key_style = if busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    };
    let label_style = if busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    let mut spans = Vec::new();
    for (i, prompt) in app.controller.quick_prompts().iter().enumerate() {
        spans.push(Span::styled(format!(" {} ", i + 1), key_style));
        spans.push(Span::styled(format!(" {}  ", prompt), label_style));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Quick prompts ");

    let bar = Paragraph::new(Line::from(spans))
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(bar, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message (i to type) ");

    let draft = app.controller.draft();

    if draft.is_empty() && !editing {
        let placeholder = Paragraph::new("Tell me what you feel like watching...")
            .style(Style::default().fg(Color::DarkGray))
            .block(input_block);
        frame.render_widget(placeholder, area);
        return;
    }

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = composer_view(draft, app.draft_cursor, inner_width);

    // Use cyan text to match the "You:" style - visible in both light and dark terminals
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(1)
}

/// Slice of the draft that fits `width` columns with the cursor kept in view,
/// plus the cursor's column inside that slice. `cursor` counts chars.
fn composer_view(draft: &str, cursor: usize, width: usize) -> (String, u16) {
    let chars: Vec<char> = draft.chars().collect();
    let cursor = cursor.min(chars.len());
    if width == 0 {
        return (String::new(), 0);
    }

    // Scroll right until the cursor cell itself fits
    let mut start = 0;
    let mut before: usize = chars[..cursor].iter().map(|&c| char_width(c)).sum();
    while start < cursor && before >= width {
        before -= char_width(chars[start]);
        start += 1;
    }

    let mut used = 0;
    let visible: String = chars[start..]
        .iter()
        .take_while(|&&c| {
            used += char_width(c);
            used <= width
        })
        .collect();

    (visible, before as u16)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let disabled_style = Style::default().bg(Color::Black).fg(Color::DarkGray);

    let hints = match app.input_mode {
        InputMode::Normal => {
            let quiz_hint = match app.controller.mode() {
                Mode::Chat => " quiz ",
                Mode::Quiz => " chat ",
            };
            vec![
                Span::styled(" i ", key_style),
                Span::styled(" type ", label_style),
                Span::styled(" 1-5 ", key_style),
                Span::styled(" quick ", label_style),
                Span::styled(" m ", key_style),
                Span::styled(quiz_hint, label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" K ", key_style),
                Span::styled(" API key ", label_style),
                Span::styled(" M ", key_style),
                Span::styled(" model ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ]
        }
        InputMode::Editing => {
            let send_style = if app.controller.draft().is_empty() {
                disabled_style
            } else {
                label_style
            };
            vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", send_style),
                Span::styled(" Ctrl+T ", key_style),
                Span::styled(" mode ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" stop typing ", label_style),
            ]
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 40.min(area.width.saturating_sub(4));
    let popup_height = (app.available_models.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model ");

    let current = app.controller.model().to_string();
    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let is_current = *model == current;
            let prefix = if is_current { "* " } else { "  " };
            let style = if is_current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{}", prefix, model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

/// Mask all but the last four characters of a secret
fn mask_secret(secret: &str) -> String {
    let len = secret.chars().count();
    if len == 0 {
        String::new()
    } else if len <= 4 {
        "*".repeat(len)
    } else {
        let masked_len = len - 4;
        let last_four: String = secret.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    }
}

/// Column of `cursor` (in chars of `secret`) within `mask_secret(secret)`
fn masked_cursor_column(secret: &str, cursor: usize) -> usize {
    let len = secret.chars().count();
    let cursor = cursor.min(len);
    if len <= 4 {
        return cursor;
    }

    let masked_len = len - 4;
    if cursor < masked_len {
        return cursor.min(20);
    }
    let tail: String = secret.chars().skip(masked_len).take(cursor - masked_len).collect();
    masked_len.min(20) + "...".len() + UnicodeWidthStr::width(tail.as_str())
}

fn render_credential_input(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 7;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Enter Gemini API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Kept in memory only. Enter to use, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    let instructions_area = Rect::new(inner.x, inner.y, inner.width, 1);
    frame.render_widget(instructions, instructions_area);

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let input = Paragraph::new(mask_secret(&app.credential_input))
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    // Show cursor, measured against the masked text that is displayed
    let cursor_x = masked_cursor_column(&app.credential_input, app.credential_cursor)
        .min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let char_count = format!("{} characters", app.credential_input.chars().count());
    let status = Paragraph::new(char_count).style(Style::default().fg(Color::DarkGray));
    let status_area = Rect::new(inner.x, inner.y + 4, inner.width, 1);
    frame.render_widget(status, status_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use cinemate_core::ChatMessage;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &mut App) -> String {
        draw_sized(app, 100, 30)
    }

    fn draw_sized(app: &mut App, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let mut out = String::new();
        for (i, cell) in buffer.content.iter().enumerate() {
            out.push_str(cell.symbol());
            if (i + 1) % width == 0 {
                out.push('\n');
            }
        }
        out
    }

    #[test]
    fn test_bold_markdown_is_styled() {
        let line = parse_markdown_line("Watch **Heat** tonight");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "Heat");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_unclosed_bold_stays_literal() {
        let line = parse_markdown_line("rated **5 stars");
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "rated **5 stars");
    }

    #[test]
    fn test_mask_secret_keeps_last_four() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("abcdefgh"), "****...efgh");
    }

    #[test]
    fn test_renders_welcome_and_header() {
        let (mut app, _rx) = test_app("unused");
        let screen = draw(&mut app);

        assert!(screen.contains("Cinemate"));
        assert!(screen.contains("CHAT"));
        assert!(screen.contains("AI:"));
        assert!(screen.contains("no API key"));
        assert!(!screen.contains("Thinking"));
    }

    #[test]
    fn test_renders_loading_and_error_states() {
        let (mut app, _rx) = test_app("unused");
        app.controller.append_message(ChatMessage::user("Any thrillers?"));
        app.controller.set_loading(true);
        app.controller.set_error("boom");
        app.sync();

        let screen = draw(&mut app);

        assert!(screen.contains("You:"));
        assert!(screen.contains("Any thrillers?"));
        assert!(screen.contains("Thinking."));
        assert!(screen.contains("! boom"));
    }

    #[test]
    fn test_credential_popup_is_masked() {
        let (mut app, _rx) = test_app("unused");
        app.open_credential_input();
        app.credential_input.push_str("supersecretvalue");
        app.credential_cursor = 16;

        let screen = draw(&mut app);

        assert!(screen.contains("...alue"));
        assert!(!screen.contains("supersecret"));
    }

    #[test]
    fn test_render_records_chat_viewport() {
        let (mut app, _rx) = test_app("unused");
        draw(&mut app);
        assert!(app.chat_area.is_some());
        assert!(app.chat_height > 0);
        assert_eq!(app.chat_width, 98);
    }

    #[test]
    fn test_follows_tail_with_wide_characters() {
        let (mut app, _rx) = test_app("unused");
        draw_sized(&mut app, 40, 20);

        for _ in 0..6 {
            app.controller.append_message(ChatMessage::assistant("推薦電影".repeat(12)));
        }
        app.controller.append_message(ChatMessage::user("LASTLINE"));
        app.sync();

        let screen = draw_sized(&mut app, 40, 20);
        assert!(screen.contains("LASTLINE"), "latest message scrolled out of view:\n{}", screen);
    }

    #[test]
    fn test_follows_tail_with_word_wrapping() {
        let (mut app, _rx) = test_app("unused");
        draw_sized(&mut app, 40, 20);

        for _ in 0..6 {
            app.controller.append_message(ChatMessage::assistant(
                "cinematographically extraordinary masterpieces ".repeat(3),
            ));
        }
        app.controller.append_message(ChatMessage::user("LASTLINE"));
        app.sync();

        let screen = draw_sized(&mut app, 40, 20);
        assert!(screen.contains("LASTLINE"), "latest message scrolled out of view:\n{}", screen);
    }

    #[test]
    fn test_resize_keeps_latest_message_visible() {
        let (mut app, _rx) = test_app("unused");
        for i in 0..8 {
            app.controller.append_message(ChatMessage::user(format!("message {} {}", i, "電影".repeat(10))));
        }
        app.controller.append_message(ChatMessage::user("LASTLINE"));
        app.sync();

        // First draw learns the real viewport
        let screen = draw_sized(&mut app, 40, 20);
        assert!(screen.contains("LASTLINE"));
    }

    #[test]
    fn test_line_count_matches_wide_wrapping() {
        let (mut app, _rx) = test_app("unused");
        app.chat_width = 10;
        let base = app.chat_line_count();

        // Ten double-width chars take two rows at width 10
        app.controller.append_message(ChatMessage::assistant("電影電影電影電影電影"));
        assert_eq!(app.chat_line_count(), base + 4);
    }

    #[test]
    fn test_composer_cursor_uses_display_width() {
        let (text, cursor) = composer_view("電影ab", 4, 20);
        assert_eq!(text, "電影ab");
        assert_eq!(cursor, 6);

        let (_, cursor) = composer_view("電影ab", 1, 20);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_composer_scrolls_to_keep_cursor_visible() {
        let draft = "電".repeat(10);
        let (text, cursor) = composer_view(&draft, 10, 8);
        // The cursor cell needs one free column after the visible chars
        assert!(cursor < 8);
        assert_eq!(UnicodeWidthStr::width(text.as_str()), 6);
        assert!(text.chars().all(|c| c == '電'));

        let (text, cursor) = composer_view("abc", 3, 8);
        assert_eq!((text.as_str(), cursor), ("abc", 3));
    }

    #[test]
    fn test_credential_cursor_tracks_masked_text() {
        let secret = "abcdefgh";
        assert_eq!(masked_cursor_column(secret, 8), mask_secret(secret).len());
        assert_eq!(masked_cursor_column(secret, 2), 2);
        assert_eq!(masked_cursor_column(secret, 5), 8);
        assert_eq!(masked_cursor_column("abc", 3), 3);

        let long = "k".repeat(40);
        assert_eq!(masked_cursor_column(&long, 40), mask_secret(&long).len());
        assert_eq!(masked_cursor_column(&long, 30), 20);
    }
}
