//! Form field widgets used by the wizard screens.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};
use tui_textarea::TextArea;

/// One interactive field on a wizard step.
pub enum FormField {
    /// Single-line text input
    TextInput {
        value: String,
        cursor_pos: usize,
        placeholder: String,
    },
    /// Multi-line text input using tui-textarea (abi json, bytecode, solc
    /// output)
    TextArea {
        textarea: Box<TextArea<'static>>,
        placeholder: String,
    },
    /// Selection from a fixed set of options (owner account, input type,
    /// solc contract)
    Select {
        options: Vec<String>,
        selected: usize,
        list_state: ListState,
    },
}

impl FormField {
    pub fn text_input(placeholder: impl Into<String>) -> Self {
        FormField::TextInput {
            value: String::new(),
            cursor_pos: 0,
            placeholder: placeholder.into(),
        }
    }

    pub fn text_area(placeholder: impl Into<String>) -> Self {
        FormField::TextArea {
            textarea: Box::new(TextArea::default()),
            placeholder: placeholder.into(),
        }
    }

    pub fn select(options: Vec<String>) -> Self {
        let mut list_state = ListState::default();
        if !options.is_empty() {
            list_state.select(Some(0));
        }
        FormField::Select {
            options,
            selected: 0,
            list_state,
        }
    }

    /// Current value as a string (selected option text for `Select`).
    pub fn value(&self) -> String {
        match self {
            FormField::TextInput { value, .. } => value.clone(),
            FormField::TextArea { textarea, .. } => textarea.lines().join("\n"),
            FormField::Select {
                options, selected, ..
            } => options.get(*selected).cloned().unwrap_or_default(),
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        match self {
            FormField::Select {
                options, selected, ..
            } if !options.is_empty() => Some(*selected),
            _ => None,
        }
    }

    pub fn set_value(&mut self, new_value: &str) {
        match self {
            FormField::TextInput {
                value, cursor_pos, ..
            } => {
                *value = new_value.to_string();
                *cursor_pos = value.len();
            }
            FormField::TextArea { textarea, .. } => {
                textarea.select_all();
                textarea.cut();
                textarea.insert_str(new_value);
            }
            FormField::Select {
                options,
                selected,
                list_state,
            } => {
                if let Some(idx) = options.iter().position(|o| o == new_value) {
                    *selected = idx;
                    list_state.select(Some(idx));
                }
            }
        }
    }

    pub fn set_options(&mut self, new_options: Vec<String>) {
        if let FormField::Select {
            options,
            selected,
            list_state,
        } = self
        {
            *options = new_options;
            *selected = 0;
            list_state.select(if options.is_empty() { None } else { Some(0) });
        }
    }

    /// Whether Enter inserts content instead of submitting the step.
    pub fn is_multiline(&self) -> bool {
        matches!(self, FormField::TextArea { .. })
    }

    /// Handle a key event. Returns true if the field changed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self {
            FormField::TextInput {
                value, cursor_pos, ..
            } => match key.code {
                KeyCode::Char(c) => {
                    value.insert(*cursor_pos, c);
                    *cursor_pos += c.len_utf8();
                    true
                }
                KeyCode::Backspace => {
                    if *cursor_pos > 0 {
                        let prev = value[..*cursor_pos]
                            .chars()
                            .next_back()
                            .map_or(0, char::len_utf8);
                        *cursor_pos -= prev;
                        value.remove(*cursor_pos);
                        true
                    } else {
                        false
                    }
                }
                KeyCode::Delete => {
                    if *cursor_pos < value.len() {
                        value.remove(*cursor_pos);
                        true
                    } else {
                        false
                    }
                }
                KeyCode::Left => {
                    if *cursor_pos > 0 {
                        *cursor_pos -= value[..*cursor_pos]
                            .chars()
                            .next_back()
                            .map_or(0, char::len_utf8);
                    }
                    false
                }
                KeyCode::Right => {
                    if *cursor_pos < value.len() {
                        *cursor_pos += value[*cursor_pos..]
                            .chars()
                            .next()
                            .map_or(0, char::len_utf8);
                    }
                    false
                }
                KeyCode::Home => {
                    *cursor_pos = 0;
                    false
                }
                KeyCode::End => {
                    *cursor_pos = value.len();
                    false
                }
                _ => false,
            },
            FormField::TextArea { textarea, .. } => textarea.input(key),
            FormField::Select {
                options,
                selected,
                list_state,
            } => match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    if *selected > 0 {
                        *selected -= 1;
                        list_state.select(Some(*selected));
                        return true;
                    }
                    false
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if *selected < options.len().saturating_sub(1) {
                        *selected += 1;
                        list_state.select(Some(*selected));
                        return true;
                    }
                    false
                }
                _ => false,
            },
        }
    }

    /// Height in rows this field wants inside the step layout.
    pub fn render_height(&self) -> u16 {
        match self {
            FormField::TextInput { .. } => 1,
            FormField::TextArea { .. } => 6,
            FormField::Select { options, .. } => (options.len() as u16).clamp(1, 5),
        }
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, focused: bool) {
        match self {
            FormField::TextInput {
                value,
                cursor_pos,
                placeholder,
            } => {
                let content = if value.is_empty() && !focused {
                    Line::from(Span::styled(
                        placeholder.as_str(),
                        Style::default().fg(Color::DarkGray),
                    ))
                } else {
                    let mut text = value.clone();
                    if focused {
                        if *cursor_pos < text.len() {
                            text.insert(*cursor_pos, '|');
                        } else {
                            text.push('|');
                        }
                    }
                    Line::from(text)
                };

                let para = Paragraph::new(content).style(Style::default().fg(if focused {
                    Color::White
                } else {
                    Color::Gray
                }));
                frame.render_widget(para, area);
            }
            FormField::TextArea {
                textarea,
                placeholder,
            } => {
                textarea.set_cursor_line_style(Style::default());
                textarea.set_cursor_style(if focused {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                });
                if textarea.lines().iter().all(|l| l.is_empty()) {
                    textarea.set_placeholder_text(placeholder.clone());
                    textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
                }
                frame.render_widget(&**textarea, area);
            }
            FormField::Select {
                options,
                selected,
                list_state,
            } => {
                let items: Vec<ListItem> = options
                    .iter()
                    .enumerate()
                    .map(|(i, opt)| {
                        let style = if i == *selected {
                            Style::default().add_modifier(Modifier::BOLD)
                        } else {
                            Style::default().fg(Color::Gray)
                        };
                        ListItem::new(Span::styled(opt.clone(), style))
                    })
                    .collect();

                let list = List::new(items)
                    .highlight_style(
                        Style::default()
                            .add_modifier(Modifier::REVERSED)
                            .fg(Color::Cyan),
                    )
                    .highlight_symbol(if focused { "> " } else { "  " });

                frame.render_stateful_widget(list, area, list_state);
            }
        }
    }
}
