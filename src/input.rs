//! Key bindings and mouse mapping.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shuffle,
    Restart,
    Pause,
    Quit,
    None,
}

/// Map key event to game action.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p' | 'P') => Action::Pause,
        KeyCode::Char('s' | 'S') | KeyCode::Tab => Action::Shuffle,
        KeyCode::Char('r' | 'R') => Action::Restart,
        _ => Action::None,
    }
}

/// Left-button pointer stream in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press { column: u16, row: u16 },
    Move { column: u16, row: u16 },
    Release,
}

/// Only the left button drives chains; everything else is ignored.
pub fn pointer_from_mouse(event: MouseEvent) -> Option<PointerEvent> {
    let MouseEvent {
        kind, column, row, ..
    } = event;
    match kind {
        MouseEventKind::Down(MouseButton::Left) => Some(PointerEvent::Press { column, row }),
        MouseEventKind::Drag(MouseButton::Left) => Some(PointerEvent::Move { column, row }),
        MouseEventKind::Up(MouseButton::Left) => Some(PointerEvent::Release),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn mouse(kind: MouseEventKind) -> MouseEvent {
        MouseEvent {
            kind,
            column: 7,
            row: 3,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_keys() {
        assert_eq!(key_to_action(key(KeyCode::Char('q'), KeyModifiers::NONE)), Action::Quit);
        assert_eq!(key_to_action(key(KeyCode::Esc, KeyModifiers::NONE)), Action::Quit);
        assert_eq!(key_to_action(key(KeyCode::Char('c'), KeyModifiers::CONTROL)), Action::Quit);
        assert_eq!(key_to_action(key(KeyCode::Char('S'), KeyModifiers::SHIFT)), Action::Shuffle);
        assert_eq!(key_to_action(key(KeyCode::Char('r'), KeyModifiers::NONE)), Action::Restart);
        assert_eq!(key_to_action(key(KeyCode::Char('p'), KeyModifiers::NONE)), Action::Pause);
        assert_eq!(key_to_action(key(KeyCode::Char('r'), KeyModifiers::ALT)), Action::None);
        assert_eq!(key_to_action(key(KeyCode::Left, KeyModifiers::NONE)), Action::None);
    }

    #[test]
    fn test_key_event_kind_is_not_inspected() {
        let mut k = key(KeyCode::Char('s'), KeyModifiers::NONE);
        k.kind = KeyEventKind::Repeat;
        assert_eq!(key_to_action(k), Action::Shuffle);
    }

    #[test]
    fn test_left_button_stream() {
        assert_eq!(
            pointer_from_mouse(mouse(MouseEventKind::Down(MouseButton::Left))),
            Some(PointerEvent::Press { column: 7, row: 3 })
        );
        assert_eq!(
            pointer_from_mouse(mouse(MouseEventKind::Drag(MouseButton::Left))),
            Some(PointerEvent::Move { column: 7, row: 3 })
        );
        assert_eq!(
            pointer_from_mouse(mouse(MouseEventKind::Up(MouseButton::Left))),
            Some(PointerEvent::Release)
        );
    }

    #[test]
    fn test_other_mouse_events_ignored() {
        assert_eq!(pointer_from_mouse(mouse(MouseEventKind::Down(MouseButton::Right))), None);
        assert_eq!(pointer_from_mouse(mouse(MouseEventKind::Moved)), None);
        assert_eq!(pointer_from_mouse(mouse(MouseEventKind::ScrollUp)), None);
    }
}
