use super::event::UiEvent;
use super::state::Tab;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

const FAST_SEEK: i64 = 10;

/// Maps a key press to a UI event. Chart keys are single letters; on the chat
/// tab letters are typed into the input instead.
pub fn key_to_event(tab: Tab, key: KeyEvent) -> Option<UiEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UiEvent::Quit);
    }
    if key.code == KeyCode::Tab || key.code == KeyCode::BackTab {
        return Some(UiEvent::SwitchTab);
    }

    match tab {
        Tab::Chart => chart_key(key),
        Tab::Chat => chat_key(key),
    }
}

fn chart_key(key: KeyEvent) -> Option<UiEvent> {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let seek = if shift { FAST_SEEK } else { 1 };
    match key.code {
        KeyCode::Char(' ') => Some(UiEvent::PlayPause),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(UiEvent::Reset),
        KeyCode::Left => Some(UiEvent::Seek { delta: -seek }),
        KeyCode::Right => Some(UiEvent::Seek { delta: seek }),
        KeyCode::Home => Some(UiEvent::SeekStart),
        KeyCode::End => Some(UiEvent::SeekEnd),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(UiEvent::StepSizeChanged { delta: 1 }),
        KeyCode::Char('-') | KeyCode::Char('_') => Some(UiEvent::StepSizeChanged { delta: -1 }),
        KeyCode::Char('l') | KeyCode::Char('L') => Some(UiEvent::ReloadData),
        KeyCode::Char('q') | KeyCode::Char('Q') => Some(UiEvent::Quit),
        _ => None,
    }
}

fn chat_key(key: KeyEvent) -> Option<UiEvent> {
    match key.code {
        KeyCode::Enter => Some(UiEvent::Submit),
        KeyCode::Esc => Some(UiEvent::InputClear),
        KeyCode::Backspace => Some(UiEvent::InputBackspace),
        KeyCode::F(n @ 1..=6) => Some(UiEvent::ExampleQuestion {
            index: (n - 1) as usize,
        }),
        KeyCode::PageUp => Some(UiEvent::ScrollChat { delta: 5 }),
        KeyCode::PageDown => Some(UiEvent::ScrollChat { delta: -5 }),
        KeyCode::Up => Some(UiEvent::ScrollChat { delta: 1 }),
        KeyCode::Down => Some(UiEvent::ScrollChat { delta: -1 }),
        KeyCode::Char(ch) => Some(UiEvent::InputChar { ch }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn chart_keys() {
        assert_eq!(key_to_event(Tab::Chart, key(KeyCode::Char(' '))), Some(UiEvent::PlayPause));
        assert_eq!(
            key_to_event(Tab::Chart, key(KeyCode::Left)),
            Some(UiEvent::Seek { delta: -1 })
        );
        assert_eq!(
            key_to_event(Tab::Chart, KeyEvent::new(KeyCode::Right, KeyModifiers::SHIFT)),
            Some(UiEvent::Seek { delta: 10 })
        );
        assert_eq!(key_to_event(Tab::Chart, key(KeyCode::Char('q'))), Some(UiEvent::Quit));
        assert_eq!(key_to_event(Tab::Chart, key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn letters_type_on_the_chat_tab() {
        assert_eq!(
            key_to_event(Tab::Chat, key(KeyCode::Char('q'))),
            Some(UiEvent::InputChar { ch: 'q' })
        );
        assert_eq!(
            key_to_event(Tab::Chat, key(KeyCode::F(3))),
            Some(UiEvent::ExampleQuestion { index: 2 })
        );
        assert_eq!(key_to_event(Tab::Chat, key(KeyCode::F(7))), None);
    }

    #[test]
    fn ctrl_c_and_tab_work_everywhere() {
        for tab in [Tab::Chart, Tab::Chat] {
            assert_eq!(
                key_to_event(tab, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
                Some(UiEvent::Quit)
            );
            assert_eq!(key_to_event(tab, key(KeyCode::Tab)), Some(UiEvent::SwitchTab));
        }
    }
}
