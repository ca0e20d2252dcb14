use crate::app::ModeKind;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,
    NextTab,
    PrevTab,
    SelectTab(usize),
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    Refresh,
    Start,
    Stop,
    Restart,
    Console,
    ShowLogs,
    Inspect,
    OpenPorts,
    Delete,
    OpenFilter,
    RunImage,
    PullImage,
    Back,
    Submit,
    ToggleChoice,
    ConfirmYes,
    ConfirmNo,
    NextField,
    PrevField,
    Backspace,
    InputChar(char),
}

impl Action {
    /// Read-only movement that stays available while an action runs.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::Down
                | Self::Up
                | Self::PageDown
                | Self::PageUp
                | Self::Top
                | Self::Bottom
                | Self::NextTab
                | Self::PrevTab
                | Self::SelectTab(_)
        )
    }
}

pub fn map_key(mode: ModeKind, key: KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }

    match mode {
        ModeKind::List => map_list_key(key),
        ModeKind::Logs | ModeKind::Inspect => map_text_view_key(key),
        ModeKind::PortSelector | ModeKind::Filter => map_picker_key(key),
        ModeKind::DeleteConfirm => map_confirm_key(key),
        ModeKind::RunResource | ModeKind::Pull => map_form_key(key),
    }
}

fn map_global_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') if key.modifiers.is_empty() => Some(Action::Quit),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        _ => None,
    }
}

fn map_scroll_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('j') if key.modifiers.is_empty() => Some(Action::Down),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') if key.modifiers.is_empty() => Some(Action::Up),
        KeyCode::Up => Some(Action::Up),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::PageDown)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::PageUp),
        KeyCode::Char('g') if key.modifiers.is_empty() => Some(Action::Top),
        KeyCode::Home => Some(Action::Top),
        KeyCode::Char('G') => Some(Action::Bottom),
        KeyCode::End => Some(Action::Bottom),
        _ => None,
    }
}

fn map_list_key(key: KeyEvent) -> Option<Action> {
    if let Some(action) = map_global_key(key).or_else(|| map_scroll_key(key)) {
        return Some(action);
    }

    match key.code {
        KeyCode::Tab | KeyCode::Right => Some(Action::NextTab),
        KeyCode::BackTab | KeyCode::Left => Some(Action::PrevTab),
        KeyCode::Char(c @ '1'..='4') if key.modifiers.is_empty() => {
            Some(Action::SelectTab(c as usize - '1' as usize))
        }
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('s') if key.modifiers.is_empty() => Some(Action::Start),
        KeyCode::Char('x') if key.modifiers.is_empty() => Some(Action::Stop),
        KeyCode::Char('R') => Some(Action::Restart),
        KeyCode::Char('c') if key.modifiers.is_empty() => Some(Action::Console),
        KeyCode::Char('L') => Some(Action::ShowLogs),
        KeyCode::Char('i') if key.modifiers.is_empty() => Some(Action::Inspect),
        KeyCode::Char('o') if key.modifiers.is_empty() => Some(Action::OpenPorts),
        KeyCode::Char('d') if key.modifiers.is_empty() => Some(Action::Delete),
        KeyCode::Delete => Some(Action::Delete),
        KeyCode::Char('f') if key.modifiers.is_empty() => Some(Action::OpenFilter),
        KeyCode::Char('n') if key.modifiers.is_empty() => Some(Action::RunImage),
        KeyCode::Char('p') if key.modifiers.is_empty() => Some(Action::PullImage),
        KeyCode::Esc => Some(Action::Back),
        _ => None,
    }
}

fn map_text_view_key(key: KeyEvent) -> Option<Action> {
    if let Some(action) = map_global_key(key).or_else(|| map_scroll_key(key)) {
        return Some(action);
    }

    match key.code {
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Char('r') if key.modifiers.is_empty() => Some(Action::Refresh),
        _ => None,
    }
}

fn map_picker_key(key: KeyEvent) -> Option<Action> {
    if let Some(action) = map_global_key(key) {
        return Some(action);
    }

    match key.code {
        KeyCode::Down => Some(Action::Down),
        KeyCode::Char('j') if key.modifiers.is_empty() => Some(Action::Down),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Char('k') if key.modifiers.is_empty() => Some(Action::Up),
        KeyCode::Enter => Some(Action::Submit),
        KeyCode::Esc => Some(Action::Back),
        _ => None,
    }
}

fn map_confirm_key(key: KeyEvent) -> Option<Action> {
    if let Some(action) = map_global_key(key) {
        return Some(action);
    }

    match key.code {
        KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
            Some(Action::ToggleChoice)
        }
        KeyCode::Char('h') | KeyCode::Char('l') if key.modifiers.is_empty() => {
            Some(Action::ToggleChoice)
        }
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::ConfirmYes),
        KeyCode::Char('n') | KeyCode::Char('N') => Some(Action::ConfirmNo),
        KeyCode::Enter => Some(Action::Submit),
        KeyCode::Esc => Some(Action::Back),
        _ => None,
    }
}

/// Text fields take every printable key, so only ctrl+c stays global here.
fn map_form_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Enter => Some(Action::Submit),
        KeyCode::Tab | KeyCode::Down => Some(Action::NextField),
        KeyCode::BackTab | KeyCode::Up => Some(Action::PrevField),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}
