use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    Enter,
    Back,
    ShowHelp,
    Refresh,
    StartCommand,
    StartFilter,
    ShowDescription,
    ShowEvents,
    ShowLogs,
    TailLogs,
    ShowMetrics,
    ShowAutoScaling,
    ShowRevisions,
    ToggleFullScreen,
    OpenShell,
    OpenTaskDefinition,
    OpenDeployments,
    OpenInstances,
    UpdateService,
    StopTask,
    PortForward,
    TerminateSessions,
    EditTaskDefinition,
    SubmitInput,
    CompleteInput,
    CancelInput,
    Backspace,
    InputChar(char),
    NextField,
    PrevField,
    CycleLeft,
    CycleRight,
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    match mode {
        InputMode::Normal => map_normal_mode_key(key),
        InputMode::Command | InputMode::Filter => map_input_mode_key(key),
        InputMode::Form => map_form_mode_key(key),
    }
}

fn map_normal_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::Refresh)
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::PageDown)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::PageUp),
        _ if key.modifiers.contains(KeyModifiers::CONTROL) => None,
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Action::Bottom),
        KeyCode::Enter => Some(Action::Enter),
        KeyCode::Esc | KeyCode::Char('b') | KeyCode::Backspace => Some(Action::Back),
        KeyCode::Char('?') => Some(Action::ShowHelp),
        KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char(':') => Some(Action::StartCommand),
        KeyCode::Char('/') => Some(Action::StartFilter),
        KeyCode::Char('d') => Some(Action::ShowDescription),
        KeyCode::Char('w') => Some(Action::ShowEvents),
        KeyCode::Char('l') => Some(Action::ShowLogs),
        KeyCode::Char('L') => Some(Action::TailLogs),
        KeyCode::Char('m') => Some(Action::ShowMetrics),
        KeyCode::Char('a') => Some(Action::ShowAutoScaling),
        KeyCode::Char('r') => Some(Action::ShowRevisions),
        KeyCode::Char('f') => Some(Action::ToggleFullScreen),
        KeyCode::Char('s') => Some(Action::OpenShell),
        KeyCode::Char('t') => Some(Action::OpenTaskDefinition),
        KeyCode::Char('D') => Some(Action::OpenDeployments),
        KeyCode::Char('i') => Some(Action::OpenInstances),
        KeyCode::Char('U') => Some(Action::UpdateService),
        KeyCode::Char('S') => Some(Action::StopTask),
        KeyCode::Char('F') => Some(Action::PortForward),
        KeyCode::Char('T') => Some(Action::TerminateSessions),
        KeyCode::Char('E') => Some(Action::EditTaskDefinition),
        _ => None,
    }
}

fn map_input_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Char('m') | KeyCode::Char('j')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(Action::SubmitInput)
        }
        KeyCode::Tab => Some(Action::CompleteInput),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

fn map_form_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Tab | KeyCode::Down => Some(Action::NextField),
        KeyCode::BackTab | KeyCode::Up => Some(Action::PrevField),
        KeyCode::Left => Some(Action::CycleLeft),
        KeyCode::Right => Some(Action::CycleRight),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}
