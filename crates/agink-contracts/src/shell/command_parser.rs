use super::command_registry::{
    Action, CommandSpec, MULTI_PATH_COMMANDS, NO_ARG_COMMANDS, RAW_ARG_COMMANDS,
};

/// One parsed line of interactive shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Noop,
    Help,
    Quit,
    Home,
    PromptMode,
    ImageMode,
    History,
    ClearHistory,
    Open(String),
    Theme(Option<String>),
    Key(Option<String>),
    ClearKey,
    About,
    Back,
    App(String),
    Plan(String),
    Tone(String),
    Style(String),
    Length(String),
    Generate,
    Add(Vec<String>),
    Remove(String),
    ClearImages,
    Analyze,
    Again,
    Unknown { command: String, arg: String },
    /// Free text; its meaning depends on the active step.
    Text(String),
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<Action> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn optional(arg: &str) -> Option<String> {
    if arg.is_empty() {
        None
    } else {
        Some(arg.to_string())
    }
}

fn command_for(action: Action, arg: &str) -> ShellCommand {
    let value = arg.to_string();
    match action {
        Action::Help => ShellCommand::Help,
        Action::Quit => ShellCommand::Quit,
        Action::Home => ShellCommand::Home,
        Action::PromptMode => ShellCommand::PromptMode,
        Action::ImageMode => ShellCommand::ImageMode,
        Action::History => ShellCommand::History,
        Action::ClearHistory => ShellCommand::ClearHistory,
        Action::Open => ShellCommand::Open(value),
        Action::Theme => ShellCommand::Theme(optional(arg)),
        Action::Key => ShellCommand::Key(optional(arg)),
        Action::ClearKey => ShellCommand::ClearKey,
        Action::About => ShellCommand::About,
        Action::Back => ShellCommand::Back,
        Action::App => ShellCommand::App(value),
        Action::Plan => ShellCommand::Plan(value),
        Action::Tone => ShellCommand::Tone(value),
        Action::Style => ShellCommand::Style(value),
        Action::Length => ShellCommand::Length(value),
        Action::Generate => ShellCommand::Generate,
        Action::Add => ShellCommand::Add(parse_path_args(arg)),
        Action::Remove => ShellCommand::Remove(value),
        Action::ClearImages => ShellCommand::ClearImages,
        Action::Analyze => ShellCommand::Analyze,
        Action::Again => ShellCommand::Again,
    }
}

pub fn parse_command(text: &str) -> ShellCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return ShellCommand::Noop;
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS)
                .or_else(|| find_action(&command, MULTI_PATH_COMMANDS))
            {
                return command_for(action, arg);
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return command_for(action, "");
            }

            return ShellCommand::Unknown {
                command,
                arg: arg.to_string(),
            };
        }
    }

    ShellCommand::Text(raw_trimmed.to_string())
}
