#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Help,
    Quit,
    Home,
    PromptMode,
    ImageMode,
    History,
    ClearHistory,
    Open,
    Theme,
    Key,
    ClearKey,
    About,
    Back,
    App,
    Plan,
    Tone,
    Style,
    Length,
    Generate,
    Add,
    Remove,
    ClearImages,
    Analyze,
    Again,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: Action,
}

const fn spec(command: &'static str, action: Action) -> CommandSpec {
    CommandSpec { command, action }
}

/// Commands whose remainder is passed through as a single trimmed string.
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    spec("open", Action::Open),
    spec("theme", Action::Theme),
    spec("key", Action::Key),
    spec("app", Action::App),
    spec("plan", Action::Plan),
    spec("tone", Action::Tone),
    spec("style", Action::Style),
    spec("length", Action::Length),
    spec("remove", Action::Remove),
];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[spec("add", Action::Add)];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    spec("help", Action::Help),
    spec("quit", Action::Quit),
    spec("exit", Action::Quit),
    spec("home", Action::Home),
    spec("prompt", Action::PromptMode),
    spec("image", Action::ImageMode),
    spec("history", Action::History),
    spec("clear_history", Action::ClearHistory),
    spec("key_clear", Action::ClearKey),
    spec("about", Action::About),
    spec("back", Action::Back),
    spec("generate", Action::Generate),
    spec("clear_images", Action::ClearImages),
    spec("analyze", Action::Analyze),
    spec("again", Action::Again),
];

pub const SHELL_HELP_COMMANDS: &[&str] = &[
    "/prompt",
    "/image",
    "/home",
    "/back",
    "/app",
    "/plan",
    "/tone",
    "/style",
    "/length",
    "/generate",
    "/add",
    "/remove",
    "/clear_images",
    "/analyze",
    "/again",
    "/history",
    "/open",
    "/clear_history",
    "/theme",
    "/key",
    "/key_clear",
    "/about",
    "/help",
    "/quit",
];
