use std::env;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::str::FromStr;

use agink_contracts::shell::{parse_command, ShellCommand, SHELL_HELP_COMMANDS};
use agink_contracts::{
    AnalysisResult, HistoryItem, JsonFileStore, KeyValueStore, Length, MemoryStore, Plan, Style,
    Tone,
};
use agink_engine::config::env_api_key;
use agink_engine::{
    AnalyzerStep, AppShell, BackOutcome, DryrunBackend, Gateway, GatewayConfig, GeminiBackend,
    ImageAnalyzer, ImageInput, Mode, ModeKind, PromptWizard, ShellError, Theme, WizardStep,
    MAX_IMAGES,
};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const STORE_FILE_NAME: &str = "store.json";
const DEFAULT_LOG_FILTER: &str = "agink=warn";
const VERBOSE_LOG_FILTER: &str = "agink=debug";

const ABOUT_TEXT: &str = "\
AG ink turns rough ideas into optimized prompts for the AI app you use, and
turns images into a summary plus a prompt that could recreate them.

Prompt flow: pick an app, pick a plan, describe the idea, then /generate.
Image flow: /add up to 20 images, then /analyze.
Every result is kept in a short local history (/history, /open).";

#[derive(Debug, Parser)]
#[command(
    name = "agink",
    version,
    about = "Prompt refinement and image analysis assistant"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Directory holding the persisted store (defaults to $AGINK_HOME or ~/.agink).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Keep all state in memory for this process only.
    #[arg(long, global = true)]
    ephemeral: bool,
    /// Use the offline backend instead of Gemini.
    #[arg(long, global = true)]
    dryrun: bool,
    #[arg(long, global = true)]
    text_model: Option<String>,
    #[arg(long, global = true)]
    vision_model: Option<String>,
    /// Ideas shorter than this many characters are grounded with search.
    #[arg(long, global = true)]
    grounding_threshold: Option<usize>,
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive shell (the default).
    Chat,
    /// Generate one optimized prompt.
    Prompt(PromptArgs),
    /// Analyze one batch of images.
    Analyze(AnalyzeArgs),
    History(HistoryArgs),
    Key(KeyArgs),
    Theme(ThemeArgs),
}

#[derive(Debug, Args)]
struct PromptArgs {
    /// App id, name or 1-based catalog position.
    #[arg(long)]
    app: String,
    #[arg(long)]
    plan: Plan,
    #[arg(long)]
    tone: Option<Tone>,
    #[arg(long)]
    style: Option<Style>,
    #[arg(long)]
    length: Option<Length>,
    #[arg(required = true, num_args = 1..)]
    idea: Vec<String>,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    #[arg(required = true, num_args = 1..)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[command(subcommand)]
    action: Option<HistoryAction>,
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    List,
    /// Show one entry by 1-based position or id.
    Show { selector: String },
    Clear,
}

#[derive(Debug, Args)]
struct KeyArgs {
    #[command(subcommand)]
    action: Option<KeyAction>,
}

#[derive(Debug, Subcommand)]
enum KeyAction {
    Set { value: String },
    Clear,
}

#[derive(Debug, Args)]
struct ThemeArgs {
    /// light, dark or toggle; prints the current theme when omitted.
    value: Option<String>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("agink error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    if cli.global.ephemeral {
        return dispatch(cli, MemoryStore::new());
    }
    let store_path = data_dir(&cli.global)?.join(STORE_FILE_NAME);
    tracing::debug!(path = %store_path.display(), "using persisted store");
    dispatch(cli, JsonFileStore::new(store_path))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn data_dir(global: &GlobalArgs) -> Result<PathBuf> {
    if let Some(dir) = &global.data_dir {
        return Ok(dir.clone());
    }
    if let Some(dir) = env::var_os("AGINK_HOME").filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".agink"))
        .context("could not determine a home directory; pass --data-dir or set AGINK_HOME")
}

fn build_gateway(global: &GlobalArgs, api_key: Option<&str>) -> Gateway {
    let mut config = GatewayConfig::from_env();
    if let Some(model) = &global.text_model {
        config.text_model = model.clone();
    }
    if let Some(model) = &global.vision_model {
        config.vision_model = model.clone();
    }
    if let Some(threshold) = global.grounding_threshold {
        config.grounding_threshold_chars = threshold;
    }
    if global.dryrun {
        return Gateway::new(DryrunBackend, config);
    }
    let backend = GeminiBackend::new(&config, api_key.map(str::to_string));
    Gateway::new(backend, config)
}

fn dispatch<S: KeyValueStore + Clone>(cli: Cli, store: S) -> Result<i32> {
    let mut shell = AppShell::load(store);
    let mut gateway = build_gateway(&cli.global, shell.api_key());
    tracing::debug!(backend = gateway.backend_name(), "gateway ready");
    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(&mut shell, &mut gateway),
        Command::Prompt(args) => run_prompt(&mut shell, &gateway, args),
        Command::Analyze(args) => run_analyze(&mut shell, &gateway, args),
        Command::History(args) => run_history(&mut shell, args),
        Command::Key(args) => run_key(&mut shell, &mut gateway, args),
        Command::Theme(args) => run_theme(&mut shell, args),
    }
}

fn run_prompt<S: KeyValueStore + Clone>(
    shell: &mut AppShell<S>,
    gateway: &Gateway,
    args: PromptArgs,
) -> Result<i32> {
    let app = shell
        .catalog()
        .resolve(&args.app)
        .cloned()
        .with_context(|| format!("unknown app '{}'", args.app))?;
    shell.select_mode(ModeKind::Prompt);
    let wizard = wizard(shell)?;
    wizard.select_app(app)?;
    wizard.select_plan(args.plan)?;
    if let Some(tone) = args.tone {
        wizard.set_tone(tone)?;
    }
    if let Some(style) = args.style {
        wizard.set_style(style)?;
    }
    if let Some(length) = args.length {
        wizard.set_length(length)?;
    }
    wizard.set_idea(args.idea.join(" "))?;
    let result = shell.generate_prompt(gateway)?;
    println!("{result}");
    Ok(0)
}

fn run_analyze<S: KeyValueStore + Clone>(
    shell: &mut AppShell<S>,
    gateway: &Gateway,
    args: AnalyzeArgs,
) -> Result<i32> {
    let images = load_images(&args.paths)?;
    shell.select_mode(ModeKind::Image);
    analyzer(shell)?.add_images(images)?;
    let result = shell.analyze_images(gateway)?;
    print_analysis(result);
    Ok(0)
}

fn run_history<S: KeyValueStore + Clone>(shell: &mut AppShell<S>, args: HistoryArgs) -> Result<i32> {
    match args.action.unwrap_or(HistoryAction::List) {
        HistoryAction::List => print_history(shell.history().items()),
        HistoryAction::Show { selector } => {
            shell.open_history(&selector)?;
            let item = shell
                .seeded_item()
                .with_context(|| format!("history entry '{selector}' is no longer stored"))?;
            print_history_item(item);
        }
        HistoryAction::Clear => {
            shell.history_mut().clear();
            println!("History cleared.");
        }
    }
    Ok(0)
}

fn run_key<S: KeyValueStore + Clone>(
    shell: &mut AppShell<S>,
    gateway: &mut Gateway,
    args: KeyArgs,
) -> Result<i32> {
    match args.action {
        None => print_key_status(shell),
        Some(KeyAction::Set { value }) => {
            shell.set_api_key(&value, gateway);
            println!("API key saved.");
        }
        Some(KeyAction::Clear) => {
            shell.clear_api_key(gateway);
            println!("API key cleared.");
        }
    }
    Ok(0)
}

fn run_theme<S: KeyValueStore + Clone>(shell: &mut AppShell<S>, args: ThemeArgs) -> Result<i32> {
    match args.value {
        None => println!("Theme: {}", shell.theme()),
        Some(value) => apply_theme(shell, &value)?,
    }
    Ok(0)
}

fn run_chat<S: KeyValueStore + Clone>(
    shell: &mut AppShell<S>,
    gateway: &mut Gateway,
) -> Result<i32> {
    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "AG ink started ({} backend, {} theme). Type /help for commands.",
        gateway.backend_name(),
        shell.theme()
    );
    print_home();

    loop {
        print!("{}> ", prompt_label(shell.mode()));
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        match parse_command(input) {
            ShellCommand::Noop => continue,
            ShellCommand::Quit => break,
            command => {
                if let Err(err) = handle_command(shell, gateway, command) {
                    println!("{err:#}");
                }
            }
        }
    }
    Ok(0)
}

fn handle_command<S: KeyValueStore + Clone>(
    shell: &mut AppShell<S>,
    gateway: &mut Gateway,
    command: ShellCommand,
) -> Result<()> {
    match command {
        ShellCommand::Noop | ShellCommand::Quit => {}
        ShellCommand::Help => println!("Commands: {}", SHELL_HELP_COMMANDS.join(" ")),
        ShellCommand::About => println!("{ABOUT_TEXT}"),
        ShellCommand::Home => {
            shell.go_home();
            print_home();
        }
        ShellCommand::PromptMode => {
            shell.select_mode(ModeKind::Prompt);
            render(shell);
        }
        ShellCommand::ImageMode => {
            shell.select_mode(ModeKind::Image);
            render(shell);
        }
        ShellCommand::History => print_history(shell.history().items()),
        ShellCommand::ClearHistory => {
            shell.history_mut().clear();
            println!("History cleared.");
        }
        ShellCommand::Open(selector) => {
            if selector.is_empty() {
                bail!("/open requires a history position or id");
            }
            shell.open_history(&selector)?;
            render(shell);
        }
        ShellCommand::Theme(None) => {
            let theme = shell.toggle_theme();
            println!("Theme set to {theme}.");
        }
        ShellCommand::Theme(Some(value)) => apply_theme(shell, &value)?,
        ShellCommand::Key(None) => print_key_status(shell),
        ShellCommand::Key(Some(value)) => {
            shell.set_api_key(&value, gateway);
            println!("API key saved.");
        }
        ShellCommand::ClearKey => {
            shell.clear_api_key(gateway);
            println!("API key cleared.");
        }
        ShellCommand::Back => match shell.back() {
            BackOutcome::Blocked => println!("Please wait for the current request to finish."),
            BackOutcome::Exit => print_home(),
            BackOutcome::Moved(_) => render(shell),
        },
        ShellCommand::App(selector) => select_app(shell, &selector)?,
        ShellCommand::Plan(value) => select_plan(shell, &value)?,
        ShellCommand::Tone(value) => {
            let tone: Tone = parse_label(&value)?;
            wizard(shell)?.set_tone(tone)?;
            println!("Tone set to {tone}.");
        }
        ShellCommand::Style(value) => {
            let style: Style = parse_label(&value)?;
            wizard(shell)?.set_style(style)?;
            println!("Style set to {style}.");
        }
        ShellCommand::Length(value) => {
            let length: Length = parse_label(&value)?;
            wizard(shell)?.set_length(length)?;
            println!("Length set to {length}.");
        }
        ShellCommand::Generate => {
            println!("Generating...");
            shell.generate_prompt(gateway)?;
            render(shell);
        }
        ShellCommand::Add(paths) => {
            if paths.is_empty() {
                bail!("/add requires one or more image paths");
            }
            let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();
            let images = load_images(&paths)?;
            let total = analyzer(shell)?.add_images(images)?;
            println!("{total}/{MAX_IMAGES} image(s) ready. Run /analyze when done.");
        }
        ShellCommand::Remove(value) => {
            let position: usize = value
                .parse()
                .with_context(|| format!("/remove expects an image number, got '{value}'"))?;
            analyzer(shell)?.remove_image(position)?;
            render(shell);
        }
        ShellCommand::ClearImages => {
            analyzer(shell)?.clear_images()?;
            render(shell);
        }
        ShellCommand::Analyze => {
            println!("Analyzing...");
            shell.analyze_images(gateway)?;
            render(shell);
        }
        ShellCommand::Again => {
            match shell.mode_mut() {
                Mode::Prompt(wizard) => wizard.start_over()?,
                Mode::Image(analyzer) => analyzer.analyze_more()?,
                Mode::Home => bail!("Nothing to start over; choose /prompt or /image."),
            }
            render(shell);
        }
        ShellCommand::Unknown { command, .. } => {
            println!("Unknown command: /{command}. Type /help for commands.");
        }
        ShellCommand::Text(text) => handle_text(shell, &text)?,
    }
    Ok(())
}

/// Free text means whatever the current step is waiting for.
fn handle_text<S: KeyValueStore + Clone>(shell: &mut AppShell<S>, text: &str) -> Result<()> {
    if let Some(step) = shell.wizard_mut().map(|wizard| wizard.step()) {
        match step {
            WizardStep::SelectApp => select_app(shell, text)?,
            WizardStep::SelectPlan => select_plan(shell, text)?,
            WizardStep::InputPrompt => {
                wizard(shell)?.set_idea(text)?;
                println!("Idea saved. Adjust /tone /style /length or run /generate.");
            }
            WizardStep::Generating => println!("Please wait for the current request to finish."),
            WizardStep::Result => println!("Use /again to start over or /back to go back."),
        }
        return Ok(());
    }
    if let Some(step) = shell.analyzer_mut().map(|analyzer| analyzer.step()) {
        match step {
            AnalyzerStep::Collecting => println!("Use /add <paths...> to add images, then /analyze."),
            AnalyzerStep::Analyzing => println!("Please wait for the current request to finish."),
            AnalyzerStep::Result => println!("Use /again to analyze more images or /back to go back."),
        }
        return Ok(());
    }
    println!("Choose /prompt or /image to begin.");
    Ok(())
}

fn select_app<S: KeyValueStore + Clone>(shell: &mut AppShell<S>, selector: &str) -> Result<()> {
    if selector.is_empty() {
        bail!("/app requires a number, id or name");
    }
    let app = shell
        .catalog()
        .resolve(selector)
        .cloned()
        .with_context(|| format!("Unknown app '{selector}'."))?;
    wizard(shell)?.select_app(app)?;
    render(shell);
    Ok(())
}

fn select_plan<S: KeyValueStore + Clone>(shell: &mut AppShell<S>, value: &str) -> Result<()> {
    let plan: Plan = parse_label(value)?;
    wizard(shell)?.select_plan(plan)?;
    render(shell);
    Ok(())
}

fn apply_theme<S: KeyValueStore + Clone>(shell: &mut AppShell<S>, value: &str) -> Result<()> {
    let theme = if value.trim().eq_ignore_ascii_case("toggle") {
        shell.toggle_theme()
    } else {
        let theme: Theme = parse_label(value)?;
        shell.set_theme(theme);
        theme
    };
    println!("Theme set to {theme}.");
    Ok(())
}

fn wizard<S: KeyValueStore + Clone>(shell: &mut AppShell<S>) -> Result<&mut PromptWizard> {
    shell
        .wizard_mut()
        .ok_or_else(|| ShellError::NotInPromptMode.into())
}

fn analyzer<S: KeyValueStore + Clone>(shell: &mut AppShell<S>) -> Result<&mut ImageAnalyzer> {
    shell
        .analyzer_mut()
        .ok_or_else(|| ShellError::NotInImageMode.into())
}

fn parse_label<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse::<T>().map_err(anyhow::Error::msg)
}

fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageInput>> {
    paths
        .iter()
        .map(|path| ImageInput::from_path(path))
        .collect()
}

fn prompt_label(mode: &Mode) -> &'static str {
    match mode {
        Mode::Home => "agink",
        Mode::Prompt(_) => "prompt",
        Mode::Image(_) => "image",
    }
}

fn print_home() {
    println!("Choose a flow: /prompt (idea to optimized prompt) or /image (image analysis).");
}

fn render<S: KeyValueStore + Clone>(shell: &AppShell<S>) {
    match shell.mode() {
        Mode::Home => print_home(),
        Mode::Prompt(wizard) => render_wizard(shell, wizard),
        Mode::Image(analyzer) => render_analyzer(analyzer),
    }
}

fn render_wizard<S: KeyValueStore + Clone>(shell: &AppShell<S>, wizard: &PromptWizard) {
    let app_name = wizard.app().map(|app| app.name.as_str()).unwrap_or("-");
    match wizard.step() {
        WizardStep::SelectApp => {
            println!("Step 1: which AI app is the prompt for?");
            for (index, app) in shell.catalog().list().enumerate() {
                let marker = if wizard.app().map(|current| &current.id) == Some(&app.id) {
                    '*'
                } else {
                    ' '
                };
                println!("{marker}{:>3}. {} - {}", index + 1, app.name, app.capabilities);
            }
            println!("Type a number, id or name.");
        }
        WizardStep::SelectPlan => {
            let plans: Vec<&str> = Plan::ALL.iter().map(|plan| plan.label()).collect();
            println!("Step 2: which {app_name} plan do you use? ({})", plans.join(" | "));
        }
        WizardStep::InputPrompt => {
            let plan = wizard.plan().map(|plan| plan.label()).unwrap_or("-");
            let options = wizard.options();
            println!("Step 3: describe your idea for {app_name} ({plan} plan).");
            println!(
                "Tone: {}  Style: {}  Length: {}",
                options.tone, options.style, options.length
            );
            if !wizard.idea().trim().is_empty() {
                println!("Idea: {}", wizard.idea());
            }
        }
        WizardStep::Generating => println!("Generating..."),
        WizardStep::Result => {
            println!("Optimized prompt for {app_name}:\n");
            println!("{}\n", wizard.result());
            if wizard.is_seeded() {
                println!("Opened from history. /back returns home.");
            } else {
                println!("/again starts over, /back edits the selections.");
            }
        }
    }
}

fn render_analyzer(analyzer: &ImageAnalyzer) {
    match analyzer.step() {
        AnalyzerStep::Collecting => {
            println!(
                "{}/{MAX_IMAGES} image(s) queued. /add <paths...>, /remove <n>, /analyze.",
                analyzer.image_count()
            );
            for (index, image) in analyzer.images().iter().enumerate() {
                println!("{:>3}. {} ({} bytes)", index + 1, image.mime_type, image.bytes.len());
            }
            if let Some(err) = analyzer.last_error() {
                println!("{err}");
            }
        }
        AnalyzerStep::Analyzing => println!("Analyzing..."),
        AnalyzerStep::Result => {
            if let Some(result) = analyzer.result() {
                print_analysis(result);
            }
            if analyzer.is_seeded() {
                println!("Opened from history. /back returns home.");
            } else {
                println!("/again analyzes more images, /back returns home.");
            }
        }
    }
}

fn print_analysis(result: &AnalysisResult) {
    println!("Summary:\n{}\n", result.summary);
    println!("Prompt:\n{}\n", result.prompt);
}

fn print_history(items: &[HistoryItem]) {
    if items.is_empty() {
        println!("No history yet.");
        return;
    }
    for (index, item) in items.iter().enumerate() {
        println!(
            "{:>3}. [{}] {} ({})  {}",
            index + 1,
            item.kind(),
            item.title(),
            format_timestamp(item.timestamp()),
            item.id()
        );
    }
}

fn print_history_item(item: &HistoryItem) {
    println!("{} ({})", item.title(), format_timestamp(item.timestamp()));
    match item {
        HistoryItem::Prompt(prompt) => {
            println!(
                "App: {}  Plan: {}  Tone: {}  Style: {}  Length: {}\n",
                prompt.selected_app.name, prompt.selected_plan, prompt.tone, prompt.style, prompt.length
            );
            println!("{}", prompt.result);
        }
        HistoryItem::Image(image) => print_analysis(&image.result),
    }
}

fn print_key_status<S: KeyValueStore + Clone>(shell: &AppShell<S>) {
    match shell.api_key() {
        Some(key) => println!("API key: {}", mask_key(key)),
        None if env_api_key().is_some() => println!("API key: using the environment credential"),
        None => println!("API key: not set (/key <value> to save one)"),
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.trim().chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{tail}", "*".repeat(chars.len() - 4))
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, mask_key, parse_label, prompt_label, Cli, Command};
    use agink_contracts::{Plan, Tone};
    use agink_engine::Mode;
    use clap::Parser;

    #[test]
    fn mask_key_keeps_only_the_tail() {
        assert_eq!(mask_key("abcdefgh"), "****efgh");
        assert_eq!(mask_key(" abc "), "***");
    }

    #[test]
    fn parse_label_accepts_any_case() {
        assert_eq!(parse_label::<Plan>("PAID").unwrap(), Plan::Paid);
        assert_eq!(parse_label::<Tone>("creative").unwrap(), Tone::Creative);
        assert!(parse_label::<Tone>("grumpy").is_err());
    }

    #[test]
    fn out_of_range_timestamp_prints_raw_value() {
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
        assert!(!format_timestamp(1_700_000_000_000).is_empty());
    }

    #[test]
    fn prompt_subcommand_parses_options_and_idea_words() {
        let cli = Cli::try_parse_from([
            "agink", "--dryrun", "prompt", "--app", "grok", "--plan", "free", "--tone", "professional",
            "latest", "tech", "news",
        ])
        .unwrap();
        assert!(cli.global.dryrun);
        let Some(Command::Prompt(args)) = cli.command else {
            panic!("expected prompt subcommand");
        };
        assert_eq!(args.app, "grok");
        assert_eq!(args.plan, Plan::Free);
        assert_eq!(args.tone, Some(Tone::Professional));
        assert_eq!(args.idea.join(" "), "latest tech news");
    }

    #[test]
    fn no_subcommand_means_chat() {
        let cli = Cli::try_parse_from(["agink", "--ephemeral"]).unwrap();
        assert!(cli.global.ephemeral);
        assert!(cli.command.is_none());
        assert_eq!(prompt_label(&Mode::Home), "agink");
    }
}
