use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use cliplog::{
    clipboard::{self, BackendChoice, DisplayServer},
    config::{self, Config, FileConfig},
    controller::{self, Controller},
    error::Error,
    history::HistoryStore,
    logging,
    picker::CommandPicker,
};
use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Cmd>,
    /// Config file to read instead of the default one
    #[clap(long, global = true, env = "CLIPLOG_CONFIG")]
    config: Option<PathBuf>,
    /// Where the history is kept
    #[clap(long, global = true, env = "CLIPLOG_HISTORY_FILE")]
    history_file: Option<PathBuf>,
    /// How many entries to keep
    #[clap(long, short = 'n', global = true, env = "CLIPLOG_MAX_ENTRIES")]
    max_entries: Option<usize>,
    /// Characters of each entry shown in the picker
    #[clap(long, global = true, env = "CLIPLOG_DISPLAY_WIDTH")]
    display_width: Option<usize>,
    /// Characters of the restored entry shown after copying
    #[clap(long, global = true, env = "CLIPLOG_PREVIEW_WIDTH")]
    preview_width: Option<usize>,
    /// Character stored in place of newlines
    #[clap(long, global = true, env = "CLIPLOG_SENTINEL")]
    sentinel: Option<char>,
    /// Picker command line, e.g. "rofi -dmenu"
    #[clap(long, short = 'p', global = true, env = "CLIPLOG_PICKER")]
    picker: Option<String>,
    /// Clipboard tools to use
    #[clap(long, global = true, value_enum, env = "CLIPLOG_BACKEND")]
    backend: Option<BackendChoice>,
    /// Log what is going on to stderr
    #[clap(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Save the current clipboard to history
    Capture,
    /// Save the current clipboard, then pick an entry to copy back (default)
    Menu,
    /// Print the history, most recent first
    List {
        /// Print stored lines in full instead of truncated
        #[clap(long)]
        raw: bool,
    },
    /// Forget all history
    Clear,
}

impl Cli {
    fn overrides(&self) -> FileConfig {
        FileConfig {
            history_file: self.history_file.clone(),
            max_entries: self.max_entries,
            display_width: self.display_width,
            preview_width: self.preview_width,
            sentinel: self.sentinel,
            picker: self.picker.clone(),
            backend: self.backend,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures.
            let code = if err.use_stderr() { 1 } else { 0 };
            if let Err(print_err) = err.print() {
                eprintln!("cliplog: {}", print_err);
            }
            return ExitCode::from(code);
        }
    };
    if let Err(err) = logging::init(cli.verbose) {
        eprintln!("cliplog: {:#}", err);
    }

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            let code = err.downcast_ref::<Error>().map_or(2, Error::exit_code);
            eprintln!("cliplog: {:#}", err);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let config_file = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_file()?,
    };
    let file = FileConfig::load(&config_file)?;
    let config = Config::resolve(file.overlay(cli.overrides()))?;
    let store = HistoryStore::new(&config.history_file, config.max_entries, config.encoder);

    match cli.command.unwrap_or(Cmd::Menu) {
        Cmd::List { raw } => {
            let lines = if raw {
                store.list()?
            } else {
                controller::display_lines(&store, config.display_width)?
            };
            let mut stdout = io::stdout().lock();
            for line in lines {
                writeln!(stdout, "{}", line)?;
            }
            Ok(0)
        }
        Cmd::Clear => {
            store.clear()?;
            Ok(0)
        }
        Cmd::Capture => {
            let mut controller = make_controller(&config, store)?;
            controller.capture()?;
            Ok(0)
        }
        Cmd::Menu => {
            let mut controller = make_controller(&config, store)?;
            let mut picker = match &config.picker {
                Some(command) => CommandPicker::from_command_line(command),
                None => CommandPicker::detect(DisplayServer::resolve(config.backend)),
            }
            .ok_or_else(|| Error::Picker(anyhow!("no picker program found")))?;

            let outcome = controller.menu(&mut picker)?;
            if let Some(message) = outcome.message() {
                if outcome.exit_code() == 0 {
                    println!("{}", message);
                } else {
                    eprintln!("cliplog: {}", message);
                }
            }
            Ok(outcome.exit_code())
        }
    }
}

/// The clipboard is checked before anything touches the history.
fn make_controller(config: &Config, store: HistoryStore) -> Result<Controller> {
    let clipboard = clipboard::connect(config.backend)?;
    let mut controller = Controller::new(store, Box::new(clipboard));
    controller.display_width = config.display_width;
    controller.preview_width = config.preview_width;
    Ok(controller)
}
