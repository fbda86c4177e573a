use crate::clipboard::{DisplayServer, find_program};
use anyhow::{Context, Result};
use std::{
    env,
    ffi::{OsStr, OsString},
    io::{BufWriter, Write},
    process::{Command, Stdio},
};
use tracing::debug;

/// Lets the user choose one of several lines.
pub trait Picker {
    /// Returns the chosen line, or None if the user dismissed the picker.
    fn pick(&mut self, items: &[String]) -> Result<Option<String>>;
}

/// A dmenu-style program: candidates on stdin, one per line, the choice on stdout.
pub struct CommandPicker {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandPicker {
    pub fn new<S: AsRef<OsStr>>(program: S, args: &[S]) -> Self {
        CommandPicker {
            program: program.as_ref().to_owned(),
            args: args.iter().map(|s| s.as_ref().to_owned()).collect(),
        }
    }

    /// Build a picker from a command line such as `rofi -dmenu -i`.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace();
        let program = words.next()?;
        let args = words.collect::<Vec<_>>();
        Some(Self::new(program, &args))
    }

    /// The first installed picker that suits the display server.
    pub fn detect(display: Option<DisplayServer>) -> Option<Self> {
        let path = env::var_os("PATH").unwrap_or_default();
        candidates(display)
            .iter()
            .find(|cmd| {
                cmd.split_whitespace()
                    .next()
                    .is_some_and(|program| find_program(program.as_ref(), &path).is_some())
            })
            .and_then(|cmd| Self::from_command_line(cmd))
    }
}

fn candidates(display: Option<DisplayServer>) -> &'static [&'static str] {
    match display {
        Some(DisplayServer::Wayland) => &["wofi --dmenu", "fuzzel --dmenu", "rofi -dmenu", "fzf"],
        Some(DisplayServer::X11) => &["rofi -dmenu", "dmenu -l 20", "fzf"],
        None => &["fzf"],
    }
}

impl Picker for CommandPicker {
    fn pick(&mut self, items: &[String]) -> Result<Option<String>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn picker {}", self.program.to_string_lossy()))?;
        {
            let mut stdin = BufWriter::new(child.stdin.take().context("capture picker stdin")?);
            for item in items {
                writeln!(stdin, "{}", item).context("write picker item")?;
            }
            stdin.flush().context("flush picker items")?;
        }
        let output = child.wait_with_output().context("wait for picker")?;
        let selection = String::from_utf8_lossy(&output.stdout);
        let selection = selection.strip_suffix('\n').unwrap_or(&selection);
        if selection.is_empty() {
            // dmenu-likes exit non-zero when dismissed; that is a cancel, not a failure.
            debug!(status = %output.status, "picker returned no selection");
            return Ok(None);
        }
        Ok(Some(selection.to_string()))
    }
}
