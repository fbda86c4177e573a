use crate::error::Error;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{
    env,
    ffi::{OsStr, OsString},
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::debug;

/// Access to the system clipboard.
pub trait ClipboardBackend {
    fn name(&self) -> &str;
    fn read(&mut self) -> Result<String>;
    fn write(&mut self, text: &str) -> Result<()>;
}

/// Which display server's clipboard tools to use.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Check WAYLAND_DISPLAY, then DISPLAY.
    #[default]
    Auto,
    Wayland,
    X11,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DisplayServer {
    Wayland,
    X11,
}

impl DisplayServer {
    /// Work out the display server from the environment, preferring Wayland.
    pub fn detect<F>(getenv: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let set = |name: &str| getenv(name).is_some_and(|v| !v.is_empty());
        if set("WAYLAND_DISPLAY") {
            Some(DisplayServer::Wayland)
        } else if set("DISPLAY") {
            Some(DisplayServer::X11)
        } else {
            None
        }
    }

    pub fn resolve(choice: BackendChoice) -> Option<Self> {
        match choice {
            BackendChoice::Auto => Self::detect(|name| env::var_os(name)),
            BackendChoice::Wayland => Some(DisplayServer::Wayland),
            BackendChoice::X11 => Some(DisplayServer::X11),
        }
    }
}

/// A clipboard driven through external copy/paste programs.
pub struct CommandClipboard {
    name: String,
    read_cmd: Vec<OsString>,
    write_cmd: Vec<OsString>,
}

impl CommandClipboard {
    pub fn new<S: AsRef<OsStr>>(name: &str, read_cmd: &[S], write_cmd: &[S]) -> Self {
        CommandClipboard {
            name: name.to_string(),
            read_cmd: read_cmd.iter().map(|s| s.as_ref().to_owned()).collect(),
            write_cmd: write_cmd.iter().map(|s| s.as_ref().to_owned()).collect(),
        }
    }

    pub fn wayland() -> Self {
        Self::new("wayland", &["wl-paste", "--no-newline"], &["wl-copy"])
    }

    pub fn x11() -> Self {
        Self::new(
            "x11",
            &["xclip", "-selection", "clipboard", "-o"],
            &["xclip", "-selection", "clipboard", "-i"],
        )
    }

    pub fn for_display(display: DisplayServer) -> Self {
        match display {
            DisplayServer::Wayland => Self::wayland(),
            DisplayServer::X11 => Self::x11(),
        }
    }

    /// The programs this clipboard runs.
    pub fn programs(&self) -> Vec<&OsStr> {
        let mut programs: Vec<&OsStr> = [&self.read_cmd, &self.write_cmd]
            .into_iter()
            .filter_map(|cmd| cmd.first().map(OsString::as_os_str))
            .collect();
        programs.dedup();
        programs
    }
}

impl ClipboardBackend for CommandClipboard {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> Result<String> {
        let (program, args) = self
            .read_cmd
            .split_first()
            .context("empty clipboard read command")?;
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .with_context(|| format!("run {}", program.to_string_lossy()))?;
        if !output.status.success() {
            bail!("{} exited with {}", program.to_string_lossy(), output.status);
        }
        String::from_utf8(output.stdout).context("clipboard contents are not UTF-8 text")
    }

    fn write(&mut self, text: &str) -> Result<()> {
        let (program, args) = self
            .write_cmd
            .split_first()
            .context("empty clipboard write command")?;
        // Copy tools fork a process that keeps serving the selection, so don't leave our pipes
        // attached to it.
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn {}", program.to_string_lossy()))?;
        {
            let mut stdin = child.stdin.take().context("capture clipboard tool stdin")?;
            stdin
                .write_all(text.as_bytes())
                .context("write to clipboard tool")?;
        }
        let status = child.wait().context("wait for clipboard tool")?;
        if !status.success() {
            bail!("{} exited with {}", program.to_string_lossy(), status);
        }
        Ok(())
    }
}

/// Pick the clipboard tools for this session, failing if they can't run here.
pub fn connect(choice: BackendChoice) -> std::result::Result<CommandClipboard, Error> {
    let display = DisplayServer::resolve(choice).ok_or_else(|| {
        Error::BackendUnavailable("neither WAYLAND_DISPLAY nor DISPLAY is set".into())
    })?;
    let clipboard = CommandClipboard::for_display(display);
    let path = env::var_os("PATH").unwrap_or_default();
    for program in clipboard.programs() {
        if find_program(program, &path).is_none() {
            return Err(Error::BackendUnavailable(format!(
                "{} not found in PATH",
                program.to_string_lossy()
            )));
        }
    }
    debug!(backend = clipboard.name(), "using clipboard backend");
    Ok(clipboard)
}

/// Locate a program the way a shell would, given the value of PATH.
pub fn find_program(program: &OsStr, path: &OsStr) -> Option<PathBuf> {
    let program = Path::new(program);
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    env::split_paths(path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::{BackendChoice, CommandClipboard, DisplayServer, find_program};
    use std::{ffi::OsString, fs};
    use tempfile::TempDir;

    fn env_of(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<OsString> {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| OsString::from(v))
        }
    }

    #[test]
    fn prefers_wayland() {
        let getenv = env_of(&[("WAYLAND_DISPLAY", "wayland-0"), ("DISPLAY", ":0")]);
        assert_eq!(DisplayServer::detect(getenv), Some(DisplayServer::Wayland));
    }

    #[test]
    fn falls_back_to_x11() {
        let getenv = env_of(&[("WAYLAND_DISPLAY", ""), ("DISPLAY", ":1")]);
        assert_eq!(DisplayServer::detect(getenv), Some(DisplayServer::X11));
    }

    #[test]
    fn no_display() {
        assert_eq!(DisplayServer::detect(env_of(&[])), None);
    }

    #[test]
    fn forced_choice_skips_detection() {
        assert_eq!(
            DisplayServer::resolve(BackendChoice::X11),
            Some(DisplayServer::X11)
        );
    }

    #[test]
    fn xclip_is_listed_once() {
        let x11 = CommandClipboard::x11();
        assert_eq!(x11.programs(), vec!["xclip"]);
        let wayland = CommandClipboard::wayland();
        assert_eq!(wayland.programs(), vec!["wl-paste", "wl-copy"]);
    }

    #[test]
    fn finds_program_in_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("wl-copy"), "").unwrap();
        let path = std::env::join_paths(["/nonexistent", dir.path().to_str().unwrap()]).unwrap();
        assert_eq!(
            find_program("wl-copy".as_ref(), &path),
            Some(dir.path().join("wl-copy"))
        );
        assert_eq!(find_program("wl-paste".as_ref(), &path), None);
    }
}
