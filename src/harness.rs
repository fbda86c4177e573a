use crate::{
    clipboard::ClipboardBackend,
    controller::Controller,
    history::{DEFAULT_MAX_ENTRIES, HistoryStore},
    picker::Picker,
};
use anyhow::{Context, Result, anyhow, bail};
use std::fmt::Write as FmtWrite;
use std::{
    cell::RefCell,
    fs,
    io::{self, Read},
    rc::Rc,
};
use tempfile::TempDir;

#[derive(Default)]
struct ClipboardState {
    contents: Option<String>,
    writes: Vec<String>,
    reject_writes: bool,
}

#[derive(Clone, Default)]
struct FakeClipboard {
    inner: Rc<RefCell<ClipboardState>>,
}

impl ClipboardBackend for FakeClipboard {
    fn name(&self) -> &str {
        "harness"
    }

    fn read(&mut self) -> Result<String> {
        self.inner
            .borrow()
            .contents
            .clone()
            .ok_or_else(|| anyhow!("no selection"))
    }

    fn write(&mut self, text: &str) -> Result<()> {
        let mut state = self.inner.borrow_mut();
        if state.reject_writes {
            bail!("clipboard rejected write");
        }
        state.writes.push(text.to_string());
        state.contents = Some(text.to_string());
        Ok(())
    }
}

enum Pick {
    Index(usize),
    Text(String),
    Cancel,
}

#[derive(Default)]
struct ScriptedPicker {
    next: Option<Pick>,
    shown: Vec<Vec<String>>,
}

impl Picker for ScriptedPicker {
    fn pick(&mut self, items: &[String]) -> Result<Option<String>> {
        self.shown.push(items.to_vec());
        match self.next.take() {
            Some(Pick::Index(idx)) => items
                .get(idx)
                .cloned()
                .map(Some)
                .ok_or_else(|| anyhow!("pick {} out of range ({} items)", idx, items.len())),
            Some(Pick::Text(text)) => Ok(Some(text)),
            Some(Pick::Cancel) => Ok(None),
            None => bail!("picker opened without a scripted pick"),
        }
    }
}

/// Runs Given/When/Then scenario scripts against a controller wired to a fake clipboard,
/// a scripted picker, and a history file in a scratch directory.
pub struct Harness {
    controller: Controller,
    clipboard: FakeClipboard,
    picker: ScriptedPicker,
    last_exit: Option<u8>,
    last_message: Option<String>,
    dir: TempDir,
}

impl Harness {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("create scratch directory")?;
        let clipboard = FakeClipboard::default();
        let store = HistoryStore::new(
            dir.path().join("history"),
            DEFAULT_MAX_ENTRIES,
            Default::default(),
        );
        let controller = Controller::new(store, Box::new(clipboard.clone()));
        Ok(Self {
            controller,
            clipboard,
            picker: ScriptedPicker::default(),
            last_exit: None,
            last_message: None,
            dir,
        })
    }

    pub fn run_script(&mut self, script: &str) -> Result<()> {
        let mut scenario_seen = false;
        let mut phase = Step::Given;
        let mut last_step: Option<Step> = None;
        for (line_no, line) in script.lines().enumerate() {
            let line_no = line_no + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if is_scenario_header(line) {
                scenario_seen = true;
                self.reset()?;
                phase = Step::Given;
                last_step = None;
                continue;
            }
            if !scenario_seen {
                bail!("line {}: missing Scenario header", line_no);
            }
            // `And` repeats the previous step.
            let (keyword, line) = split_keyword(line, line_no)?;
            let step = match keyword.or(last_step) {
                Some(step) => step,
                None => bail!("line {}: And without a previous Given/When/Then", line_no),
            };
            if step < phase {
                bail!("line {}: {:?} is not allowed after {:?}", line_no, step, phase);
            }
            phase = step;
            last_step = Some(step);

            let (cmd, rest) = line
                .split_once(':')
                .ok_or_else(|| anyhow!("line {}: missing ':'", line_no))?;
            let payload = rest.trim_start();
            let is_assert = cmd.starts_with("expect-");
            if (phase == Step::Then) != is_assert {
                bail!(
                    "line {}: assertion commands belong after Then, and only there",
                    line_no
                );
            }
            if let Err(err) = self.run_command(cmd, payload, line_no) {
                return Err(anyhow!("{}\n\n{}", err, self.dump_state()));
            }
        }
        Ok(())
    }

    fn run_command(&mut self, cmd: &str, payload: &str, line_no: usize) -> Result<()> {
        match cmd {
            "max-entries" => {
                let max = payload
                    .parse::<usize>()
                    .map_err(|_| anyhow!("line {}: invalid max entries", line_no))?;
                let store = HistoryStore::new(
                    self.controller.store.path(),
                    max,
                    *self.controller.store.encoder(),
                );
                self.controller.store = store;
            }
            "clipboard" => {
                self.clipboard.inner.borrow_mut().contents = Some(parse_text(payload)?);
            }
            "clipboard-empty" => {
                self.clipboard.inner.borrow_mut().contents = None;
            }
            "clipboard-rejects-writes" => {
                self.clipboard.inner.borrow_mut().reject_writes = true;
            }
            "history-file" => {
                fs::write(self.controller.store.path(), parse_text(payload)?)
                    .context("seed history file")?;
            }
            "pick" => {
                self.picker.next = Some(if payload == "none" {
                    Pick::Cancel
                } else {
                    Pick::Index(
                        payload
                            .parse::<usize>()
                            .map_err(|_| anyhow!("line {}: invalid pick index", line_no))?,
                    )
                });
            }
            "pick-text" => {
                self.picker.next = Some(Pick::Text(parse_text(payload)?));
            }
            "store" => {
                self.controller.store.capture(&parse_text(payload)?)?;
            }
            "capture" => {
                self.controller.capture()?;
            }
            "menu" => {
                let (exit, message) = match self.controller.menu(&mut self.picker) {
                    Ok(outcome) => (outcome.exit_code(), outcome.message()),
                    Err(err) => (err.exit_code(), Some(err.to_string())),
                };
                self.last_exit = Some(exit);
                self.last_message = message;
            }
            "expect-history" => {
                let expected: Vec<String> = serde_json::from_str(payload)
                    .with_context(|| format!("line {}: history must be a JSON array", line_no))?;
                let actual = self.controller.store.list()?;
                if actual != expected {
                    bail!(
                        "line {}: expected history {:?}, got {:?}",
                        line_no,
                        expected,
                        actual
                    );
                }
            }
            "expect-file" => {
                let expected = parse_text(payload)?;
                let actual = fs::read_to_string(self.controller.store.path()).unwrap_or_default();
                if actual != expected {
                    bail!(
                        "line {}: expected history file {:?}, got {:?}",
                        line_no,
                        expected,
                        actual
                    );
                }
            }
            "expect-no-file" => {
                if self.controller.store.path().exists() {
                    bail!("line {}: history file exists", line_no);
                }
            }
            "expect-exit" => {
                let expected = payload
                    .parse::<u8>()
                    .map_err(|_| anyhow!("line {}: invalid exit code", line_no))?;
                if self.last_exit != Some(expected) {
                    bail!(
                        "line {}: expected exit {}, got {:?}",
                        line_no,
                        expected,
                        self.last_exit
                    );
                }
            }
            "expect-message-contains" => {
                let expected = parse_text(payload)?;
                let actual = self.last_message.as_deref().unwrap_or_default();
                if !actual.contains(&expected) {
                    bail!(
                        "line {}: expected message containing {:?}, got {:?}",
                        line_no,
                        expected,
                        self.last_message
                    );
                }
            }
            "expect-no-message" => {
                if let Some(message) = &self.last_message {
                    bail!("line {}: unexpected message {:?}", line_no, message);
                }
            }
            "expect-clipboard" => {
                let expected = parse_text(payload)?;
                let state = self.clipboard.inner.borrow();
                match state.writes.last() {
                    Some(text) if *text == expected => {}
                    other => bail!(
                        "line {}: expected clipboard write {:?}, got {:?}",
                        line_no,
                        expected,
                        other
                    ),
                }
            }
            "expect-clipboard-writes" => {
                let expected = payload
                    .parse::<usize>()
                    .map_err(|_| anyhow!("line {}: invalid write count", line_no))?;
                let actual = self.clipboard.inner.borrow().writes.len();
                if actual != expected {
                    bail!(
                        "line {}: expected {} clipboard writes, got {}",
                        line_no,
                        expected,
                        actual
                    );
                }
            }
            "expect-picker-items" => {
                let expected: Vec<String> = serde_json::from_str(payload).with_context(|| {
                    format!("line {}: picker items must be a JSON array", line_no)
                })?;
                match self.picker.shown.last() {
                    Some(items) if *items == expected => {}
                    other => bail!(
                        "line {}: expected picker items {:?}, got {:?}",
                        line_no,
                        expected,
                        other
                    ),
                }
            }
            "expect-picker-not-shown" => {
                if !self.picker.shown.is_empty() {
                    bail!("line {}: picker was shown", line_no);
                }
            }
            _ => bail!("line {}: unknown command {}", line_no, cmd),
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        *self = Harness::new()?;
        Ok(())
    }

    fn dump_state(&self) -> String {
        let mut out = String::from("State:\n");
        match self.controller.store.list() {
            Ok(history) => {
                let _ = writeln!(&mut out, "history: {:?}", history);
            }
            Err(err) => {
                let _ = writeln!(&mut out, "history: <{}>", err);
            }
        }
        let clipboard = self.clipboard.inner.borrow();
        let _ = writeln!(&mut out, "clipboard: {:?}", clipboard.contents);
        let _ = writeln!(&mut out, "clipboard-writes: {:?}", clipboard.writes);
        let _ = writeln!(&mut out, "picker-shown: {:?}", self.picker.shown);
        let _ = writeln!(&mut out, "exit: {:?}", self.last_exit);
        let _ = writeln!(&mut out, "message: {:?}", self.last_message);
        let _ = writeln!(&mut out, "dir: {}", self.dir.path().display());
        out
    }
}

pub fn run_script_file(path: &str) -> Result<()> {
    let contents = fs::read_to_string(path).with_context(|| format!("read script {}", path))?;
    Harness::new()?.run_script(&contents)
}

pub fn run_script_stdin() -> Result<()> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Harness::new()?.run_script(&buf)
}

/// Unescape `\n`, `\r`, `\t`, `\\` and `\u{XXXX}`.
fn parse_text(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let esc = chars.next().ok_or_else(|| anyhow!("trailing escape"))?;
        match esc {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            'u' => {
                if chars.next() != Some('{') {
                    bail!("invalid \\u escape");
                }
                let hex = chars.by_ref().take_while(|&c| c != '}').collect::<String>();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| anyhow!("invalid \\u escape"))?;
                out.push(code);
            }
            _ => bail!("unknown escape \\{}", esc),
        }
    }
    Ok(out)
}

/// Scenario steps, in the order they must appear.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
enum Step {
    Given,
    When,
    Then,
}

/// Split off the leading Given/When/Then/And keyword. `And` comes back as None.
fn split_keyword(line: &str, line_no: usize) -> Result<(Option<Step>, &str)> {
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim_start();
    let keyword = match word.to_ascii_lowercase().as_str() {
        "given" => Some(Step::Given),
        "when" => Some(Step::When),
        "then" => Some(Step::Then),
        "and" => None,
        _ => bail!("line {}: expected Given/When/Then/And, got {:?}", line_no, word),
    };
    if rest.is_empty() {
        bail!("line {}: nothing after {}", line_no, word);
    }
    Ok((keyword, rest))
}

fn is_scenario_header(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(head, _)| head.trim().eq_ignore_ascii_case("scenario"))
}

#[cfg(test)]
mod tests {
    use super::{Step, is_scenario_header, parse_text, split_keyword};

    #[test]
    fn escapes() {
        assert_eq!(parse_text(r"a\nb\\c").unwrap(), "a\nb\\c");
        assert_eq!(parse_text(r"foo\u{2424}bar").unwrap(), "foo\u{2424}bar");
        assert!(parse_text(r"oops\").is_err());
        assert!(parse_text(r"\q").is_err());
    }

    #[test]
    fn keywords() {
        assert_eq!(
            split_keyword("When store: a", 1).unwrap(),
            (Some(Step::When), "store: a")
        );
        assert_eq!(split_keyword("and  capture:", 1).unwrap(), (None, "capture:"));
        assert!(split_keyword("Then", 1).is_err());
        assert!(split_keyword("Whenever store: a", 1).is_err());
        assert!(Step::Given < Step::When && Step::When < Step::Then);
    }

    #[test]
    fn scenario_headers() {
        assert!(is_scenario_header("Scenario: anything"));
        assert!(is_scenario_header("scenario : spaced"));
        assert!(!is_scenario_header("Given scenario: no"));
    }
}
