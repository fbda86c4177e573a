use cliplog::{
    clipboard::{ClipboardBackend, CommandClipboard},
    picker::{CommandPicker, Picker},
};
use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

fn stub() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stub_tool"))
}

fn stub_clipboard(file: &Path) -> CommandClipboard {
    let stub = stub();
    CommandClipboard::new(
        "stub",
        &[stub.as_os_str(), OsStr::new("paste"), file.as_os_str()],
        &[stub.as_os_str(), OsStr::new("copy"), file.as_os_str()],
    )
}

#[test]
fn command_clipboard_round_trip() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("selection");
    let mut clipboard = stub_clipboard(&file);
    clipboard.write("two\nlines\n").expect("write");
    assert_eq!(fs::read_to_string(&file).unwrap(), "two\nlines\n");
    assert_eq!(clipboard.read().expect("read"), "two\nlines\n");
}

#[test]
fn command_clipboard_read_failure() {
    let dir = TempDir::new().unwrap();
    let mut clipboard = stub_clipboard(&dir.path().join("missing"));
    assert!(clipboard.read().is_err());
}

#[test]
fn missing_clipboard_program() {
    let mut clipboard = CommandClipboard::new(
        "missing",
        &["/nonexistent/paste"],
        &["/nonexistent/copy"],
    );
    assert!(clipboard.read().is_err());
    assert!(clipboard.write("x").is_err());
}

#[test]
fn command_picker_selects_line() {
    let stub = stub();
    let mut picker =
        CommandPicker::new(stub.as_os_str(), &[OsStr::new("pick"), OsStr::new("1")]);
    let items = vec!["first".to_string(), "second".to_string(), "third".to_string()];
    assert_eq!(picker.pick(&items).expect("pick"), Some("second".to_string()));
}

#[test]
fn command_picker_cancel() {
    let stub = stub();
    let mut picker =
        CommandPicker::new(stub.as_os_str(), &[OsStr::new("pick"), OsStr::new("none")]);
    let items = vec!["only".to_string()];
    assert_eq!(picker.pick(&items).expect("pick"), None);
}
