use anyhow::{Context, Result, bail};
use std::{
    env, fs,
    io::{self, Read, Write},
    process::ExitCode,
};

// Stand-in for clipboard tools and dmenu-style pickers, used by tests:
//   stub_tool pick <index|none>   print the chosen stdin line, or nothing
//   stub_tool paste <file>        print the file, failing if it doesn't exist
//   stub_tool copy <file>         save stdin to the file
fn main() -> Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();
    let [mode, arg] = args.as_slice() else {
        bail!("usage: stub_tool pick|paste|copy <arg>");
    };
    let mut input = String::new();
    match mode.as_str() {
        "pick" => {
            io::stdin().read_to_string(&mut input).context("read items")?;
            if arg == "none" {
                return Ok(ExitCode::from(1));
            }
            let idx: usize = arg.parse().context("parse index")?;
            if let Some(line) = input.split('\n').nth(idx) {
                println!("{}", line);
            }
        }
        "paste" => {
            let Ok(contents) = fs::read(arg) else {
                eprintln!("No selection");
                return Ok(ExitCode::from(1));
            };
            io::stdout().write_all(&contents)?;
        }
        "copy" => {
            io::stdin().read_to_string(&mut input).context("read clipboard text")?;
            fs::write(arg, input).context("save clipboard text")?;
        }
        _ => bail!("unknown mode {}", mode),
    }
    Ok(ExitCode::SUCCESS)
}
