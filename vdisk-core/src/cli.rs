//! Command Surface: line parsing and the interactive REPL loop.
//!
//! Peripheral to the storage core by design (§1), specified only where it
//! touches the core's public contract: command syntax, arity, the
//! `write` payload-quoting rule, `ls`/`search` output formatting, and the
//! `Error:`/`Not found.`/`Note:` output conventions.

use std::io::{self, BufRead, Write};

use log::debug;

use crate::error::FsError;
use crate::fs::VirtualFs;
use crate::namespace::Kind;

/// A parsed, dispatch-ready command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Mkdir(String),
    Cd(String),
    Ls,
    Create(String),
    Open(String),
    Close(String),
    Write(String, String),
    Read(String),
    Delete(String),
    Mv(String, String),
    Search(String),
    Exit,
}

/// Parse one line of input into a `Command`, or a usage-error message.
fn parse_line(line: &str) -> Result<Command, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err("invalid command: empty line".to_string());
    }

    let mut split = trimmed.splitn(2, char::is_whitespace);
    let verb = split.next().unwrap_or("").to_lowercase();
    let rest = split.next().unwrap_or("").trim();

    match verb.as_str() {
        "mkdir" => one_arg(rest, "mkdir").map(Command::Mkdir),
        "cd" => one_arg(rest, "cd").map(Command::Cd),
        "ls" => no_args(rest, "ls").map(|_| Command::Ls),
        "create" => one_arg(rest, "create").map(Command::Create),
        "open" => one_arg(rest, "open").map(Command::Open),
        "close" => one_arg(rest, "close").map(Command::Close),
        "write" => parse_write(rest),
        "read" => one_arg(rest, "read").map(Command::Read),
        "delete" => one_arg(rest, "delete").map(Command::Delete),
        "mv" => parse_mv(rest),
        "search" => one_arg(rest, "search").map(Command::Search),
        "exit" => no_args(rest, "exit").map(|_| Command::Exit),
        other => Err(format!("invalid command: unknown verb '{}'", other)),
    }
}

fn one_arg(rest: &str, verb: &str) -> Result<String, String> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    match tokens.len() {
        1 => Ok(tokens[0].to_string()),
        _ => Err(format!("invalid command: '{}' takes exactly one argument", verb)),
    }
}

fn no_args(rest: &str, verb: &str) -> Result<(), String> {
    if rest.split_whitespace().next().is_some() {
        Err(format!("invalid command: '{}' takes no arguments", verb))
    } else {
        Ok(())
    }
}

fn parse_write(rest: &str) -> Result<Command, String> {
    let mut split = rest.splitn(2, char::is_whitespace);
    let name = split.next().unwrap_or("");
    let remainder = split.next().unwrap_or("").trim();
    if name.is_empty() || remainder.is_empty() {
        return Err("invalid command: 'write' takes at least two arguments".to_string());
    }
    Ok(Command::Write(name.to_string(), strip_quotes(remainder)))
}

fn parse_mv(rest: &str) -> Result<Command, String> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    match tokens.len() {
        2 => Ok(Command::Mv(tokens[0].to_string(), tokens[1].to_string())),
        _ => Err("invalid command: 'mv' takes exactly two arguments".to_string()),
    }
}

/// Strip one surrounding pair of `"` characters, if present.
fn strip_quotes(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Run the interactive REPL against `vfs` until `exit` or EOF, then
/// perform the final save.
pub fn run(mut vfs: VirtualFs) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "{}> ", vfs.cwd_path())?;
        stdout.flush()?;

        let mut line = String::new();
        let bytes_read = stdin.lock().read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                debug!("dispatching command: {:?}", cmd);
                execute(&mut vfs, cmd);
            }
            Err(msg) => println!("Error: {}", msg),
        }
    }

    if let Err(e) = vfs.final_save() {
        println!("Error: {}", e);
    }
    Ok(())
}

fn execute(vfs: &mut VirtualFs, cmd: Command) {
    match cmd {
        Command::Mkdir(name) => report(vfs.mkdir(&name)),
        Command::Cd(arg) => report(vfs.cd(&arg)),
        Command::Ls => print_ls(vfs),
        Command::Create(name) => report(vfs.create(&name)),
        Command::Open(name) => report(vfs.open_file(&name)),
        Command::Close(name) => report(vfs.close_file(&name)),
        Command::Write(name, payload) => report(vfs.write_file(&name, payload.as_bytes())),
        Command::Read(name) => print_read(vfs, &name),
        Command::Delete(name) => report(vfs.delete(&name)),
        Command::Mv(src, dst) => print_mv(vfs, &src, &dst),
        Command::Search(name) => print_search(vfs, &name),
        Command::Exit => unreachable!("exit is handled by the caller before dispatch"),
    }
}

fn report(result: crate::error::Result<()>) {
    if let Err(e) = result {
        print_error(&e);
    }
}

fn print_error(e: &FsError) {
    match e {
        FsError::NotFound(_) => println!("Not found."),
        other => println!("Error: {}", other),
    }
}

fn print_ls(vfs: &VirtualFs) {
    for (name, kind, size) in vfs.ls() {
        match kind {
            Kind::Dir => println!("[DIR] {}", name),
            Kind::File => println!("[FILE] {} (Size: {})", name, size.unwrap_or(0)),
        }
    }
}

fn print_read(vfs: &mut VirtualFs, name: &str) {
    match vfs.read_file(name) {
        Ok(data) => println!("{}", String::from_utf8_lossy(&data)),
        Err(e) => print_error(&e),
    }
}

fn print_search(vfs: &VirtualFs, name: &str) {
    for (path, kind) in vfs.search(name) {
        match kind {
            Kind::Dir => println!("[DIR] {}", path),
            Kind::File => println!("[FILE] {}", path),
        }
    }
}

fn print_mv(vfs: &mut VirtualFs, src: &str, dst: &str) {
    match vfs.mv(src, dst) {
        Ok(true) => println!("Note: '{}' was open and has been closed by the move.", src),
        Ok(false) => {}
        Err(e) => print_error(&e),
    }
}
