// SPDX-License-Identifier: Apache-2.0 WITH LLVM-Exception

use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, ValueHint};
use infinity_notegen::{translate, NotegenOptions};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None, max_term_width = 72)]
struct Args {
    /// Name of output file, or "-" for stdout
    ///
    /// The default is stdout.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Path to the note AST, in JSON, or "-" (default) for stdin
    #[arg(index = 1, value_name = "INPUT-FILE")]
    input: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let stderr = std::io::stderr();

    if args.input.is_none() && stdin.is_terminal() {
        eprintln!("\u{1b}[1m\u{1b}[31minfinity-notegen: reading input from stdin, but stdin is a tty. Add \"-\" to the command line if you want to force this.\u{1b}[39m\u{1b}[22m");
        return ExitCode::FAILURE;
    }

    if args.output.is_none() && stdout.is_terminal() {
        eprintln!("\u{1b}[1m\u{1b}[31minfinity-notegen: writing output to stdout, but stdout is a tty. Add \"-o -\" to the command line if you want to force this.\u{1b}[39m\u{1b}[22m");
        return ExitCode::FAILURE;
    }

    let input = if args.input.as_deref() == Some(Path::new("-")) {
        None
    } else {
        args.input
    };
    let output = if args.output.as_deref() == Some(Path::new("-")) {
        None
    } else {
        args.output
    };

    let mut options = NotegenOptions::new();
    options.set_input(input);
    options.set_output(output);

    match translate(&options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            if stderr.is_terminal() {
                eprintln!("\u{1b}[1m\u{1b}[31minfinity-notegen: {err}\u{1b}[39m\u{1b}[22m");
            } else {
                eprintln!("infinity-notegen: {err}");
            }
            ExitCode::FAILURE
        }
    }
}
