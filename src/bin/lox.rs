use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser as CliParser;
use colored::Colorize;
use log::debug;

use lox_lang::debug::{dump_ast, dump_tokens};
use lox_lang::interpreter::Interpreter;
use lox_lang::lexer::Lexer;
use lox_lang::parser::Parser;
use lox_lang::resolver::Resolver;

#[derive(CliParser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Source file to run. Starts a REPL when omitted.
    file: Option<std::path::PathBuf>,

    /// Print the token stream and the AST after parsing.
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Warn)?;
    let args = Cli::parse();

    match &args.file {
        Some(file) => run_file(file, args.debug),
        None => repl(args.debug),
    }
}

fn run_file(file: &Path, debug: bool) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Could not read file: '{}'", file.display()))?;

    let mut interpreter = Interpreter::new();
    run(&source, &mut interpreter, debug);

    Ok(())
}

fn repl(debug: bool) -> Result<()> {
    println!("Lox REPL");

    // the interpreter persists across lines so definitions stay usable;
    // lexing, parsing, and resolution run fresh per line
    let mut interpreter = Interpreter::new();

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        run(&line, &mut interpreter, debug);
    }
}

/// Drive one source fragment through the pipeline. Each stage that reports
/// errors prints them and stops the fragment; language-level errors never
/// abort the process.
fn run(source: &str, interpreter: &mut Interpreter, debug: bool) {
    let (tokens, lex_errors) = Lexer::new(source).lex();
    if !lex_errors.is_empty() {
        report(&lex_errors);
        return;
    }
    debug!("lexed {} tokens", tokens.len());

    if debug {
        print!("{}", dump_tokens(&tokens));
    }

    let (statements, parse_errors) = Parser::new(tokens).parse();
    if !parse_errors.is_empty() {
        report(&parse_errors);
        return;
    }
    debug!("parsed {} top-level statements", statements.len());

    if debug {
        print!("{}", dump_ast(&statements));
    }

    let (locals, resolve_errors) = Resolver::new().resolve(&statements);
    if !resolve_errors.is_empty() {
        report(&resolve_errors);
        return;
    }
    debug!("resolved {} local bindings", locals.len());

    interpreter.resolve(locals);
    if let Err(error) = interpreter.interpret(&statements) {
        eprintln!("{}", error.to_string().red());
    }
}

fn report<E: Display>(errors: &[E]) {
    for error in errors {
        eprintln!("{}", error.to_string().red());
    }
}
