use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::parser::Parser;
use rox::report::{ErrorReport, Reporter};
use rox::scanner::{self, Scanner};
use rox::token::Token;
use rox::{Lox, RunStatus};

/// Exit code for command-line usage errors.
const EX_USAGE: i32 = 64;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the token list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file and prints its syntax tree
    Parse { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program
    Run { filename: Option<PathBuf> },

    /// Starts an interactive prompt; globals persist between lines
    Repl,
}

/// Reads the contents of a file into a String
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Configure env_logger to write to file with module and source line
    Builder::new()
        .format(|buf, record| {
            // Strip 'rox::' from module path
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);

            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Print collected diagnostics to stderr.
fn dump(report: &ErrorReport) -> Result<()> {
    report
        .dump(&mut io::stderr().lock())
        .context("Failed to write diagnostics")
}

fn missing_file() -> ! {
    eprintln!("No input filepath was provided.");
    std::process::exit(EX_USAGE);
}

fn tokenize(source: &str, json: bool) -> Result<i32> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut tokenized = true;

    for token in Scanner::new(source) {
        match token {
            Ok(token) => tokens.push(token),

            Err(e) => {
                tokenized = false;
                debug!("Tokenization error: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    Ok(if tokenized {
        RunStatus::Ok.exit_code()
    } else {
        RunStatus::StaticError.exit_code()
    })
}

fn parse(source: &str) -> Result<i32> {
    let mut report = ErrorReport::new();
    let tokens = scanner::scan(source, &mut report);
    let statements = Parser::new(&tokens, &mut report).parse();

    if report.had_error() {
        dump(&report)?;
        return Ok(RunStatus::StaticError.exit_code());
    }

    for stmt in &statements {
        println!("{}", AstPrinter::print_stmt(stmt));
    }

    Ok(RunStatus::Ok.exit_code())
}

fn run(source: &str) -> Result<i32> {
    let mut lox = Lox::new();
    let status = lox.run(source);

    dump(lox.report())?;

    Ok(status.exit_code())
}

fn repl() -> Result<i32> {
    let mut lox = Lox::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            writeln!(stdout)?;
            return Ok(0);
        }

        let status = lox.run(&line);
        debug!("REPL line finished with {:?}", status);

        // Each line reports on its own; nothing carries over to the next.
        for error in lox.report_mut().take() {
            eprintln!("{}", error);
        }
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let code: i32 = match args.commands {
        Commands::Tokenize { filename, json } => {
            let filename = filename.unwrap_or_else(|| missing_file());
            tokenize(&read_file(filename)?, json)?
        }

        Commands::Parse { filename } => {
            let filename = filename.unwrap_or_else(|| missing_file());
            parse(&read_file(filename)?)?
        }

        Commands::Run { filename } => {
            let filename = filename.unwrap_or_else(|| missing_file());
            run(&read_file(filename)?)?
        }

        Commands::Repl => repl()?,
    };

    if code != 0 {
        debug!("Exiting with code {}", code);
        std::process::exit(code);
    }

    Ok(())
}
