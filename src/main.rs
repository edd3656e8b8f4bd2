use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser as ClapParser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ethlog_lang::ast::walk::{walk, ConditionEvent, QueryListener, ScopeEntry};
use ethlog_lang::ast::{Filter, Statement};
use ethlog_lang::compile::{compile_document, parse_query, CompileError};
use ethlog_lang::lexer::Lexer;
use ethlog_lang::program::CancelFlag;
use ethlog_lang::runtime::{self, FixtureClient, FolderSink};
use ethlog_lang::verify::{Diagnostic, Severity};

#[derive(ClapParser)]
#[command(name = "ethlog", version, about = "Extract Ethereum data with a query language")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the token stream (debug)
    Tokenize {
        /// Path to the query file
        file: PathBuf,
    },
    /// Parse and display the scope outline
    Parse {
        /// Path to the query file
        file: PathBuf,
    },
    /// Run semantic analysis and report diagnostics
    Check {
        /// Path to the query file
        file: PathBuf,
        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compile and execute a query against recorded chain data
    Run {
        /// Path to the query file
        file: PathBuf,
        /// Chain fixture in JSON
        #[arg(long)]
        fixture: PathBuf,
        /// Output folder; overrides SET OUTPUT FOLDER
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let exit_code = match cli.command {
        Commands::Tokenize { file } => cmd_tokenize(&file),
        Commands::Parse { file } => cmd_parse(&file),
        Commands::Check { file, json } => cmd_check(&file, json),
        Commands::Run {
            file,
            fixture,
            output,
        } => cmd_run(&file, &fixture, output),
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

const MAX_SOURCE_SIZE: u64 = 10 * 1024 * 1024;

fn read_source(path: &Path) -> Result<(String, String), i32> {
    let filename = path.to_string_lossy().to_string();

    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_SOURCE_SIZE => {
            eprintln!(
                "Error: file {} is too large ({} bytes, max {} bytes)",
                filename,
                meta.len(),
                MAX_SOURCE_SIZE
            );
            return Err(1);
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: cannot read file {}: {}", filename, e);
            return Err(1);
        }
    }

    match std::fs::read_to_string(path) {
        Ok(source) => Ok((source, filename)),
        Err(e) => {
            eprintln!("Error: cannot read file {}: {}", filename, e);
            Err(1)
        }
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        println!("  {}", d);
    }
}

fn cmd_tokenize(path: &Path) -> i32 {
    let (source, filename) = match read_source(path) {
        Ok(r) => r,
        Err(code) => return code,
    };

    match Lexer::new(&source, &filename).tokenize() {
        Ok(tokens) => {
            for tok in &tokens {
                println!("{}", tok);
            }
            0
        }
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            1
        }
    }
}

/// Prints one line per scope and statement, indented by nesting depth.
struct Outline {
    depth: usize,
}

impl QueryListener for Outline {
    fn enter_scope(&mut self, scope: ScopeEntry<'_>) {
        let detail = match scope.filter() {
            Some(Filter::LogEntries { event, .. }) => format!(" {}", event.name),
            Some(Filter::SmartContract { queries, .. }) => format!(" ({} queries)", queries.len()),
            _ => String::new(),
        };
        println!("{}{}{} @ {}", "  ".repeat(self.depth), scope.kind(), detail, scope.loc());
        self.depth += 1;
    }

    fn exit_scope(&mut self, _scope: ScopeEntry<'_>) {
        self.depth -= 1;
    }

    fn statement(&mut self, statement: &Statement) {
        let text = match statement {
            Statement::Declaration { ty, name, .. } => format!("declare {} {}", ty, name),
            Statement::Assignment { name, .. } => format!("assign {}", name),
            Statement::Call(call) => format!("call {}", call.name),
            Statement::Emit(emit) => format!("emit ({} values)", emit.values().len()),
            Statement::Scope(_) => return,
        };
        println!("{}{}", "  ".repeat(self.depth), text);
    }

    fn condition(&mut self, event: ConditionEvent<'_>) {
        println!("{}? {:?} @ {}", "  ".repeat(self.depth), event, event.loc());
    }
}

fn cmd_parse(path: &Path) -> i32 {
    let (source, filename) = match read_source(path) {
        Ok(r) => r,
        Err(code) => return code,
    };

    match parse_query(&source, &filename) {
        Ok(document) => {
            walk(&document, &mut Outline { depth: 0 });
            0
        }
        Err(d) => {
            eprintln!("{}", d);
            1
        }
    }
}

fn cmd_check(path: &Path, json: bool) -> i32 {
    let (source, filename) = match read_source(path) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let diagnostics = match parse_query(&source, &filename) {
        Ok(document) => ethlog_lang::verify::analyze(&document),
        Err(d) => vec![d],
    };

    if json {
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    } else {
        print_diagnostics(&diagnostics);
    }

    let count = |severity| diagnostics.iter().filter(|d| d.severity == severity).count();
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    if json {
        return i32::from(errors > 0);
    }
    println!();
    if errors > 0 {
        println!("{}: FAIL ({} error(s), {} warning(s))", filename, errors, warnings);
        1
    } else if warnings > 0 {
        println!("{}: WARN ({} warning(s))", filename, warnings);
        0
    } else {
        println!("{}: OK", filename);
        0
    }
}

fn cmd_run(path: &Path, fixture: &Path, output: Option<PathBuf>) -> i32 {
    let (source, filename) = match read_source(path) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let document = match parse_query(&source, &filename) {
        Ok(document) => document,
        Err(d) => {
            eprintln!("{}", d);
            return 1;
        }
    };
    let compiled = match compile_document(&document) {
        Ok(compiled) => compiled,
        Err(CompileError::Rejected(diagnostics)) => {
            print_diagnostics(&diagnostics);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    print_diagnostics(&compiled.diagnostics);

    let client = match FixtureClient::from_path(fixture) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: cannot load fixture {}: {}", fixture.display(), e);
            return 1;
        }
    };

    let config = compiled.config.with_output_folder(output);
    let folder = config
        .output_folder
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    if let Some(connection) = &config.connection {
        info!(%connection, "connection setting ignored when running from a fixture");
    }
    let mut sink = match FolderSink::new(&folder, config.emission_mode) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match runtime::run(&compiled.program, &client, &mut sink, CancelFlag::new()) {
        Ok(()) => {
            info!(folder = %folder.display(), "output written");
            0
        }
        Err(e) => {
            error!(cause = %e.root_cause(), "run aborted");
            eprintln!("Runtime error: {}", e);
            1
        }
    }
}
