use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sable::bytecode::disasm;
use sable::frontend::Lexer;
use sable::frontend::token_dumper::TokenDumper;
use sable::{Address, Bytecode, Contract, FileStorage, Hash, Storage, Value, Vm, Word};

#[derive(Parser, Debug)]
#[command(name = "sable")]
#[command(about = "Compile and run Sable smart contracts")]
struct Cli {
    /// Log compiler and VM activity
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show tokens only
    Tokens {
        file: PathBuf,
        #[arg(long)]
        no_color: bool,
        #[arg(long)]
        pretty: bool,
    },

    /// Print the parsed contract
    Ast { file: PathBuf },

    /// Emit bytecode as JSON
    Compile {
        file: PathBuf,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Disassemble a source file or a bytecode JSON file
    Disasm { file: PathBuf },

    /// Compile and deploy into a state directory, printing the address
    Deploy {
        file: PathBuf,
        #[arg(long)]
        state: PathBuf,
    },

    /// Call a function of a deployed contract
    Call {
        address: String,
        index: usize,
        args: Vec<String>,
        #[arg(long)]
        state: PathBuf,
    },

    /// Compile, deploy and call against in-memory storage
    Run {
        file: PathBuf,
        /// Function index, or its name when `file` is source
        function: String,
        args: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("'{0}' is not a contract address")]
    BadAddress(String),

    #[error("no function named '{0}'")]
    UnknownFunction(String),

    #[error(transparent)]
    Sable(#[from] sable::Error),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            CliError::Read { .. } | CliError::Write { .. } => "io_error",
            CliError::BadAddress(_) | CliError::UnknownFunction(_) => "usage_error",
            CliError::Sable(e) => e.code(),
        }
    }
}

impl From<sable::CompileError> for CliError {
    fn from(e: sable::CompileError) -> Self {
        CliError::Sable(e.into())
    }
}

impl From<sable::ExecutionFault> for CliError {
    fn from(e: sable::ExecutionFault) -> Self {
        CliError::Sable(e.into())
    }
}

impl From<sable::StorageError> for CliError {
    fn from(e: sable::StorageError) -> Self {
        CliError::Sable(e.into())
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "sable=debug" } else { "sable=warn" })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Tokens {
            file,
            no_color,
            pretty,
        } => dump_tokens(&file, no_color, pretty),
        Command::Ast { file } => print_ast(&file),
        Command::Compile { file, output } => compile_file(&file, output.as_deref()),
        Command::Disasm { file } => disassemble(&file),
        Command::Deploy { file, state } => deploy(&file, &state),
        Command::Call {
            address,
            index,
            args,
            state,
        } => call(&address, index, &args, &state),
        Command::Run {
            file,
            function,
            args,
        } => run(&file, &function, &args),
    };

    if let Err(e) = result {
        eprintln!("error[{}]: {}", e.code(), e);
        process::exit(1);
    }
}

fn read_source(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn dump_tokens(path: &Path, no_color: bool, pretty: bool) -> Result<(), CliError> {
    let source = read_source(path)?;
    let tokens = Lexer::new(&source)
        .tokenize()
        .map_err(sable::CompileError::from)?;

    let mut dumper = TokenDumper::new();
    if no_color {
        dumper = dumper.no_color();
    }
    if pretty {
        dumper = dumper.pretty();
    }

    dumper.dump(&tokens);
    Ok(())
}

fn parse_contract(path: &Path) -> Result<Contract, CliError> {
    let source = read_source(path)?;
    let tokens = Lexer::new(&source)
        .tokenize()
        .map_err(sable::CompileError::from)?;
    let contract = sable::frontend::Parser::new(tokens)
        .parse()
        .map_err(sable::CompileError::from)?;
    Ok(contract)
}

fn print_ast(path: &Path) -> Result<(), CliError> {
    println!("{:#?}", parse_contract(path)?);
    Ok(())
}

fn compile_file(path: &Path, output: Option<&Path>) -> Result<(), CliError> {
    let bytecode = sable::compile(&read_source(path)?)?;
    let json = bytecode.to_json()?;

    match output {
        Some(out) => {
            fs::write(out, json).map_err(|source| CliError::Write {
                path: out.to_path_buf(),
                source,
            })?;
            info!(path = %out.display(), "wrote bytecode");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn is_bytecode_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

/// `.json` files are read as bytecode, everything else as source.
fn load_bytecode(path: &Path) -> Result<Bytecode, CliError> {
    let text = read_source(path)?;
    if is_bytecode_file(path) {
        Ok(Bytecode::from_json(&text)?)
    } else {
        Ok(sable::compile(&text)?)
    }
}

fn disassemble(path: &Path) -> Result<(), CliError> {
    let bytecode = load_bytecode(path)?;
    disasm::print_bc(&bytecode);
    Ok(())
}

/// Contract storage lives in `<state>/<address>.json`, the account index in
/// `<state>/accounts.json`.
fn open_state(
    state: &Path,
    address: &Address,
) -> Result<Vm<FileStorage, FileStorage>, CliError> {
    let storage = FileStorage::open(state.join(format!("{}.json", address)))?;
    let accounts = FileStorage::open(state.join("accounts.json"))?;
    Ok(Vm::new(storage, accounts))
}

fn deploy(path: &Path, state: &Path) -> Result<(), CliError> {
    let bytecode = load_bytecode(path)?;
    let address = bytecode.address()?;

    let mut vm = open_state(state, &address)?;
    vm.load(bytecode)?;
    vm.deploy()?;

    let root = vm.storage().root_hash()?;
    debug!(%address, %root, "deployed");
    println!("{}", address);
    Ok(())
}

fn call(address: &str, index: usize, args: &[String], state: &Path) -> Result<(), CliError> {
    let address =
        Hash::from_hex(address).ok_or_else(|| CliError::BadAddress(address.to_string()))?;

    let mut vm = open_state(state, &address)?;
    let bytecode = vm.get_bytecode(&address)?;
    vm.load(bytecode)?;

    let result = vm.call_function(index, &parse_args(args))?;
    print_result(result);
    Ok(())
}

/// A numeric `function` is taken as the table index; otherwise it is looked
/// up by name in the source.
fn resolve_function(path: &Path, function: &str) -> Result<usize, CliError> {
    if let Ok(index) = function.parse() {
        return Ok(index);
    }
    if is_bytecode_file(path) {
        return Err(CliError::UnknownFunction(function.to_string()));
    }
    parse_contract(path)?
        .function_index(function)
        .ok_or_else(|| CliError::UnknownFunction(function.to_string()))
}

fn run(path: &Path, function: &str, args: &[String]) -> Result<(), CliError> {
    let bytecode = load_bytecode(path)?;
    let index = resolve_function(path, function)?;

    let mut vm = Vm::in_memory();
    vm.load(bytecode)?;
    vm.deploy()?;

    let result = vm.call_function(index, &parse_args(args))?;
    print_result(result);
    Ok(())
}

fn parse_args(args: &[String]) -> Vec<Value> {
    args.iter().map(|a| Value::parse_arg(a)).collect()
}

fn print_result(result: Option<Word>) {
    match result {
        Some(word) => println!("{}", word.describe()),
        None => println!("(no value)"),
    }
}
