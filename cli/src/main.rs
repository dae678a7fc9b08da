use std::path::PathBuf;

use argspec_core::{CommandSchema, HelpFlag, ParseResult, load_definition};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "argspec")]
#[command(about = "Check argument schemas and parse command lines against them")]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and normalize a schema file, reporting every definition error.
    Check(CheckArgs),
    /// Parse a token list against a schema and print the result.
    Parse(ParseArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Schema file (YAML, or JSON with a .json extension).
    schema: PathBuf,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Schema file (YAML, or JSON with a .json extension).
    #[arg(long)]
    schema: PathBuf,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    /// Treat --help, -h and -? as help requests.
    #[arg(long)]
    help_flag: bool,
    /// Tokens to parse, program name first (pass them after `--`).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Command::Check(args) => run_check(args),
        Command::Parse(args) => run_parse(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn run_check(args: CheckArgs) -> Result<(), String> {
    let definition = load_definition(&args.schema)
        .map_err(|err| format!("Failed to load '{}': {err}", args.schema.display()))?;
    let root = definition
        .root()
        .ok_or_else(|| format!("'{}' has no root command", args.schema.display()))?;

    let counts = SchemaCounts::of(root);
    println!(
        "Schema '{}' is valid: {} command(s), {} option(s), {} argument(s).",
        root.name, counts.commands, counts.options, counts.arguments
    );
    Ok(())
}

fn run_parse(args: ParseArgs) -> Result<(), String> {
    let definition = load_definition(&args.schema)
        .map_err(|err| format!("Failed to load '{}': {err}", args.schema.display()))?;
    let mut parser = definition.parser().map_err(|err| err.to_string())?;
    if args.help_flag {
        parser = parser.with(HelpFlag::default());
    }

    debug!(tokens = args.tokens.len(), "parsing");
    let result = parser.parse(&args.tokens);
    println!("{}", format_result(&result, args.format)?);

    if result.has_errors() {
        return Err(match &result.error {
            Some(err) => err.to_string(),
            None => "command line has errors".to_string(),
        });
    }
    Ok(())
}

fn format_result(result: &ParseResult<'_>, format: CliOutputFormat) -> Result<String, String> {
    match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(result)
            .map_err(|err| format!("Failed to serialize result: {err}")),
        CliOutputFormat::Yaml => serde_yaml::to_string(result)
            .map_err(|err| format!("Failed to serialize result: {err}")),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SchemaCounts {
    commands: usize,
    options: usize,
    arguments: usize,
}

impl SchemaCounts {
    fn of(command: &CommandSchema) -> Self {
        let mut counts = Self::default();
        counts.add(command);
        counts
    }

    fn add(&mut self, command: &CommandSchema) {
        self.commands += 1;
        self.options += command.options.len();
        self.arguments += command.arguments.len();
        for sub in &command.commands {
            self.add(sub);
        }
    }
}
