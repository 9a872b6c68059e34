use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use assignc::diagnostics::{diagnostic_from_anyhow, DiagnosticStage};
use assignc::{build, to_source, FrontendError, ParseOptions, SourceFile};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

fn main() -> anyhow::Result<()> {
    initialize_logging();

    let assignc = Assignc::parse();

    let result = match assignc.subcmd {
        AssigncSubcommand::Tokens(opts) => run_tokens(opts),
        AssigncSubcommand::Parse(opts) => run_parse(opts),
        AssigncSubcommand::Build(opts) => run_build(opts),
    };

    match result {
        Ok(()) => Ok(()),
        Err(Failure::Frontend(source, error)) => {
            eprintln!("{}", source.diagnostic(&error).render_terminal_auto());
            std::process::exit(1);
        }
        Err(Failure::Other(error)) => {
            let diagnostic = diagnostic_from_anyhow(
                DiagnosticStage::Io,
                "ASSIGNC-IO-001",
                "assignc failed",
                &error,
            );
            eprintln!("{}", diagnostic.render_terminal_auto());
            std::process::exit(1);
        }
    }
}

enum Failure {
    Frontend(SourceFile, FrontendError),
    Other(anyhow::Error),
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Failure::Other(error)
    }
}

fn run_tokens(opts: TokensOpts) -> Result<(), Failure> {
    let source = SourceFile::read(&opts.source)?;
    let tokens = match source.tokenize() {
        Ok(tokens) => tokens,
        Err(error) => return Err(Failure::Frontend(source, error)),
    };
    let json = serde_json::to_string_pretty(&tokens).context("failed to serialize tokens")?;
    emit(opts.output, json)?;
    Ok(())
}

fn run_parse(opts: ParseOpts) -> Result<(), Failure> {
    let source = SourceFile::read(&opts.source)?;
    let options = ParseOptions {
        max_depth: opts.max_depth,
    };
    let ast = match source.parse(options) {
        Ok((_, ast)) => ast,
        Err(error) => return Err(Failure::Frontend(source, error)),
    };
    let rendered = match opts.format {
        AstFormat::Json => serde_json::to_string_pretty(&ast).context("failed to serialize ast")?,
        AstFormat::Tree => ast.to_string(),
        AstFormat::Source => to_source(&ast),
    };
    emit(opts.output, rendered)?;
    Ok(())
}

fn run_build(opts: BuildOpts) -> Result<(), Failure> {
    let source = SourceFile::read(&opts.source)?;
    let options = ParseOptions {
        max_depth: opts.max_depth,
    };
    match build(&source, &opts.target_dir, options) {
        Ok(artifacts) => {
            info!(
                tokens_path = %artifacts.tokens_path.display(),
                ast_path = %artifacts.ast_path.display(),
                "Build finished"
            );
            Ok(())
        }
        Err(error) => match error.downcast::<FrontendError>() {
            Ok(frontend) => Err(Failure::Frontend(source, frontend)),
            Err(other) => Err(Failure::Other(other)),
        },
    }
}

fn emit(output: Option<PathBuf>, mut text: String) -> anyhow::Result<()> {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    match output {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(output = %path.display(), "Output written");
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn initialize_logging() {
    let env_filter = env::var("RUST_LOG").unwrap_or_default();
    let filter = EnvFilter::from_str(&env_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .init();
}

#[derive(clap::Parser)]
#[clap(
    name = "assignc",
    about = "Tokenize and parse integer assignment programs."
)]
struct Assignc {
    #[clap(subcommand)]
    subcmd: AssigncSubcommand,
}

#[derive(clap::Subcommand)]
enum AssigncSubcommand {
    /// Print the token stream as JSON
    Tokens(TokensOpts),
    /// Print the syntax tree
    Parse(ParseOpts),
    /// Write tokens.json and ast.json into a target directory
    Build(BuildOpts),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum AstFormat {
    Json,
    Tree,
    Source,
}

#[derive(clap::Parser)]
struct TokensOpts {
    /// Path to the source file
    source: PathBuf,

    /// Write to this file instead of stdout
    #[clap(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::Parser)]
struct ParseOpts {
    /// Path to the source file
    source: PathBuf,

    #[clap(short, long, value_enum, default_value = "json")]
    format: AstFormat,

    /// Maximum expression nesting depth; each operator in a chain counts as one level
    #[clap(long, default_value_t = assignc::parser::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Write to this file instead of stdout
    #[clap(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::Parser)]
struct BuildOpts {
    /// Path to the source file
    source: PathBuf,

    #[clap(long, default_value = "target/assignc")]
    target_dir: PathBuf,

    /// Maximum expression nesting depth; each operator in a chain counts as one level
    #[clap(long, default_value_t = assignc::parser::DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}
