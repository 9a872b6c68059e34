//! Front-end for a small language of integer assignment statements.
//!
//! ```text
//! Program     := Statement*
//! Statement   := Variable '=' Expression ';'
//! Expression  := '(' Expression ')' (Operator Term)?
//!              | Term (Operator Expression)?
//! Term        := Integer | Variable
//! ```
//!
//! Source text goes through [`tokenize`] and then [`parse`]. All operators
//! share one precedence level and chain to the right.

pub mod diagnostics;
pub mod parser;
pub mod printer;
pub mod tokenizer;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, trace};

pub use parser::{
    parse, parse_with_options, Assignment, Ast, Expression, Operator, ParseError, ParseOptions,
};
pub use printer::to_source;
pub use tokenizer::{tokenize, Position, Token, TokenKind, TokenizeError};

use diagnostics::{diagnostic_from_parse_error, diagnostic_from_tokenize_error, CompilerDiagnostic};

/// Failure of either front-end stage.
#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A program read from disk, kept around so errors can point into it.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        trace!(source_len = text.len(), path = %path.display(), "Read input file");
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    pub fn tokenize(&self) -> Result<Vec<Token>, FrontendError> {
        Ok(tokenize(&self.text)?)
    }

    pub fn parse(&self, options: ParseOptions) -> Result<(Vec<Token>, Ast), FrontendError> {
        let tokens = self.tokenize()?;
        let ast = parse_with_options(&tokens, options)?;
        Ok((tokens, ast))
    }

    pub fn diagnostic(&self, error: &FrontendError) -> CompilerDiagnostic {
        match error {
            FrontendError::Tokenize(error) => {
                diagnostic_from_tokenize_error(&self.text, Some(&self.path), error)
            }
            FrontendError::Parse(error) => {
                diagnostic_from_parse_error(&self.text, Some(&self.path), error)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct BuildArtifacts {
    pub tokens_path: PathBuf,
    pub ast_path: PathBuf,
}

/// Runs both stages over `source` and writes `tokens.json` and `ast.json`
/// into `target_dir`, creating it if needed. Nothing is written unless both
/// stages succeed.
pub fn build(
    source: &SourceFile,
    target_dir: &Path,
    options: ParseOptions,
) -> anyhow::Result<BuildArtifacts> {
    let (tokens, ast) = source.parse(options)?;

    std::fs::create_dir_all(target_dir)
        .with_context(|| format!("failed to create {}", target_dir.display()))?;

    let tokens_path = target_dir.join("tokens.json");
    write_json(&tokens_path, &tokens)?;
    debug!(tokens_path = %tokens_path.display(), "Tokenized source file");

    let ast_path = target_dir.join("ast.json");
    write_json(&ast_path, &ast)?;
    info!(
        ast_path = %ast_path.display(),
        statements = ast.statements.len(),
        "Parsed source file"
    );

    Ok(BuildArtifacts {
        tokens_path,
        ast_path,
    })
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{build, FrontendError, ParseOptions, SourceFile};

    fn write_source(dir: &tempfile::TempDir, text: &str) -> SourceFile {
        let path = dir.path().join("program.txt");
        std::fs::write(&path, text).expect("write source");
        SourceFile::read(&path).expect("read source")
    }

    #[test]
    fn build_writes_token_and_ast_artifacts() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let source = write_source(&dir, "a=1;\nb=(a+2)*3;\n");
        let target_dir = dir.path().join("target").join("assignc");

        let artifacts = build(&source, &target_dir, ParseOptions::default()).expect("build");

        let tokens: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&artifacts.tokens_path).expect("read tokens"),
        )
        .expect("tokens are json");
        assert_eq!(tokens.as_array().map(Vec::len), Some(14));

        let ast: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&artifacts.ast_path).expect("read ast"))
                .expect("ast is json");
        assert_eq!(ast["statements"][0]["target"], "a");
        assert_eq!(ast["statements"][1]["value"]["Binary"]["op"], "Mul");
        assert_eq!(
            ast["statements"][1]["value"]["Binary"]["lhs"]["Group"]["Binary"]["op"],
            "Add"
        );
    }

    #[test]
    fn build_surfaces_frontend_errors() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let source = write_source(&dir, "a=(1+2;\n");
        let err = build(&source, &dir.path().join("out"), ParseOptions::default())
            .expect_err("build should fail");
        let frontend = err
            .downcast_ref::<FrontendError>()
            .expect("frontend error");
        assert!(matches!(frontend, FrontendError::Parse(_)));

        let diagnostic = source.diagnostic(frontend);
        assert!(diagnostic.file_id.ends_with("program.txt"));
    }

    #[test]
    fn failed_build_leaves_previous_artifacts_untouched() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let target_dir = dir.path().join("out");

        let good = write_source(&dir, "a=1;\n");
        let artifacts = build(&good, &target_dir, ParseOptions::default()).expect("build");
        let tokens_before = std::fs::read_to_string(&artifacts.tokens_path).expect("read tokens");
        let ast_before = std::fs::read_to_string(&artifacts.ast_path).expect("read ast");

        let bad = write_source(&dir, "b=(2+3;\n");
        build(&bad, &target_dir, ParseOptions::default()).expect_err("build should fail");

        assert_eq!(
            std::fs::read_to_string(&artifacts.tokens_path).expect("read tokens"),
            tokens_before
        );
        assert_eq!(
            std::fs::read_to_string(&artifacts.ast_path).expect("read ast"),
            ast_before
        );
    }

    #[test]
    fn failed_build_does_not_create_target_dir() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let source = write_source(&dir, "a=1@2;\n");
        let target_dir = dir.path().join("out");
        let err = build(&source, &target_dir, ParseOptions::default())
            .expect_err("build should fail");
        assert!(matches!(
            err.downcast_ref::<FrontendError>(),
            Some(FrontendError::Tokenize(_))
        ));
        assert!(!target_dir.exists());
    }

    #[test]
    fn reading_a_missing_file_fails_with_context() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = SourceFile::read(dir.path().join("missing.txt")).expect_err("read should fail");
        assert!(err.to_string().contains("failed to read"));
    }
}
