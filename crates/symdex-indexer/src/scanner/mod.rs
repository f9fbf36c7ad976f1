//! Symbol extraction from source files.
//!
//! The scanner walks a token stream and records every type declaration
//! (`class`, `interface`, `trait`, `enum`) found at the top level of its
//! namespace, qualified with that namespace.

mod lexer;

pub use lexer::{LexError, Lexer, SourceLexer, Token, TokenKind};

use crate::IndexerError;
use std::path::Path;
use tracing::debug;

/// Extracts declared symbol names from files.
pub struct SymbolScanner {
    lexer: Box<dyn Lexer>,
    report_parse_errors: bool,
}

impl SymbolScanner {
    /// Create a scanner using the default lexer.
    pub fn new(report_parse_errors: bool) -> Self {
        Self::with_lexer(Box::new(SourceLexer), report_parse_errors)
    }

    /// Create a scanner with a custom lexer.
    pub fn with_lexer(lexer: Box<dyn Lexer>, report_parse_errors: bool) -> Self {
        Self {
            lexer,
            report_parse_errors,
        }
    }

    /// Scan one file.
    ///
    /// In `single_file` mode the file stem is added as a synthetic symbol so
    /// files loaded by naming convention can be resolved too.
    pub fn scan_file(&self, path: &Path, single_file: bool) -> Result<Vec<String>, IndexerError> {
        let bytes = std::fs::read(path).map_err(|e| IndexerError::io(path, e))?;
        let source = String::from_utf8_lossy(&bytes);

        let mut symbols = match self.lexer.tokenize(&source) {
            Ok(tokens) => extract_symbols(&tokens),
            Err(e) if self.report_parse_errors => {
                return Err(IndexerError::Scan {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
            Err(e) => {
                debug!(path = ?path, error = %e, "Ignoring unparsable file");
                Vec::new()
            }
        };

        if single_file {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !symbols.iter().any(|s| s == stem) {
                    symbols.push(stem.to_string());
                }
            }
        }

        debug!(path = ?path, symbols = symbols.len(), "Scanned file");
        Ok(symbols)
    }

    /// Scan in-memory source text.
    pub fn scan_source(&self, source: &str) -> Result<Vec<String>, LexError> {
        self.lexer.tokenize(source).map(|tokens| extract_symbols(&tokens))
    }
}

impl Default for SymbolScanner {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Expect {
    Namespace,
    Declaration,
}

/// Walk the tokens and collect top-level declarations.
fn extract_symbols(tokens: &[Token<'_>]) -> Vec<String> {
    let mut symbols = Vec::new();
    let mut expected: Option<Expect> = None;
    let mut name = String::new();
    let mut namespace = String::new();
    let mut level: i64 = 0;
    let mut min_level: i64 = 0;

    for token in tokens {
        match token.kind {
            TokenKind::Comment | TokenKind::Whitespace => continue,
            TokenKind::Identifier => {
                if expected.is_some() {
                    name.push_str(token.text);
                }
                continue;
            }
            TokenKind::Namespace => {
                expected = Some(Expect::Namespace);
                name.clear();
                continue;
            }
            TokenKind::TypeKeyword => {
                expected = Some(Expect::Declaration);
                name.clear();
                continue;
            }
            TokenKind::BraceOpen | TokenKind::BraceClose | TokenKind::Other => {}
        }

        match expected.take() {
            Some(Expect::Namespace) => {
                namespace = if name.is_empty() {
                    String::new()
                } else {
                    format!("{}\\", name)
                };
                min_level = if token.kind == TokenKind::BraceOpen { 1 } else { 0 };
            }
            Some(Expect::Declaration) if !name.is_empty() && level == min_level => {
                symbols.push(format!("{}{}", namespace, name));
            }
            _ => {}
        }

        match token.kind {
            TokenKind::BraceOpen => level += 1,
            TokenKind::BraceClose => level -= 1,
            _ => {}
        }
    }

    symbols
}
