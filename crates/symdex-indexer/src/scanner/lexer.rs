//! Token stream for the symbol scanner, backed by the tree-sitter PHP grammar.
//!
//! The source is parsed into a syntax tree and its leaves are reported in
//! source order. Only the token kinds the symbol scanner cares about are
//! distinguished; everything else is reported as [`TokenKind::Other`].

use std::fmt;
use tree_sitter::{Node, Parser, Tree};

/// Kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `namespace` opening a namespace definition
    Namespace,
    /// `class`, `interface`, `trait` or `enum` opening a declaration
    TypeKeyword,
    /// Name segment or `\` separator of a possibly qualified name
    Identifier,
    /// `{`, including `${` inside interpolated strings
    BraceOpen,
    /// `}`
    BraceClose,
    Comment,
    Whitespace,
    Other,
}

/// A token borrowing its text from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on line {}", self.message, self.line)
    }
}

impl std::error::Error for LexError {}

/// Turns file text into a token stream.
pub trait Lexer {
    fn tokenize<'a>(&self, source: &'a str) -> Result<Vec<Token<'a>>, LexError>;
}

/// Default lexer.
///
/// Text outside `<?php ... ?>` tags is inert when the file uses tags at all;
/// a file without any open tag is parsed as code from the first byte.
/// Everything from `__halt_compiler` on is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceLexer;

impl Lexer for SourceLexer {
    fn tokenize<'a>(&self, source: &'a str) -> Result<Vec<Token<'a>>, LexError> {
        let tree = parse(source)?;

        // Data after the halt marker is not code; parse again without it.
        if let Some(halt) = halt_offset(&tree, source) {
            let code = &source[..halt];
            let tree = parse(code)?;
            return leaves(&tree, code);
        }

        leaves(&tree, source)
    }
}

const DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "trait_declaration",
    "enum_declaration",
];

fn parse(source: &str) -> Result<Tree, LexError> {
    let language = if source.contains("<?") {
        tree_sitter_php::LANGUAGE_PHP
    } else {
        tree_sitter_php::LANGUAGE_PHP_ONLY
    };

    let mut parser = Parser::new();
    parser
        .set_language(&language.into())
        .map_err(|e| LexError {
            message: format!("Failed to set language: {}", e),
            line: 1,
        })?;

    parser.parse(source, None).ok_or_else(|| LexError {
        message: "Failed to parse content".to_string(),
        line: 1,
    })
}

/// Byte offset of the first `__halt_compiler` token, if any.
fn halt_offset(tree: &Tree, source: &str) -> Option<usize> {
    let mut offset = None;
    walk_leaves(tree, |node| {
        let is_halt = node.kind() == "name" || node.kind().eq_ignore_ascii_case("__halt_compiler");
        if offset.is_none()
            && is_halt
            && source[node.byte_range()].eq_ignore_ascii_case("__halt_compiler")
        {
            offset = Some(node.start_byte());
        }
    });
    offset
}

fn leaves<'a>(tree: &Tree, source: &'a str) -> Result<Vec<Token<'a>>, LexError> {
    let root = tree.root_node();
    if root.has_error() {
        return Err(syntax_error(root));
    }

    let mut tokens = Vec::new();
    walk_leaves(tree, |node| {
        if node.byte_range().is_empty() {
            return;
        }
        tokens.push(Token {
            kind: classify(node),
            text: &source[node.byte_range()],
        });
    });
    Ok(tokens)
}

fn classify(node: Node<'_>) -> TokenKind {
    let parent = node.parent().map(|p| p.kind()).unwrap_or_default();
    match node.kind() {
        "namespace" if parent == "namespace_definition" => TokenKind::Namespace,
        "class" | "interface" | "trait" | "enum" if DECLARATIONS.contains(&parent) => {
            TokenKind::TypeKeyword
        }
        "name" if parent != "variable_name" => TokenKind::Identifier,
        "\\" => TokenKind::Identifier,
        "{" | "${" => TokenKind::BraceOpen,
        "}" => TokenKind::BraceClose,
        "comment" => TokenKind::Comment,
        _ => TokenKind::Other,
    }
}

/// Visit every leaf of the tree in source order.
fn walk_leaves<'t>(tree: &'t Tree, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = tree.walk();
    loop {
        if cursor.goto_first_child() {
            continue;
        }
        visit(cursor.node());
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Describe the first error or missing node below `node`.
fn syntax_error(node: Node<'_>) -> LexError {
    let mut current = node;
    'descend: loop {
        for i in 0..current.child_count() {
            let Some(child) = current.child(i) else {
                continue;
            };
            if child.is_error() || child.is_missing() {
                current = child;
                break 'descend;
            }
            if child.has_error() {
                current = child;
                continue 'descend;
            }
        }
        break;
    }

    let message = if current.is_missing() {
        format!("Missing '{}'", current.kind())
    } else {
        "Syntax error".to_string()
    };
    LexError {
        message,
        line: current.start_position().row + 1,
    }
}
