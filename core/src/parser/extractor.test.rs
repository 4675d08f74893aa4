use super::*;

fn parse(source: &str, language: &str) -> Vec<AstNode> {
    SourceParser::new().parse_source(source, language).unwrap()
}

#[test]
fn test_typescript_top_level_declarations() {
    let source = r#"import { token } from "./token";

export function validateToken(t: string): boolean {
    return t.length > 0;
}

const MAX_RETRIES = 3;

interface Session {
    id: string;
}
"#;
    let nodes = parse(source, "typescript");

    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes[0].kind, AstNodeKind::Import);
    assert_eq!(nodes[0].line_start, 1);

    assert_eq!(nodes[1].kind, AstNodeKind::Function);
    assert_eq!(nodes[1].name.as_deref(), Some("validateToken"));
    assert!(nodes[1].exported);
    assert_eq!(nodes[1].params.as_deref(), Some("(t: string)"));
    assert_eq!(nodes[1].return_type.as_deref(), Some("boolean"));
    assert!(nodes[1].text.starts_with("export function"));

    assert_eq!(nodes[2].kind, AstNodeKind::Constant);
    assert_eq!(nodes[2].name.as_deref(), Some("MAX_RETRIES"));
    assert!(!nodes[2].exported);

    assert_eq!(nodes[3].kind, AstNodeKind::Type);
    assert_eq!(nodes[3].name.as_deref(), Some("Session"));
}

#[test]
fn test_typescript_class_emits_class_and_methods() {
    let source = r#"export class UserService {
    find(id: string) {
        return this.repo.get(id);
    }

    save(user: User) {
        this.repo.put(user);
    }
}
"#;
    let nodes = parse(source, "typescript");

    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[0].kind, AstNodeKind::Class);
    assert_eq!(nodes[0].name.as_deref(), Some("UserService"));
    assert!(nodes[0].exported);

    assert_eq!(nodes[1].kind, AstNodeKind::Method);
    assert_eq!(nodes[1].name.as_deref(), Some("find"));
    assert_eq!(nodes[1].parent.as_deref(), Some("UserService"));

    assert_eq!(nodes[2].kind, AstNodeKind::Method);
    assert_eq!(nodes[2].name.as_deref(), Some("save"));
}

#[test]
fn test_typescript_jsdoc_attaches_to_declaration() {
    let source = r#"/** Validates an access token. */
export function validateToken(t: string) {
    return !!t;
}
"#;
    let nodes = parse(source, "typescript");
    assert_eq!(nodes.len(), 1);
    assert_eq!(
        nodes[0].docstring.as_deref(),
        Some("Validates an access token.")
    );
}

#[test]
fn test_typescript_export_without_declaration() {
    let nodes = parse("export { a, b } from \"./mod\";\n", "typescript");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].kind, AstNodeKind::Export);
    assert!(nodes[0].exported);
}

#[test]
fn test_python_functions_classes_and_docstrings() {
    let source = r#"import os
from pathlib import Path

TIMEOUT = 30

def fetch(url):
    """Fetch a URL."""
    return get(url)

class Client:
    """HTTP client."""

    def request(self, path):
        return fetch(self.base + path)
"#;
    let nodes = parse(source, "python");

    let kinds: Vec<AstNodeKind> = nodes.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AstNodeKind::Import,
            AstNodeKind::Import,
            AstNodeKind::Constant,
            AstNodeKind::Function,
            AstNodeKind::Class,
            AstNodeKind::Method,
        ]
    );

    assert_eq!(nodes[2].name.as_deref(), Some("TIMEOUT"));
    assert_eq!(nodes[3].name.as_deref(), Some("fetch"));
    assert_eq!(nodes[3].docstring.as_deref(), Some("Fetch a URL."));
    assert_eq!(nodes[4].docstring.as_deref(), Some("HTTP client."));
    assert_eq!(nodes[5].name.as_deref(), Some("request"));
    assert_eq!(nodes[5].parent.as_deref(), Some("Client"));
}

#[test]
fn test_rust_items() {
    let source = r#"use std::path::Path;

/// Window configuration.
pub struct WindowConfig {
    width: u32,
}

impl WindowConfig {
    pub fn new(width: u32) -> Self {
        Self { width }
    }
}

pub const DEFAULT_WIDTH: u32 = 800;

fn helper() {}
"#;
    let nodes = parse(source, "rust");

    assert_eq!(nodes[0].kind, AstNodeKind::Import);

    assert_eq!(nodes[1].kind, AstNodeKind::Type);
    assert_eq!(nodes[1].name.as_deref(), Some("WindowConfig"));
    assert!(nodes[1].exported);
    assert_eq!(nodes[1].docstring.as_deref(), Some("Window configuration."));

    assert_eq!(nodes[2].kind, AstNodeKind::Method);
    assert_eq!(nodes[2].name.as_deref(), Some("new"));
    assert_eq!(nodes[2].parent.as_deref(), Some("WindowConfig"));

    assert_eq!(nodes[3].kind, AstNodeKind::Constant);
    assert_eq!(nodes[3].name.as_deref(), Some("DEFAULT_WIDTH"));

    assert_eq!(nodes[4].kind, AstNodeKind::Function);
    assert_eq!(nodes[4].name.as_deref(), Some("helper"));
    assert!(!nodes[4].exported);
}

#[test]
fn test_go_declarations() {
    let source = r#"package server

import "fmt"

type Server struct {
    addr string
}

func (s *Server) Start() error {
    return nil
}

func helper() {}

const MaxConns = 10
"#;
    let nodes = parse(source, "go");

    assert_eq!(nodes[0].kind, AstNodeKind::Import);

    assert_eq!(nodes[1].kind, AstNodeKind::Type);
    assert_eq!(nodes[1].name.as_deref(), Some("Server"));
    assert!(nodes[1].exported);

    assert_eq!(nodes[2].kind, AstNodeKind::Method);
    assert_eq!(nodes[2].name.as_deref(), Some("Start"));
    assert_eq!(nodes[2].parent.as_deref(), Some("Server"));
    assert!(nodes[2].exported);

    assert_eq!(nodes[3].kind, AstNodeKind::Function);
    assert!(!nodes[3].exported);

    assert_eq!(nodes[4].kind, AstNodeKind::Constant);
    assert_eq!(nodes[4].name.as_deref(), Some("MaxConns"));
}

#[test]
fn test_java_class_and_methods() {
    let source = r#"import java.util.List;

public class OrderService {
    public List<Order> list() {
        return repo.findAll();
    }
}
"#;
    let nodes = parse(source, "java");

    assert_eq!(nodes[0].kind, AstNodeKind::Import);
    assert_eq!(nodes[1].kind, AstNodeKind::Class);
    assert_eq!(nodes[1].name.as_deref(), Some("OrderService"));
    assert!(nodes[1].exported);
    assert_eq!(nodes[2].kind, AstNodeKind::Method);
    assert_eq!(nodes[2].name.as_deref(), Some("list"));
    assert_eq!(nodes[2].parent.as_deref(), Some("OrderService"));
}

#[test]
fn test_grammarless_language_yields_empty() {
    assert!(parse("# Heading\n\nbody\n", "markdown").is_empty());
    assert!(parse("h1 { color: red }\n", "css").is_empty());
}

#[test]
fn test_config_language_yields_whole_file_node() {
    let source = "{\n  \"name\": \"demo\",\n  \"version\": \"1.0.0\"\n}\n";
    let nodes = parse(source, "json");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].kind, AstNodeKind::Constant);
    assert_eq!(nodes[0].line_start, 1);
    assert_eq!(nodes[0].line_end, 4);
    assert_eq!(nodes[0].text, source);
}

#[test]
fn test_lines_are_one_based_inclusive() {
    let source = "function a() {\n  return 1;\n}\n";
    let nodes = parse(source, "javascript");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].line_start, 1);
    assert_eq!(nodes[0].line_end, 3);
}
