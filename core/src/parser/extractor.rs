//! CST walking: tree-sitter trees to [`AstNode`] streams.

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::Node;
use tree_sitter::Parser;

use crate::error::CtxErr;
use crate::error::Result;
use crate::parser::languages::grammar_for;
use crate::parser::languages::is_config_language;
use crate::types::AstNode;
use crate::types::AstNodeKind;

/// Reusable parser over all supported grammars.
///
/// tree-sitter parsers keep internal state, so one instance per language
/// is cached and reused across files.
pub struct SourceParser {
    parsers: HashMap<String, Parser>,
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Parse a file into AST nodes.
    ///
    /// Grammarless languages produce an empty list (config formats produce
    /// one whole-file node instead). Unreadable files and parser failures
    /// surface as errors; the indexer logs and skips those files.
    pub fn parse_file(&mut self, abs_path: &Path, language: &str) -> Result<Vec<AstNode>> {
        let source =
            std::fs::read_to_string(abs_path).map_err(|e| CtxErr::FileReadFailed {
                path: abs_path.to_path_buf(),
                cause: e.to_string(),
            })?;
        self.parse_source(&source, language)
            .map_err(|e| match e {
                CtxErr::ParseFailed { cause, .. } => CtxErr::ParseFailed {
                    path: abs_path.to_path_buf(),
                    cause,
                },
                e => e,
            })
    }

    /// Parse in-memory source into AST nodes.
    pub fn parse_source(&mut self, source: &str, language: &str) -> Result<Vec<AstNode>> {
        if is_config_language(language) {
            return Ok(vec![whole_file_node(source, language)]);
        }
        let Some(grammar) = grammar_for(language) else {
            return Ok(Vec::new());
        };

        let parser = match self.parsers.entry(language.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let mut parser = Parser::new();
                parser
                    .set_language(&grammar)
                    .map_err(|e| CtxErr::ParseFailed {
                        path: Default::default(),
                        cause: format!("grammar init for {language}: {e}"),
                    })?;
                entry.insert(parser)
            }
        };

        let tree = parser.parse(source, None).ok_or_else(|| CtxErr::ParseFailed {
            path: Default::default(),
            cause: format!("tree-sitter returned no tree for {language}"),
        })?;

        let ctx = ExtractCtx { source, language };
        let mut nodes = Vec::new();
        match language {
            "typescript" | "tsx" | "javascript" => {
                extract_js_family(&ctx, tree.root_node(), &mut nodes)
            }
            "python" => extract_python(&ctx, tree.root_node(), &mut nodes),
            "rust" => extract_rust(&ctx, tree.root_node(), &mut nodes),
            "go" => extract_go(&ctx, tree.root_node(), &mut nodes),
            "java" => extract_java(&ctx, tree.root_node(), &mut nodes),
            _ => {}
        }
        Ok(nodes)
    }
}

/// Shared extraction context for one file.
struct ExtractCtx<'a> {
    source: &'a str,
    language: &'a str,
}

impl<'a> ExtractCtx<'a> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source.as_bytes())
            .unwrap_or_default()
            .to_string()
    }

    fn field_text(&self, node: Node, field: &str) -> Option<String> {
        node.child_by_field_name(field).map(|n| self.text(n))
    }

    /// Build a node. `span` controls lines and text; `exported` records
    /// any export wrapping around the declaration.
    #[allow(clippy::too_many_arguments)]
    fn node(
        &self,
        kind: AstNodeKind,
        span: Node,
        name: Option<String>,
        parent: Option<String>,
        exported: bool,
        params: Option<String>,
        return_type: Option<String>,
        docstring: Option<String>,
    ) -> AstNode {
        AstNode {
            kind,
            name,
            parent,
            line_start: span.start_position().row as i32 + 1,
            line_end: span.end_position().row as i32 + 1,
            language: self.language.to_string(),
            text: self.text(span),
            params,
            return_type,
            docstring,
            exported,
        }
    }

    /// Documentation block immediately preceding a declaration: the run of
    /// comment siblings directly above it, with comment markers stripped.
    fn doc_before(&self, node: Node) -> Option<String> {
        let mut lines: Vec<String> = Vec::new();
        let mut expected_row = node.start_position().row;
        let mut cursor = node.prev_sibling();
        while let Some(sibling) = cursor {
            match sibling.kind() {
                "comment" | "line_comment" | "block_comment" => {
                    // Only adjacent comments count as documentation.
                    let end_row = sibling.end_position().row;
                    if end_row + 1 < expected_row {
                        break;
                    }
                    expected_row = sibling.start_position().row;
                    let raw = self.text(sibling);
                    for line in raw.lines().rev() {
                        let cleaned = line
                            .trim()
                            .trim_start_matches("/**")
                            .trim_start_matches("/*")
                            .trim_end_matches("*/")
                            .trim_start_matches("///")
                            .trim_start_matches("//!")
                            .trim_start_matches("//")
                            .trim_start_matches('*')
                            .trim_start_matches('#')
                            .trim();
                        if !cleaned.is_empty() {
                            lines.push(cleaned.to_string());
                        }
                    }
                }
                _ => break,
            }
            cursor = sibling.prev_sibling();
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }
}

/// Whole-file node for config formats (json/yaml/toml/env).
fn whole_file_node(source: &str, language: &str) -> AstNode {
    let line_count = source.lines().count().max(1) as i32;
    AstNode {
        kind: AstNodeKind::Constant,
        name: None,
        parent: None,
        line_start: 1,
        line_end: line_count,
        language: language.to_string(),
        text: source.to_string(),
        params: None,
        return_type: None,
        docstring: None,
        exported: false,
    }
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    children
}

// ========== JavaScript / TypeScript family ==========

fn extract_js_family(ctx: &ExtractCtx, root: Node, out: &mut Vec<AstNode>) {
    for child in named_children(root) {
        match child.kind() {
            "import_statement" => {
                out.push(ctx.node(AstNodeKind::Import, child, None, None, false, None, None, None));
            }
            "export_statement" => {
                match child.child_by_field_name("declaration") {
                    Some(decl) => js_declaration(ctx, decl, child, true, out),
                    // Re-exports and `export default <expr>` have no inner
                    // declaration; they surface as plain export nodes.
                    None => out.push(ctx.node(
                        AstNodeKind::Export,
                        child,
                        None,
                        None,
                        true,
                        None,
                        None,
                        None,
                    )),
                }
            }
            _ => js_declaration(ctx, child, child, false, out),
        }
    }
}

/// Classify one JS/TS declaration. `span` is the outer node (the export
/// statement when the declaration was wrapped).
fn js_declaration(ctx: &ExtractCtx, decl: Node, span: Node, exported: bool, out: &mut Vec<AstNode>) {
    match decl.kind() {
        "function_declaration" | "generator_function_declaration" | "function_signature" => {
            let name = ctx.field_text(decl, "name");
            let params = ctx.field_text(decl, "parameters");
            let return_type = ctx
                .field_text(decl, "return_type")
                .map(|t| t.trim_start_matches(':').trim().to_string());
            let docstring = ctx.doc_before(span);
            out.push(ctx.node(
                AstNodeKind::Function,
                span,
                name,
                None,
                exported,
                params,
                return_type,
                docstring,
            ));
        }
        "class_declaration" | "abstract_class_declaration" => {
            let class_name = ctx.field_text(decl, "name");
            let docstring = ctx.doc_before(span);
            out.push(ctx.node(
                AstNodeKind::Class,
                span,
                class_name.clone(),
                None,
                exported,
                None,
                None,
                docstring,
            ));
            if let Some(body) = decl.child_by_field_name("body") {
                for member in named_children(body) {
                    if member.kind() == "method_definition" {
                        let name = ctx.field_text(member, "name");
                        let params = ctx.field_text(member, "parameters");
                        let return_type = ctx
                            .field_text(member, "return_type")
                            .map(|t| t.trim_start_matches(':').trim().to_string());
                        let docstring = ctx.doc_before(member);
                        out.push(ctx.node(
                            AstNodeKind::Method,
                            member,
                            name,
                            class_name.clone(),
                            exported,
                            params,
                            return_type,
                            docstring,
                        ));
                    }
                }
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let name = named_children(decl)
                .into_iter()
                .find(|n| n.kind() == "variable_declarator")
                .and_then(|d| ctx.field_text(d, "name"));
            out.push(ctx.node(
                AstNodeKind::Constant,
                span,
                name,
                None,
                exported,
                None,
                None,
                None,
            ));
        }
        "interface_declaration" | "type_alias_declaration" | "enum_declaration" => {
            let name = ctx.field_text(decl, "name");
            let docstring = ctx.doc_before(span);
            out.push(ctx.node(
                AstNodeKind::Type,
                span,
                name,
                None,
                exported,
                None,
                None,
                docstring,
            ));
        }
        _ => {
            if exported {
                out.push(ctx.node(
                    AstNodeKind::Export,
                    span,
                    None,
                    None,
                    true,
                    None,
                    None,
                    None,
                ));
            }
        }
    }
}

// ========== Python ==========

fn extract_python(ctx: &ExtractCtx, root: Node, out: &mut Vec<AstNode>) {
    for child in named_children(root) {
        python_statement(ctx, child, child, out);
    }
}

fn python_statement(ctx: &ExtractCtx, node: Node, span: Node, out: &mut Vec<AstNode>) {
    match node.kind() {
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            out.push(ctx.node(AstNodeKind::Import, span, None, None, false, None, None, None));
        }
        "decorated_definition" => {
            if let Some(inner) = node.child_by_field_name("definition") {
                python_statement(ctx, inner, span, out);
            }
        }
        "function_definition" => {
            let name = ctx.field_text(node, "name");
            let params = ctx.field_text(node, "parameters");
            let return_type = ctx.field_text(node, "return_type");
            let docstring = python_docstring(ctx, node);
            out.push(ctx.node(
                AstNodeKind::Function,
                span,
                name,
                None,
                false,
                params,
                return_type,
                docstring,
            ));
        }
        "class_definition" => {
            let class_name = ctx.field_text(node, "name");
            let docstring = python_docstring(ctx, node);
            out.push(ctx.node(
                AstNodeKind::Class,
                span,
                class_name.clone(),
                None,
                false,
                None,
                None,
                docstring,
            ));
            if let Some(body) = node.child_by_field_name("body") {
                for member in named_children(body) {
                    let (method, method_span) = match member.kind() {
                        "function_definition" => (member, member),
                        "decorated_definition" => {
                            match member.child_by_field_name("definition") {
                                Some(inner) if inner.kind() == "function_definition" => {
                                    (inner, member)
                                }
                                _ => continue,
                            }
                        }
                        _ => continue,
                    };
                    let name = ctx.field_text(method, "name");
                    let params = ctx.field_text(method, "parameters");
                    let return_type = ctx.field_text(method, "return_type");
                    let docstring = python_docstring(ctx, method);
                    out.push(ctx.node(
                        AstNodeKind::Method,
                        method_span,
                        name,
                        class_name.clone(),
                        false,
                        params,
                        return_type,
                        docstring,
                    ));
                }
            }
        }
        "expression_statement" => {
            // Top-level assignments index as constants.
            if let Some(assignment) =
                named_children(node).into_iter().find(|n| n.kind() == "assignment")
            {
                let name = assignment
                    .child_by_field_name("left")
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| ctx.text(n));
                if name.is_some() {
                    out.push(ctx.node(
                        AstNodeKind::Constant,
                        span,
                        name,
                        None,
                        false,
                        None,
                        None,
                        None,
                    ));
                }
            }
        }
        _ => {}
    }
}

/// Python docstring: a string literal as the first body statement.
fn python_docstring(ctx: &ExtractCtx, definition: Node) -> Option<String> {
    let body = definition.child_by_field_name("body")?;
    let first = named_children(body).into_iter().next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = named_children(first)
        .into_iter()
        .find(|n| n.kind() == "string")?;
    let raw = ctx.text(string);
    let cleaned = raw
        .trim_start_matches("\"\"\"")
        .trim_end_matches("\"\"\"")
        .trim_start_matches("'''")
        .trim_end_matches("'''")
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

// ========== Rust ==========

fn extract_rust(ctx: &ExtractCtx, root: Node, out: &mut Vec<AstNode>) {
    for child in named_children(root) {
        match child.kind() {
            "use_declaration" => {
                out.push(ctx.node(AstNodeKind::Import, child, None, None, false, None, None, None));
            }
            "function_item" => {
                let exported = rust_is_pub(ctx, child);
                let name = ctx.field_text(child, "name");
                let params = ctx.field_text(child, "parameters");
                let return_type = ctx.field_text(child, "return_type");
                let docstring = ctx.doc_before(child);
                out.push(ctx.node(
                    AstNodeKind::Function,
                    child,
                    name,
                    None,
                    exported,
                    params,
                    return_type,
                    docstring,
                ));
            }
            "struct_item" | "enum_item" | "trait_item" | "type_item" | "union_item" => {
                let exported = rust_is_pub(ctx, child);
                let name = ctx.field_text(child, "name");
                let docstring = ctx.doc_before(child);
                out.push(ctx.node(
                    AstNodeKind::Type,
                    child,
                    name,
                    None,
                    exported,
                    None,
                    None,
                    docstring,
                ));
            }
            "impl_item" => {
                let parent = ctx.field_text(child, "type");
                if let Some(body) = child.child_by_field_name("body") {
                    for member in named_children(body) {
                        if member.kind() == "function_item" {
                            let exported = rust_is_pub(ctx, member);
                            let name = ctx.field_text(member, "name");
                            let params = ctx.field_text(member, "parameters");
                            let return_type = ctx.field_text(member, "return_type");
                            let docstring = ctx.doc_before(member);
                            out.push(ctx.node(
                                AstNodeKind::Method,
                                member,
                                name,
                                parent.clone(),
                                exported,
                                params,
                                return_type,
                                docstring,
                            ));
                        }
                    }
                }
            }
            "const_item" | "static_item" => {
                let exported = rust_is_pub(ctx, child);
                let name = ctx.field_text(child, "name");
                out.push(ctx.node(
                    AstNodeKind::Constant,
                    child,
                    name,
                    None,
                    exported,
                    None,
                    None,
                    None,
                ));
            }
            _ => {}
        }
    }
}

fn rust_is_pub(ctx: &ExtractCtx, node: Node) -> bool {
    named_children(node)
        .into_iter()
        .any(|n| n.kind() == "visibility_modifier" && ctx.text(n).starts_with("pub"))
}

// ========== Go ==========

fn extract_go(ctx: &ExtractCtx, root: Node, out: &mut Vec<AstNode>) {
    for child in named_children(root) {
        match child.kind() {
            "import_declaration" => {
                out.push(ctx.node(AstNodeKind::Import, child, None, None, false, None, None, None));
            }
            "function_declaration" => {
                let name = ctx.field_text(child, "name");
                let exported = go_is_exported(name.as_deref());
                let params = ctx.field_text(child, "parameters");
                let return_type = ctx.field_text(child, "result");
                let docstring = ctx.doc_before(child);
                out.push(ctx.node(
                    AstNodeKind::Function,
                    child,
                    name,
                    None,
                    exported,
                    params,
                    return_type,
                    docstring,
                ));
            }
            "method_declaration" => {
                let name = ctx.field_text(child, "name");
                let exported = go_is_exported(name.as_deref());
                let parent = child
                    .child_by_field_name("receiver")
                    .map(|r| go_receiver_type(&ctx.text(r)));
                let params = ctx.field_text(child, "parameters");
                let return_type = ctx.field_text(child, "result");
                let docstring = ctx.doc_before(child);
                out.push(ctx.node(
                    AstNodeKind::Method,
                    child,
                    name,
                    parent,
                    exported,
                    params,
                    return_type,
                    docstring,
                ));
            }
            "type_declaration" => {
                let name = named_children(child)
                    .into_iter()
                    .find(|n| n.kind() == "type_spec")
                    .and_then(|spec| ctx.field_text(spec, "name"));
                let exported = go_is_exported(name.as_deref());
                let docstring = ctx.doc_before(child);
                out.push(ctx.node(
                    AstNodeKind::Type,
                    child,
                    name,
                    None,
                    exported,
                    None,
                    None,
                    docstring,
                ));
            }
            "const_declaration" | "var_declaration" => {
                let name = named_children(child)
                    .into_iter()
                    .find(|n| matches!(n.kind(), "const_spec" | "var_spec"))
                    .and_then(|spec| ctx.field_text(spec, "name"));
                let exported = go_is_exported(name.as_deref());
                out.push(ctx.node(
                    AstNodeKind::Constant,
                    child,
                    name,
                    None,
                    exported,
                    None,
                    None,
                    None,
                ));
            }
            _ => {}
        }
    }
}

fn go_is_exported(name: Option<&str>) -> bool {
    name.and_then(|n| n.chars().next())
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

/// Receiver type from a Go receiver text like `(s *Server)`.
fn go_receiver_type(receiver: &str) -> String {
    receiver
        .trim_matches(['(', ')'])
        .split_whitespace()
        .last()
        .unwrap_or("")
        .trim_start_matches('*')
        .to_string()
}

// ========== Java ==========

fn extract_java(ctx: &ExtractCtx, root: Node, out: &mut Vec<AstNode>) {
    for child in named_children(root) {
        match child.kind() {
            "import_declaration" => {
                out.push(ctx.node(AstNodeKind::Import, child, None, None, false, None, None, None));
            }
            "class_declaration" => {
                let class_name = ctx.field_text(child, "name");
                let exported = java_is_public(ctx, child);
                let docstring = ctx.doc_before(child);
                out.push(ctx.node(
                    AstNodeKind::Class,
                    child,
                    class_name.clone(),
                    None,
                    exported,
                    None,
                    None,
                    docstring,
                ));
                if let Some(body) = child.child_by_field_name("body") {
                    for member in named_children(body) {
                        if matches!(member.kind(), "method_declaration" | "constructor_declaration")
                        {
                            let name = ctx.field_text(member, "name");
                            let params = ctx.field_text(member, "parameters");
                            let return_type = ctx.field_text(member, "type");
                            let docstring = ctx.doc_before(member);
                            out.push(ctx.node(
                                AstNodeKind::Method,
                                member,
                                name,
                                class_name.clone(),
                                java_is_public(ctx, member),
                                params,
                                return_type,
                                docstring,
                            ));
                        }
                    }
                }
            }
            "interface_declaration" | "enum_declaration" | "record_declaration" => {
                let name = ctx.field_text(child, "name");
                let exported = java_is_public(ctx, child);
                let docstring = ctx.doc_before(child);
                out.push(ctx.node(
                    AstNodeKind::Type,
                    child,
                    name,
                    None,
                    exported,
                    None,
                    None,
                    docstring,
                ));
            }
            _ => {}
        }
    }
}

fn java_is_public(ctx: &ExtractCtx, node: Node) -> bool {
    named_children(node)
        .into_iter()
        .any(|n| n.kind() == "modifiers" && ctx.text(n).contains("public"))
}

#[cfg(test)]
#[path = "extractor.test.rs"]
mod tests;
