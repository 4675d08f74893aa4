//! AST nodes to size-bounded logical chunks.
//!
//! Guarantees, in order of application:
//! - imports collapse into one synthetic chunk spanning their extremes,
//! - a class chunk is suppressed when its methods are emitted separately,
//! - oversized nodes split into contiguous line-bounded sub-chunks,
//! - adjacent small chunks of the same mergeable kind are combined,
//! - every non-import chunk carries the file's import text as context.

use crate::parser::is_config_language;
use crate::types::AstNode;
use crate::types::AstNodeKind;
use crate::types::ChunkInput;
use crate::types::ChunkKind;
use crate::types::content_hash;
use crate::types::stable_chunk_uid;

/// Default token budget per chunk.
pub const DEFAULT_MAX_TOKENS: usize = 500;

/// Chunks below this estimate are candidates for merging.
const SMALL_CHUNK_TOKENS: usize = 50;

/// Estimate tokens for a text: whitespace words times 1.3, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * 1.3).ceil() as usize
}

/// Logical chunker.
pub struct Chunker {
    max_tokens: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}

impl Chunker {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
        }
    }

    /// Chunk one file's nodes. `file_path` is the project-relative path
    /// used for stable chunk ids.
    pub fn chunk(&self, nodes: &[AstNode], file_path: &str) -> Vec<ChunkInput> {
        if nodes.is_empty() {
            return Vec::new();
        }

        let mut nodes: Vec<&AstNode> = nodes.iter().collect();
        nodes.sort_by_key(|n| n.line_start);

        let imports: Vec<&AstNode> = nodes
            .iter()
            .copied()
            .filter(|n| n.kind == AstNodeKind::Import)
            .collect();
        let import_texts: Vec<String> = imports.iter().map(|n| n.text.clone()).collect();

        // Class names that have at least one method child: those classes
        // are represented by their methods, not a whole-class chunk.
        let classes_with_methods: std::collections::HashSet<&str> = nodes
            .iter()
            .filter(|n| n.kind == AstNodeKind::Method)
            .filter_map(|n| n.parent.as_deref())
            .collect();

        let mut chunks: Vec<ChunkInput> = Vec::new();

        if let Some(first) = imports.first() {
            let line_start = first.line_start;
            let line_end = imports.iter().map(|n| n.line_end).max().unwrap_or(line_start);
            let text = import_texts.join("\n");
            chunks.push(self.build(
                ChunkKind::Import,
                None,
                None,
                line_start,
                line_end,
                &first.language,
                text,
                false,
                file_path,
            ));
        }

        for node in &nodes {
            match node.kind {
                AstNodeKind::Import => continue,
                AstNodeKind::Class => {
                    let suppressed = node
                        .name
                        .as_deref()
                        .map(|name| classes_with_methods.contains(name))
                        .unwrap_or(false);
                    if suppressed {
                        continue;
                    }
                }
                _ => {}
            }
            self.emit_node(node, file_path, &mut chunks);
        }

        chunks.sort_by_key(|c| c.line_start);
        let mut chunks = self.merge_small(chunks, file_path);

        for chunk in &mut chunks {
            if chunk.kind != ChunkKind::Import {
                chunk.imports = import_texts.clone();
            }
        }
        chunks
    }

    /// Emit one non-import node, splitting when it exceeds the budget.
    fn emit_node(&self, node: &AstNode, file_path: &str, out: &mut Vec<ChunkInput>) {
        let kind = chunk_kind_for(node);

        if estimate_tokens(&node.text) <= self.max_tokens {
            out.push(self.build(
                kind,
                node.name.clone(),
                node.parent.clone(),
                node.line_start,
                node.line_end,
                &node.language,
                node.text.clone(),
                node.exported,
                file_path,
            ));
            return;
        }

        // Split by lines: accumulate until the next line would reach the
        // budget and the accumulator already spans more than one line.
        let lines: Vec<&str> = node.text.lines().collect();
        let mut acc: Vec<&str> = Vec::new();
        let mut acc_start = node.line_start;

        for (offset, line) in lines.iter().enumerate() {
            if acc.len() > 1 {
                let candidate = format!("{}\n{}", acc.join("\n"), line);
                if estimate_tokens(&candidate) >= self.max_tokens {
                    let line_end = node.line_start + offset as i32 - 1;
                    out.push(self.build(
                        kind,
                        node.name.clone(),
                        node.parent.clone(),
                        acc_start,
                        line_end,
                        &node.language,
                        acc.join("\n"),
                        node.exported,
                        file_path,
                    ));
                    acc = Vec::new();
                    acc_start = node.line_start + offset as i32;
                }
            }
            acc.push(line);
        }
        if !acc.is_empty() {
            out.push(self.build(
                kind,
                node.name.clone(),
                node.parent.clone(),
                acc_start,
                node.line_end,
                &node.language,
                acc.join("\n"),
                node.exported,
                file_path,
            ));
        }
    }

    /// Combine runs of adjacent small chunks of the same mergeable kind.
    fn merge_small(&self, chunks: Vec<ChunkInput>, file_path: &str) -> Vec<ChunkInput> {
        let mut merged: Vec<ChunkInput> = Vec::new();
        for chunk in chunks {
            if let Some(last) = merged.last() {
                let both_small = estimate_tokens(&last.text) < SMALL_CHUNK_TOKENS
                    && estimate_tokens(&chunk.text) < SMALL_CHUNK_TOKENS;
                let combined_text = format!("{}\n{}", last.text, chunk.text);
                if last.kind == chunk.kind
                    && chunk.kind.is_mergeable()
                    && both_small
                    && estimate_tokens(&combined_text) <= self.max_tokens
                {
                    let last = merged.pop().expect("non-empty");
                    merged.push(self.build(
                        last.kind,
                        last.name.clone().or(chunk.name.clone()),
                        last.parent.clone(),
                        last.line_start,
                        chunk.line_end,
                        &last.language,
                        combined_text,
                        last.exported || chunk.exported,
                        file_path,
                    ));
                    continue;
                }
            }
            merged.push(chunk);
        }
        merged
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        kind: ChunkKind,
        name: Option<String>,
        parent: Option<String>,
        line_start: i32,
        line_end: i32,
        language: &str,
        text: String,
        exported: bool,
        file_path: &str,
    ) -> ChunkInput {
        ChunkInput {
            kind,
            name,
            parent,
            line_start,
            line_end,
            language: language.to_string(),
            chunk_uid: stable_chunk_uid(file_path, line_start, line_end),
            content_hash: content_hash(&text),
            text,
            imports: Vec::new(),
            exported,
        }
    }
}

/// Chunk kind for a node: `export` aliases to `constant`, and constants in
/// config-format files are stored as `config`.
fn chunk_kind_for(node: &AstNode) -> ChunkKind {
    let kind = node.kind.chunk_kind();
    if kind == ChunkKind::Constant && is_config_language(&node.language) {
        ChunkKind::Config
    } else {
        kind
    }
}

#[cfg(test)]
#[path = "chunker.test.rs"]
mod tests;
