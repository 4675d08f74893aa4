//! Language detection and tree-sitter grammar registry.

use std::path::Path;

use tree_sitter::Language;

/// Detect the language tag for a path from its extension.
///
/// Unknown extensions return `None` and the file is skipped by discovery.
/// Dotfiles with no further dot (`.env`) use their bare name as the key.
pub fn detect_language(path: &Path) -> Option<String> {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => {
            let name = path.file_name()?.to_str()?;
            let bare = name.strip_prefix('.')?;
            if bare.is_empty() || bare.contains('.') {
                return None;
            }
            bare.to_ascii_lowercase()
        }
    };

    let language = match ext.as_str() {
        "ts" => "typescript",
        "tsx" => "tsx",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "lua" => "lua",
        "sh" | "bash" => "bash",
        "sql" => "sql",
        "md" => "markdown",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "env" => "env",
        "xml" => "xml",
        "html" | "htm" => "html",
        "css" => "css",
        _ => return None,
    };
    Some(language.to_string())
}

/// Grammar for a language tag, if one is compiled in.
pub fn grammar_for(language: &str) -> Option<Language> {
    match language {
        "typescript" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "javascript" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "python" => Some(tree_sitter_python::LANGUAGE.into()),
        "rust" => Some(tree_sitter_rust::LANGUAGE.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        "java" => Some(tree_sitter_java::LANGUAGE.into()),
        _ => None,
    }
}

/// Config-format languages. Their whole content is indexed as a single
/// `config` chunk instead of going through a grammar.
pub fn is_config_language(language: &str) -> bool {
    matches!(language, "json" | "yaml" | "toml" | "env")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_language_by_extension() {
        assert_eq!(
            detect_language(&PathBuf::from("src/a.ts")).as_deref(),
            Some("typescript")
        );
        assert_eq!(
            detect_language(&PathBuf::from("src/a.tsx")).as_deref(),
            Some("tsx")
        );
        assert_eq!(
            detect_language(&PathBuf::from("lib/x.mjs")).as_deref(),
            Some("javascript")
        );
        assert_eq!(
            detect_language(&PathBuf::from("main.rs")).as_deref(),
            Some("rust")
        );
        assert_eq!(detect_language(&PathBuf::from("a.xyz")), None);
        assert_eq!(detect_language(&PathBuf::from("Makefile")), None);
    }

    #[test]
    fn test_detect_language_dotfile_fallback() {
        assert_eq!(
            detect_language(&PathBuf::from(".env")).as_deref(),
            Some("env")
        );
        // A dotfile with a second dot goes through the normal extension path.
        assert_eq!(
            detect_language(&PathBuf::from(".eslintrc.json")).as_deref(),
            Some("json")
        );
        // Unknown bare dotfiles are skipped.
        assert_eq!(detect_language(&PathBuf::from(".bashrc")), None);
    }

    #[test]
    fn test_grammar_registry() {
        for language in ["typescript", "tsx", "javascript", "python", "rust", "go", "java"] {
            assert!(grammar_for(language).is_some(), "missing grammar: {language}");
        }
        assert!(grammar_for("markdown").is_none());
        assert!(grammar_for("json").is_none());
    }

    #[test]
    fn test_config_languages() {
        assert!(is_config_language("json"));
        assert!(is_config_language("yaml"));
        assert!(is_config_language("toml"));
        assert!(is_config_language("env"));
        assert!(!is_config_language("typescript"));
    }
}
