// src/processor/styles.rs

//! Stylesheet compilation: inlines `@import` partials into each entry
//! stylesheet and, in production, minifies the result.
//!
//! Partials are resolved next to the importing file, trying `name`,
//! `_name.scss`, `name.scss` and `_name` in that order. Files whose name
//! starts with `_` are partials and never produce output of their own.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::anyhow;
use regex::Regex;

use crate::errors::ProcessingError;
use crate::fs::FileSystem;
use crate::types::ProcessorKind;

use super::{report_size, write_output, Processor, ProcessorInputs, ProcessorOptions};

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*@import\s+["']([^"']+)["']\s*;[ \t]*$"#).expect("valid regex")
});
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*//.*$\n?").expect("valid regex"));
static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static AROUND_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([{}:;,>])\s*").expect("valid regex"));

const MAX_IMPORT_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct StylesProcessor;

impl Processor for StylesProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Styles
    }

    fn run(
        &self,
        inputs: &ProcessorInputs<'_>,
        options: &ProcessorOptions,
    ) -> Result<Vec<PathBuf>, ProcessingError> {
        let mut outputs = Vec::new();

        for file in inputs.files.iter().filter(|f| !is_partial(f)) {
            let mut stack = HashSet::new();
            let compiled = inline_imports(inputs.fs, file, &mut stack, 0)
                .map_err(ProcessingError::recoverable)?;
            let compiled = LINE_COMMENT.replace_all(&compiled, "").into_owned();

            let css = if options.behavior.minify() {
                minify(&compiled)
            } else {
                compiled
            };

            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "style".to_string());
            let out = inputs.output.join(format!("{stem}.css"));
            report_size(options, inputs.task, &out, source_len(inputs.fs, file), css.len());
            write_output(inputs, &out, css.as_bytes())?;
            outputs.push(out);
        }

        Ok(outputs)
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

fn source_len(fs: &dyn FileSystem, path: &Path) -> usize {
    fs.read(path).map(|b| b.len()).unwrap_or(0)
}

fn inline_imports(
    fs: &dyn FileSystem,
    file: &Path,
    stack: &mut HashSet<PathBuf>,
    depth: usize,
) -> anyhow::Result<String> {
    if depth > MAX_IMPORT_DEPTH || !stack.insert(file.to_path_buf()) {
        return Err(anyhow!("import cycle through {:?}", file));
    }

    let source = fs.read_to_string(file)?;
    let dir = file.parent().unwrap_or(Path::new(""));

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for caps in IMPORT.captures_iter(&source) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&source[last..whole.start()]);
        let partial = resolve_partial(fs, dir, target.as_str())
            .ok_or_else(|| anyhow!("{:?}: cannot resolve @import \"{}\"", file, target.as_str()))?;
        out.push_str(&inline_imports(fs, &partial, stack, depth + 1)?);
        last = whole.end();
    }
    out.push_str(&source[last..]);

    stack.remove(file);
    Ok(out)
}

fn resolve_partial(fs: &dyn FileSystem, dir: &Path, target: &str) -> Option<PathBuf> {
    let target = Path::new(target);
    let parent = target.parent().unwrap_or(Path::new(""));
    let name = target.file_name()?.to_string_lossy();

    [
        name.to_string(),
        format!("_{name}.scss"),
        format!("{name}.scss"),
        format!("_{name}"),
    ]
    .into_iter()
    .map(|candidate| dir.join(parent).join(candidate))
    .find(|candidate| fs.is_file(candidate))
}

/// Remove comments and insignificant whitespace.
pub fn minify(css: &str) -> String {
    let no_comments = BLOCK_COMMENT.replace_all(css, "");
    let single = WHITESPACE.replace_all(&no_comments, " ");
    let tight = AROUND_PUNCT.replace_all(&single, "$1");
    tight.replace(";}", "}").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::processor::{Behavior, DevBehavior, ProdBehavior};

    fn run(fs: &MockFileSystem, behavior: Behavior) -> Vec<PathBuf> {
        let files = vec![
            PathBuf::from("/src/scss/_vars.scss"),
            PathBuf::from("/src/scss/main.scss"),
        ];
        let inputs = ProcessorInputs {
            task: "sass",
            files: &files,
            base: Path::new("/src/scss"),
            output: Path::new("/build/css"),
            fs,
        };
        StylesProcessor
            .run(&inputs, &ProcessorOptions::new(behavior))
            .unwrap()
    }

    fn project() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("/src/scss/_vars.scss", "/* palette */\n.brand {\n  color: red;\n}\n");
        fs.add_file("/src/scss/main.scss", "@import 'vars';\n// page\nbody {\n  margin: 0;\n}\n");
        fs
    }

    #[test]
    fn inlines_partials_and_skips_partial_outputs() {
        let fs = project();
        let outputs = run(
            &fs,
            Behavior::Dev(DevBehavior {
                lint: false,
                report_sizes: true,
            }),
        );
        assert_eq!(outputs, vec![PathBuf::from("/build/css/main.css")]);

        let css = fs.contents("/build/css/main.css").unwrap();
        assert!(css.contains(".brand {\n  color: red;\n}"));
        assert!(css.contains("body {\n  margin: 0;\n}"));
        assert!(!css.contains("@import"));
        assert!(!css.contains("// page"));
    }

    #[test]
    fn production_output_is_minified() {
        let fs = project();
        run(
            &fs,
            Behavior::Prod(ProdBehavior {
                minify: true,
                strip_debug: false,
                concatenate: false,
            }),
        );
        assert_eq!(
            fs.contents("/build/css/main.css").unwrap(),
            ".brand{color:red}body{margin:0}"
        );
    }

    #[test]
    fn missing_partial_is_recoverable() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/scss/main.scss", "@import 'nope';\n");
        let files = vec![PathBuf::from("/src/scss/main.scss")];
        let inputs = ProcessorInputs {
            task: "sass",
            files: &files,
            base: Path::new("/src/scss"),
            output: Path::new("/build/css"),
            fs: &fs,
        };
        let err = StylesProcessor
            .run(&inputs, &ProcessorOptions::default())
            .unwrap_err();
        assert!(!err.is_fatal());
    }
}
