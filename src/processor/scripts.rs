// src/processor/scripts.rs

//! Script pipeline.
//!
//! Development: every file is linted, then copied to the mirrored output
//! path. Lint findings are fatal so broken code never reaches the output
//! tree.
//!
//! Production: files are ordered by their `// requires: a.js, b.js`
//! headers, concatenated into a single bundle, stripped of `console.*`
//! calls and `debugger` statements, and minified.

use std::collections::HashMap;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use std::sync::LazyLock;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;
use tracing::warn;

use crate::errors::ProcessingError;
use crate::types::ProcessorKind;

use super::{
    report_size, write_output, Behavior, DevBehavior, ProdBehavior, Processor, ProcessorInputs,
    ProcessorOptions,
};

pub const DEFAULT_BUNDLE: &str = "main.js";

static REQUIRES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*//\s*requires:\s*(.+)$").expect("valid regex"));
static CONSOLE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*console\.[A-Za-z]+\(.*\);?[ \t]*\r?\n?").expect("valid regex")
});
static DEBUGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdebugger\s*;?").expect("valid regex"));
static EVAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\beval\s*\(").expect("valid regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptsProcessor;

impl Processor for ScriptsProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Scripts
    }

    fn run(
        &self,
        inputs: &ProcessorInputs<'_>,
        options: &ProcessorOptions,
    ) -> Result<Vec<PathBuf>, ProcessingError> {
        match options.behavior {
            Behavior::Dev(dev) => run_dev(inputs, options, dev),
            Behavior::Prod(prod) if prod.concatenate => run_bundle(inputs, options, prod),
            Behavior::Prod(prod) => run_per_file(inputs, options, prod),
        }
    }
}

fn read(inputs: &ProcessorInputs<'_>, file: &Path) -> Result<String, ProcessingError> {
    inputs
        .fs
        .read_to_string(file)
        .map_err(ProcessingError::recoverable)
}

fn run_dev(
    inputs: &ProcessorInputs<'_>,
    options: &ProcessorOptions,
    dev: DevBehavior,
) -> Result<Vec<PathBuf>, ProcessingError> {
    let mut sources = Vec::with_capacity(inputs.files.len());
    let mut findings = Vec::new();

    for file in inputs.files {
        let source = read(inputs, file)?;
        if dev.lint {
            for finding in lint(&source) {
                warn!(task = %inputs.task, file = ?file, "{finding}");
                findings.push(format!("{}: {finding}", file.display()));
            }
        }
        sources.push((file, source));
    }

    if !findings.is_empty() {
        return Err(ProcessingError::Fatal(format!(
            "lint failed with {} problem(s): {}",
            findings.len(),
            findings.join("; ")
        )));
    }

    let mut outputs = Vec::with_capacity(sources.len());
    for (file, source) in sources {
        let out = inputs.mirrored_output(file);
        report_size(options, inputs.task, file, source.len(), source.len());
        write_output(inputs, &out, source.as_bytes())?;
        outputs.push(out);
    }
    Ok(outputs)
}

fn run_per_file(
    inputs: &ProcessorInputs<'_>,
    options: &ProcessorOptions,
    prod: ProdBehavior,
) -> Result<Vec<PathBuf>, ProcessingError> {
    let mut outputs = Vec::with_capacity(inputs.files.len());
    for file in inputs.files {
        let source = read(inputs, file)?;
        let shipped = finish(&source, prod);
        let out = inputs.mirrored_output(file);
        report_size(options, inputs.task, file, source.len(), shipped.len());
        write_output(inputs, &out, shipped.as_bytes())?;
        outputs.push(out);
    }
    Ok(outputs)
}

fn run_bundle(
    inputs: &ProcessorInputs<'_>,
    options: &ProcessorOptions,
    prod: ProdBehavior,
) -> Result<Vec<PathBuf>, ProcessingError> {
    let mut sources = HashMap::new();
    for file in inputs.files {
        sources.insert(file.clone(), read(inputs, file)?);
    }

    let ordered = dependency_order(inputs.files, &sources)?;
    let joined = ordered
        .iter()
        .filter_map(|file| sources.get(file))
        .map(|s| s.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    let bundle = finish(&joined, prod);
    let name = options.bundle.as_deref().unwrap_or(DEFAULT_BUNDLE);
    let out = inputs.output.join(name);
    report_size(options, inputs.task, &out, joined.len(), bundle.len());
    write_output(inputs, &out, bundle.as_bytes())?;
    Ok(vec![out])
}

fn finish(source: &str, prod: ProdBehavior) -> String {
    let mut code = source.to_string();
    if prod.strip_debug {
        code = strip_debug(&code);
    }
    if prod.minify {
        code = minify(&code);
    }
    code
}

/// Order files so each comes after the files named in its `// requires:`
/// header. The order is deterministic for a given input list.
pub fn dependency_order(
    files: &[PathBuf],
    sources: &HashMap<PathBuf, String>,
) -> Result<Vec<PathBuf>, ProcessingError> {
    let by_name: HashMap<String, &PathBuf> = files
        .iter()
        .filter_map(|f| Some((f.file_name()?.to_string_lossy().into_owned(), f)))
        .collect();

    // Edge direction: required -> requirer
    let mut graph: DiGraphMap<&Path, ()> = DiGraphMap::new();
    for file in files {
        graph.add_node(file.as_path());
    }

    for file in files {
        let Some(source) = sources.get(file) else {
            continue;
        };
        for caps in REQUIRES.captures_iter(source) {
            for required in caps[1].split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match by_name.get(required) {
                    Some(dep) => {
                        graph.add_edge(dep.as_path(), file.as_path(), ());
                    }
                    None => warn!(file = ?file, required, "required script not found in inputs"),
                }
            }
        }
    }

    toposort(&graph, None)
        .map(|order| order.into_iter().map(Path::to_path_buf).collect())
        .map_err(|cycle| {
            ProcessingError::Recoverable(format!(
                "circular `requires` involving {:?}",
                cycle.node_id()
            ))
        })
}

/// Remove `console.*(...)` lines and `debugger` statements.
pub fn strip_debug(code: &str) -> String {
    let without_console = CONSOLE_CALL.replace_all(code, "");
    DEBUGGER.replace_all(&without_console, "").into_owned()
}

/// Drop comments and blank lines and trim indentation.
pub fn minify(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut in_block = false;

    for line in code.lines() {
        let mut line = line.trim();

        if in_block {
            match line.find("*/") {
                Some(end) => {
                    in_block = false;
                    line = line[end + 2..].trim();
                }
                None => continue,
            }
        }
        if let Some(rest) = line.strip_prefix("/*") {
            match rest.find("*/") {
                Some(end) => line = rest[end + 2..].trim(),
                None => {
                    in_block = true;
                    continue;
                }
            }
        }
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        out.push_str(line);
        out.push('\n');
    }

    out
}

/// Static checks: unbalanced delimiters, `debugger` statements and `eval`.
///
/// String literals and comments are skipped when counting delimiters.
pub fn lint(source: &str) -> Vec<String> {
    let mut findings = Vec::new();

    if let Err(problem) = check_delimiters(source) {
        findings.push(problem);
    }

    for (idx, line) in source.lines().enumerate() {
        let code = line.split("//").next().unwrap_or("");
        if DEBUGGER.is_match(code) {
            findings.push(format!("line {}: `debugger` statement", idx + 1));
        }
        if EVAL.is_match(code) {
            findings.push(format!("line {}: use of `eval`", idx + 1));
        }
    }

    findings
}

/// Words after which a `/` starts a regex literal rather than a division.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "in", "of", "delete", "void", "throw", "new", "else", "do",
    "yield", "await", "instanceof",
];

fn check_delimiters(source: &str) -> Result<(), String> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;
    // Whether a `/` at this point opens a regex literal.
    let mut regex_allowed = true;
    let mut word = String::new();

    while let Some(c) = chars.next() {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            word.push(c);
            continue;
        }
        if !word.is_empty() {
            regex_allowed = REGEX_PREFIX_KEYWORDS.contains(&word.as_str());
            word.clear();
        }

        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            '/' if regex_allowed => {
                skip_regex_literal(&mut chars);
                regex_allowed = false;
            }
            '"' | '\'' | '`' => {
                let quote = c;
                let mut escaped = false;
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                    }
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == quote {
                        break;
                    }
                }
                regex_allowed = false;
            }
            '(' | '[' | '{' => {
                stack.push((c, line));
                regex_allowed = true;
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, at)) => {
                        return Err(format!(
                            "line {line}: `{c}` does not match `{open}` opened on line {at}"
                        ));
                    }
                    None => return Err(format!("line {line}: unexpected `{c}`")),
                }
                regex_allowed = c == '}';
            }
            _ => regex_allowed = true,
        }
    }

    match stack.pop() {
        Some((open, at)) => Err(format!("line {at}: unclosed `{open}`")),
        None => Ok(()),
    }
}

/// Consume a regex literal body up to its closing `/`. Stops before a
/// newline if the literal is unterminated.
fn skip_regex_literal(chars: &mut Peekable<Chars<'_>>) {
    let mut in_class = false;
    let mut escaped = false;
    while let Some(&c) = chars.peek() {
        if c == '\n' {
            return;
        }
        chars.next();
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '[' {
            in_class = true;
        } else if c == ']' {
            in_class = false;
        } else if c == '/' && !in_class {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn lint_skips_brackets_and_quotes_inside_regex_literals() {
        let src = "var re = /[(]/;\nvar q = s.replace(/\"/g, '');\nfunction f(x) {\n  return /}/.test(x);\n}\n";
        assert!(lint(src).is_empty(), "{:?}", lint(src));
    }

    #[test]
    fn lint_treats_slash_after_a_value_as_division() {
        let src = "var half = (total) / 2 / (count[0]);\nvar r = a / b;\n";
        assert!(lint(src).is_empty(), "{:?}", lint(src));
        assert_eq!(lint("var x = (a / b;\n").len(), 1);
    }

    #[test]
    fn lint_accepts_clean_code() {
        let src = "// app\nfunction add(a, b) {\n  return [a, b].reduce((x, y) => x + y, 0);\n}\nvar s = \"}\";\n";
        assert!(lint(src).is_empty());
    }

    #[test]
    fn lint_reports_each_problem() {
        let src = "function f() {\n  debugger;\n  eval('1');\n";
        let findings = lint(src);
        assert_eq!(findings.len(), 3, "{findings:?}");
        assert!(findings[0].contains("unclosed `{`"));
    }

    #[test]
    fn strip_debug_removes_console_lines() {
        let src = "var a = 1;\n  console.log('a', a);\nconsole.warn(\"x\")\nvar b = 2;\n";
        assert_eq!(strip_debug(src), "var a = 1;\nvar b = 2;\n");
    }

    #[test]
    fn minify_drops_comments_and_blank_lines() {
        let src = "/* header\n * license\n */\nvar a = 1; // note\n\n  // alone\n  var b = 2;\n";
        assert_eq!(minify(src), "var a = 1; // note\nvar b = 2;\n");
    }

    #[test]
    fn requires_headers_order_the_bundle() {
        let files = vec![PathBuf::from("/src/js/app.js"), PathBuf::from("/src/js/lib.js")];
        let sources: HashMap<PathBuf, String> = [
            (files[0].clone(), "// requires: lib.js\napp();\n".to_string()),
            (files[1].clone(), "function app() {}\n".to_string()),
        ]
        .into_iter()
        .collect();

        let order = dependency_order(&files, &sources).unwrap();
        assert_eq!(order, vec![files[1].clone(), files[0].clone()]);
    }

    #[test]
    fn dev_lint_failure_is_fatal_and_writes_nothing() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/js/bad.js", "function f() {\n");
        let files = vec![PathBuf::from("/src/js/bad.js")];
        let inputs = ProcessorInputs {
            task: "js",
            files: &files,
            base: Path::new("/src/js"),
            output: Path::new("/build/js"),
            fs: &fs,
        };
        let options = ProcessorOptions::new(Behavior::Dev(DevBehavior {
            lint: true,
            report_sizes: false,
        }));

        let err = ScriptsProcessor.run(&inputs, &options).unwrap_err();
        assert!(err.is_fatal());
        assert!(fs.contents("/build/js/bad.js").is_none());
    }
}
