// src/processor/markup.rs

//! Markup templating and cleaning.
//!
//! Supported directives, resolved against [`ProcessorOptions::context`]:
//! - `<!-- @echo key -->` is replaced by the value (empty if unset).
//! - `<!-- @if key -->...<!-- @endif -->` keeps its body when the value is
//!   truthy; `@if !key` inverts the test. Blocks do not nest.
//!
//! Production output has comments removed and inter-tag whitespace
//! collapsed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::errors::ProcessingError;
use crate::types::ProcessorKind;

use super::{report_size, write_output, Processor, ProcessorInputs, ProcessorOptions};

static IF_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--\s*@if\s+(!?)(\w+)\s*-->(.*?)<!--\s*@endif\s*-->").expect("valid regex")
});
static ECHO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*@echo\s+(\w+)\s*-->").expect("valid regex"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));
static RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupProcessor;

impl Processor for MarkupProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Markup
    }

    fn run(
        &self,
        inputs: &ProcessorInputs<'_>,
        options: &ProcessorOptions,
    ) -> Result<Vec<PathBuf>, ProcessingError> {
        let mut outputs = Vec::with_capacity(inputs.files.len());

        for file in inputs.files {
            let source = inputs
                .fs
                .read_to_string(file)
                .map_err(ProcessingError::recoverable)?;

            let mut page = preprocess(&source, &options.context);
            if options.behavior.minify() {
                page = clean(&page);
            }
            report_size(options, inputs.task, file, source.len(), page.len());

            let out = inputs.mirrored_output(file);
            write_output(inputs, &out, page.as_bytes())?;
            outputs.push(out);
        }

        Ok(outputs)
    }
}

fn is_truthy(value: Option<&String>) -> bool {
    match value.map(|v| v.trim()) {
        None | Some("") | Some("false") | Some("0") => false,
        Some(_) => true,
    }
}

/// Apply `@if` blocks and `@echo` substitutions.
pub fn preprocess(source: &str, context: &BTreeMap<String, String>) -> String {
    let kept = IF_BLOCK.replace_all(source, |caps: &Captures<'_>| {
        let negate = &caps[1] == "!";
        let truthy = is_truthy(context.get(&caps[2]));
        if truthy != negate {
            caps[3].to_string()
        } else {
            String::new()
        }
    });

    ECHO.replace_all(&kept, |caps: &Captures<'_>| {
        context.get(&caps[1]).cloned().unwrap_or_default()
    })
    .into_owned()
}

/// Strip comments and collapse whitespace between tags.
pub fn clean(page: &str) -> String {
    let without_comments = COMMENT.replace_all(page, "");
    let tight = BETWEEN_TAGS.replace_all(&without_comments, "><");
    RUNS.replace_all(tight.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn echo_substitutes_context_values() {
        let out = preprocess(
            "<p>v<!-- @echo version --> by <!-- @echo author --></p>",
            &ctx(&[("version", "1.2.0"), ("author", "Ada")]),
        );
        assert_eq!(out, "<p>v1.2.0 by Ada</p>");
    }

    #[test]
    fn if_blocks_follow_dev_flag() {
        let src = "<!-- @if devBuild --><script src=\"live.js\"></script><!-- @endif -->\
                   <!-- @if !devBuild --><p>prod</p><!-- @endif -->";
        assert_eq!(
            preprocess(src, &ctx(&[("devBuild", "true")])),
            "<script src=\"live.js\"></script>"
        );
        assert_eq!(preprocess(src, &ctx(&[("devBuild", "false")])), "<p>prod</p>");
    }

    #[test]
    fn clean_removes_comments_and_tag_whitespace() {
        let page = "<html>\n  <!-- note -->\n  <body>\n    <p>Hi   there</p>\n  </body>\n</html>\n";
        assert_eq!(clean(page), "<html><body><p>Hi there</p></body></html>");
    }
}
