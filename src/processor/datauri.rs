// src/processor/datauri.rs

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::errors::ProcessingError;
use crate::types::ProcessorKind;

use super::{report_size, write_output, Processor, ProcessorInputs, ProcessorOptions};

/// Inlines small images into a stylesheet partial as data URIs.
///
/// Every input becomes a `.<namespace>-<stem>` class with a base64
/// `background-image`. The output location is the partial file itself; it
/// is always written, even with no inputs, so importing stylesheets resolve.
#[derive(Debug, Clone)]
pub struct DataUriProcessor {
    namespace: String,
}

impl Default for DataUriProcessor {
    fn default() -> Self {
        Self::new("img")
    }
}

impl DataUriProcessor {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

impl Processor for DataUriProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Datauri
    }

    fn run(
        &self,
        inputs: &ProcessorInputs<'_>,
        options: &ProcessorOptions,
    ) -> Result<Vec<PathBuf>, ProcessingError> {
        let mut partial = String::from("// Generated from inline images. Do not edit.\n");
        let mut raw_total = 0;

        for file in inputs.files {
            let bytes = inputs.fs.read(file).map_err(ProcessingError::recoverable)?;
            raw_total += bytes.len();

            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            partial.push_str(&format!(
                ".{}-{} {{\n  background-image: url(\"data:{};base64,{}\");\n}}\n",
                self.namespace,
                stem,
                mime_for(file),
                BASE64_STANDARD.encode(&bytes)
            ));
        }

        report_size(options, inputs.task, inputs.output, raw_total, partial.len());
        write_output(inputs, inputs.output, partial.as_bytes())?;
        Ok(vec![inputs.output.to_path_buf()])
    }
}
