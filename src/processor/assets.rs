// src/processor/assets.rs

use std::path::PathBuf;

use tracing::debug;

use crate::errors::ProcessingError;
use crate::types::ProcessorKind;

use super::{report_size, write_output, Processor, ProcessorInputs, ProcessorOptions};

/// Copies files to their mirrored output paths (images, fonts, plain copies).
///
/// A file is only written when its destination is missing or older than
/// the source, so the output directory grows additively. The returned paths
/// are the files actually written.
#[derive(Debug, Clone, Copy)]
pub struct CopyProcessor {
    kind: ProcessorKind,
}

impl CopyProcessor {
    pub fn new(kind: ProcessorKind) -> Self {
        Self { kind }
    }
}

impl Processor for CopyProcessor {
    fn kind(&self) -> ProcessorKind {
        self.kind
    }

    fn run(
        &self,
        inputs: &ProcessorInputs<'_>,
        options: &ProcessorOptions,
    ) -> Result<Vec<PathBuf>, ProcessingError> {
        let fs = inputs.fs;
        let mut written = Vec::new();

        for file in inputs.files {
            let out = inputs.mirrored_output(file);

            let src_time = fs.modified(file).map_err(ProcessingError::recoverable)?;
            if fs.is_file(&out) {
                if let Ok(dest_time) = fs.modified(&out) {
                    if dest_time >= src_time {
                        debug!(task = %inputs.task, file = ?file, "destination is newer; not copied");
                        continue;
                    }
                }
            }

            let bytes = fs.read(file).map_err(ProcessingError::recoverable)?;
            report_size(options, inputs.task, file, bytes.len(), bytes.len());
            write_output(inputs, &out, &bytes)?;
            written.push(out);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileSystem, MockFileSystem};
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    #[test]
    fn copies_only_newer_files() {
        let fs = MockFileSystem::new();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        fs.add_file_at("/src/fonts/a.woff", "a", old);
        fs.add_file_at("/src/fonts/b.woff", "b", old);
        // Up-to-date copy of `a` already in place.
        fs.add_file("/build/css/fonts/a.woff", "a");

        let files = vec![
            PathBuf::from("/src/fonts/a.woff"),
            PathBuf::from("/src/fonts/b.woff"),
        ];
        let inputs = ProcessorInputs {
            task: "fonts",
            files: &files,
            base: Path::new("/src/fonts"),
            output: Path::new("/build/css/fonts"),
            fs: &fs,
        };

        let written = CopyProcessor::new(ProcessorKind::Fonts)
            .run(&inputs, &ProcessorOptions::default())
            .unwrap();

        assert_eq!(written, vec![PathBuf::from("/build/css/fonts/b.woff")]);
        assert!(fs.is_file(Path::new("/build/css/fonts/b.woff")));
    }
}
