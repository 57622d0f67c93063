// src/config/defaults.rs

//! The built-in pipeline used when no config file exists.
//!
//! ```text
//! html    *.html                 -> build/
//! images  images/*.*             -> build/images/
//! imguri  images/inline/*        -> source/scss/images/_datauri.scss
//! sass    scss/main.scss         -> build/css/        (after imguri)
//! fonts   fonts/*.*              -> build/css/fonts/
//! js      js/**/*                -> build/js/
//! ```

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::types::{OutputRoot, ProcessorKind};

/// Generated stylesheet partial, relative to the source root.
pub const DATAURI_PARTIAL: &str = "scss/images/_datauri.scss";

pub fn default_pipeline() -> ConfigFile {
    let mut html = TaskConfig::new(ProcessorKind::Markup, &["*.html"], "");
    html.watch = Some(vec!["*.html".into(), "template/**/*".into()]);

    let images = TaskConfig::new(ProcessorKind::Images, &["images/*.*"], "images");

    let mut imguri = TaskConfig::new(ProcessorKind::Datauri, &["images/inline/*"], DATAURI_PARTIAL);
    imguri.output_root = OutputRoot::Source;

    let mut sass = TaskConfig::new(ProcessorKind::Styles, &["scss/main.scss"], "css");
    sass.watch = Some(vec![
        "scss/**/*".into(),
        "images/inline/*".into(),
        format!("!{DATAURI_PARTIAL}"),
    ]);
    sass.after = vec!["imguri".into()];

    let fonts = TaskConfig::new(ProcessorKind::Fonts, &["fonts/*.*"], "css/fonts");

    let js = TaskConfig::new(ProcessorKind::Scripts, &["js/**/*"], "js");

    let raw = RawConfigFile {
        task: vec![
            ("html".into(), html),
            ("images".into(), images),
            ("imguri".into(), imguri),
            ("sass".into(), sass),
            ("fonts".into(), fonts),
            ("js".into(), js),
        ],
        ..RawConfigFile::default()
    };
    ConfigFile::new_unchecked(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pipeline_passes_validation() {
        let cfg = default_pipeline();
        let raw = RawConfigFile {
            package: cfg.package.clone(),
            config: cfg.config.clone(),
            context: cfg.context.clone(),
            task: cfg.tasks.clone(),
        };
        assert!(ConfigFile::try_from(raw).is_ok());
    }

    #[test]
    fn styles_run_after_the_datauri_partial() {
        let cfg = default_pipeline();
        let sass = cfg.task("sass").unwrap();
        assert_eq!(sass.after, vec!["imguri".to_string()]);
        assert_eq!(cfg.task("imguri").unwrap().output_root, OutputRoot::Source);
    }
}
