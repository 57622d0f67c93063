mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::init_tracing;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use assetdag::dag::{InputSpec, Task, TaskGraph};
use assetdag::engine::{BuildSettings, Orchestrator, TaskStatus};
use assetdag::errors::ConfigurationError;
use assetdag::fs::{FileSystem, MockFileSystem};
use assetdag::pipeline::build_graph;
use assetdag::processor::builtin;
use assetdag::types::{OutputPolicy, ProcessorKind, Profile};

type TestResult = Result<(), Box<dyn Error>>;

fn site_fs() -> Arc<MockFileSystem> {
    let fs = Arc::new(MockFileSystem::new());
    let old = SystemTime::now() - Duration::from_secs(600);
    fs.add_file_at(
        "/src/pages/index.html",
        "<footer><!-- @echo owner --> / <!-- @echo version --></footer>",
        old,
    );
    fs.add_file_at("/src/media/logo.svg", "<svg/>", old);
    fs.add_file_at("/src/media/draft.psd", "layers", old);
    fs.add_file_at("/src/app/boot.js", "// requires: lib.js\nstart();\n", old);
    fs.add_file_at("/src/app/lib.js", "function start() {}\n", old);
    fs
}

fn site_builder() -> ConfigFileBuilder {
    ConfigFileBuilder::new()
        .with_package("portfolio", "1.4.0")
        .with_context("owner", "Studio Nine")
        .with_task(
            "pages",
            TaskConfigBuilder::new(ProcessorKind::Markup, "pages/*.html").build(),
        )
        .with_task(
            "media",
            TaskConfigBuilder::new(ProcessorKind::Copy, "media/*")
                .exclude("media/*.psd")
                .output("media")
                .stale_skippable(true)
                .build(),
        )
        .with_task(
            "app",
            TaskConfigBuilder::new(ProcessorKind::Scripts, "app/*.js")
                .output("js")
                .bundle("app.min.js")
                .after("media")
                .build(),
        )
}

#[tokio::test]
async fn configured_tasks_build_with_context_exclusions_and_bundle_name() -> TestResult {
    init_tracing();

    let cfg = site_builder().build();
    let graph = build_graph(&cfg, Profile::Production)?;
    let fs = site_fs();
    let orch = Orchestrator::new(
        graph,
        BuildSettings::new(Profile::Production, "/src", "/build"),
        fs.clone(),
    )?;

    let result = orch.build().await?;
    assert!(result.success, "{result:?}");

    assert_eq!(
        fs.contents("/build/index.html").as_deref(),
        Some("<footer>Studio Nine / 1.4.0</footer>")
    );
    assert!(fs.exists(&PathBuf::from("/build/media/logo.svg")));
    assert!(!fs.exists(&PathBuf::from("/build/media/draft.psd")));

    let bundle = fs.contents("/build/js/app.min.js").expect("bundle written");
    assert!(bundle.find("function start").unwrap() < bundle.find("start();").unwrap());
    assert!(!fs.exists(&PathBuf::from("/build/js/main.js")));
    Ok(())
}

#[test]
fn task_overrides_flow_into_the_graph() -> TestResult {
    let cfg = site_builder()
        .with_task(
            "styles",
            TaskConfigBuilder::new(ProcessorKind::Styles, "scss/site.scss")
                .watch("scss/**/*")
                .output("css")
                .clean_output(true)
                .fatal(true)
                .build(),
        )
        .build();

    let graph = build_graph(&cfg, Profile::Development)?;

    let styles = graph.task("styles").expect("styles task");
    assert_eq!(styles.output_policy, OutputPolicy::Clean);
    assert!(styles.fatal);
    assert!(!styles.stale_skippable);
    assert!(styles.watch.matches("scss/partials/_grid.scss"));
    assert!(!styles.inputs.matches("scss/partials/_grid.scss"));

    let media = graph.task("media").expect("media task");
    assert!(media.stale_skippable);
    assert!(!media.inputs.matches("media/draft.psd"));
    assert!(media.watch.matches("media/logo.svg"));
    assert!(!media.watch.matches("media/draft.psd"));

    // Scripts only clean by default in production.
    assert_eq!(graph.task("app").expect("app task").output_policy, OutputPolicy::Additive);
    Ok(())
}

#[tokio::test]
async fn skipped_copy_task_does_not_block_its_dependents() -> TestResult {
    init_tracing();

    let cfg = site_builder().build();
    let graph = build_graph(&cfg, Profile::Development)?;
    let fs = site_fs();
    let orch = Orchestrator::new(
        graph,
        BuildSettings::new(Profile::Development, "/src", "/build"),
        fs.clone(),
    )?;

    assert!(orch.build().await?.success);
    let second = orch.build().await?;

    assert_eq!(second.status_of("media"), Some(&TaskStatus::Skipped));
    assert!(matches!(second.status_of("app"), Some(TaskStatus::Succeeded { .. })));
    assert_eq!(
        fs.contents("/build/js/boot.js").as_deref(),
        Some("// requires: lib.js\nstart();\n")
    );
    Ok(())
}

#[test]
fn profile_dependent_tasks_cannot_be_marked_stale_skippable() -> TestResult {
    for kind in [ProcessorKind::Markup, ProcessorKind::Styles, ProcessorKind::Scripts] {
        let err = site_builder()
            .with_task(
                "extra",
                TaskConfigBuilder::new(kind, "extra/*").stale_skippable(true).build(),
            )
            .try_build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid(ref msg) if msg.contains("extra")), "{err:?}");
    }

    // Opting out explicitly is fine.
    site_builder()
        .with_task(
            "extra",
            TaskConfigBuilder::new(ProcessorKind::Markup, "extra/*.html")
                .stale_skippable(false)
                .build(),
        )
        .try_build()?;
    Ok(())
}

#[tokio::test]
async fn markup_task_reruns_even_when_flagged_skippable() -> TestResult {
    init_tracing();

    let mut graph = TaskGraph::new();
    graph.add_task(
        Task::new(
            "pages",
            builtin(ProcessorKind::Markup),
            InputSpec::new(&["pages/*.html"])?,
            "",
        )
        .stale_skippable(true),
    )?;
    let fs = site_fs();
    let orch = Orchestrator::new(
        graph,
        BuildSettings::new(Profile::Development, "/src", "/build"),
        fs.clone(),
    )?;

    assert!(orch.build().await?.success);
    let second = orch.build().await?;

    assert!(
        matches!(second.status_of("pages"), Some(TaskStatus::Succeeded { .. })),
        "{second:?}"
    );
    assert!(fs.exists(&PathBuf::from("/build/index.html")));
    Ok(())
}
