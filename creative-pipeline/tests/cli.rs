use assert_cmd::Command;
use predicates::prelude::*;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

const REQUIRED: [(&str, &str); 7] = [
    ("AWS_ACCESS_KEY_ID", "AKIATEST"),
    ("AWS_SECRET_ACCESS_KEY", "secret"),
    ("AWS_S3_BUCKET", "creative-assets"),
    ("ADOBE_CLIENT_ID", "adobe-client"),
    ("ADOBE_CLIENT_SECRET", "adobe-secret"),
    ("BANNERBEAR_API_KEY", "bb-key"),
    ("BANNERBEAR_COLLECTION_ID", "set-1"),
];

fn binary() -> Command {
    let mut cmd = Command::cargo_bin("creative-pipeline").expect("Binary exists");
    for (name, _) in REQUIRED {
        cmd.env_remove(name);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    binary()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("check-composer")));
}

#[test]
fn run_without_credentials_fails_listing_every_missing_variable() {
    let work = tempdir().unwrap();
    binary()
        .current_dir(work.path())
        .arg("run")
        .env("AWS_S3_BUCKET", "creative-assets")
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("Missing required environment variables")
                .and(predicate::str::contains("AWS_ACCESS_KEY_ID"))
                .and(predicate::str::contains("BANNERBEAR_COLLECTION_ID")),
        );
    assert!(!work.path().join("START").exists(), "nothing is processed on config error");
}

#[test]
fn run_with_missing_staging_creates_it_and_succeeds() {
    let work = tempdir().unwrap();
    let mut cmd = binary();
    cmd.current_dir(work.path()).arg("run").arg("--verbose");
    for (name, value) in REQUIRED {
        cmd.env(name, value);
    }

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Staging directory created"));
    assert!(work.path().join("START").is_dir());
    assert!(work.path().join("logs/pipeline.log").is_file());
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use creative_pipeline::cli::{run, Cli, Commands};

    let cli = Cli {
        verbose: false,
        command: Commands::Run {
            config: Some(std::path::PathBuf::from("dummy.yaml")),
            staging: None,
            campaigns_root: None,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "dummy config must not load");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
