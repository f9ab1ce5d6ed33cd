//! Container backend driven through the lifecycle orchestrator against a
//! scripted runtime CLI.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use vagrantp_cli::application::ports::{InstanceInspector, ProvisioningStore};
use vagrantp_cli::application::services::lifecycle::{Lifecycle, RemoveOutcome, StopOutcome};
use vagrantp_cli::domain::{
    Configuration, InfraKind, InfraSettings, InfrastructureState, InstanceHandle,
    ProvisioningRecord, VagrantpError,
};
use vagrantp_cli::infra::backend::Backend;
use vagrantp_cli::infra::store::ProvisioningFileStore;

use crate::mocks::{CollectingReporter, MockCommandRunner, NoCache, err_output, ok_output};

/// Podman CLI whose `ps` reflects the mutations made so far.
fn fake_podman(status: Arc<Mutex<Option<&'static str>>>) -> MockCommandRunner {
    MockCommandRunner::new(move |program, args| {
        anyhow::ensure!(program == "podman", "unexpected program {program}");
        let mut current = status.lock().expect("mutex poisoned");
        match args.first().copied() {
            Some("--version") => Ok(ok_output(b"podman version 4.9.3\n")),
            Some("ps") => {
                let line = (*current).map(|s| format!("demo\t{s}\n")).unwrap_or_default();
                Ok(ok_output(line.as_bytes()))
            }
            Some("run" | "start") => {
                *current = Some("Up 1 second");
                Ok(ok_output(b"demo\n"))
            }
            Some("stop" | "kill") => {
                *current = Some("Exited (137) 1 second ago");
                Ok(ok_output(b"demo\n"))
            }
            Some("rm") => {
                *current = None;
                Ok(ok_output(b"demo\n"))
            }
            Some("inspect") => Ok(ok_output(b"10.88.0.7\n")),
            other => anyhow::bail!("unexpected podman call: {other:?}"),
        }
    })
}

fn container_settings() -> InfraSettings {
    let config = Configuration::from_pairs([("infra_kind", "container"), ("backend_name", "podman")]);
    InfraSettings::from_config(&config).expect("settings")
}

fn handle() -> InstanceHandle {
    InstanceHandle::new("demo", InfraKind::Container)
}

fn mutations(runner: &MockCommandRunner) -> Vec<String> {
    runner
        .command_lines()
        .into_iter()
        .filter(|l| !l.starts_with("podman ps") && !l.starts_with("podman --version"))
        .collect()
}

#[tokio::test]
async fn create_stop_start_remove_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let status = Arc::new(Mutex::new(None));
    let runner = fake_podman(Arc::clone(&status));
    let settings = container_settings();
    let backend = Backend::select(runner.clone(), handle(), settings.backend_name.as_deref(), dir.path())
        .await
        .unwrap();
    let store = ProvisioningFileStore::new(dir.path());
    let reporter = CollectingReporter::default();
    let lifecycle = Lifecycle::new(&backend, &store, &NoCache, &reporter);

    assert_eq!(lifecycle.current_state().await, InfrastructureState::NotCreated);
    lifecycle.create(&settings).await.unwrap();
    assert_eq!(lifecycle.current_state().await, InfrastructureState::Running);
    assert!(
        runner
            .command_lines()
            .iter()
            .any(|l| l.starts_with("podman run -d --name demo --hostname demo --memory 512m --cpus 1")),
        "{:?}",
        runner.command_lines()
    );

    assert_eq!(lifecycle.stop(false).await.unwrap(), StopOutcome::Stopped);
    assert_eq!(lifecycle.current_state().await, InfrastructureState::Stopped);
    lifecycle.start().await.unwrap();
    assert_eq!(lifecycle.current_state().await, InfrastructureState::Running);

    store.save(&ProvisioningRecord::new(&handle(), None)).unwrap();
    assert_eq!(lifecycle.remove(false).await.unwrap(), RemoveOutcome::Removed);
    assert_eq!(lifecycle.current_state().await, InfrastructureState::NotCreated);
    assert!(!store.is_provisioned(&handle()).unwrap());

    let tail: Vec<String> = mutations(&runner).into_iter().rev().take(2).collect();
    assert_eq!(tail, vec!["podman rm demo", "podman stop demo"]);
}

#[tokio::test]
async fn second_stop_mutates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let status = Arc::new(Mutex::new(Some("Up 5 minutes")));
    let runner = fake_podman(status);
    let settings = container_settings();
    let backend = Backend::select(runner.clone(), handle(), settings.backend_name.as_deref(), dir.path())
        .await
        .unwrap();
    let store = ProvisioningFileStore::new(dir.path());
    let reporter = CollectingReporter::default();
    let lifecycle = Lifecycle::new(&backend, &store, &NoCache, &reporter);

    assert_eq!(lifecycle.stop(true).await.unwrap(), StopOutcome::Stopped);
    let after_first = mutations(&runner);
    assert_eq!(after_first, vec!["podman kill demo"]);

    assert_eq!(lifecycle.stop(true).await.unwrap(), StopOutcome::AlreadyStopped);
    assert_eq!(mutations(&runner), after_first);
}

#[tokio::test]
async fn forced_remove_of_running_container_kills_first() {
    let dir = tempfile::tempdir().unwrap();
    let runner = fake_podman(Arc::new(Mutex::new(Some("Up 1 hour"))));
    let settings = container_settings();
    let backend = Backend::select(runner.clone(), handle(), settings.backend_name.as_deref(), dir.path())
        .await
        .unwrap();
    let store = ProvisioningFileStore::new(dir.path());
    let reporter = CollectingReporter::default();
    let lifecycle = Lifecycle::new(&backend, &store, &NoCache, &reporter);

    lifecycle.remove(true).await.unwrap();
    assert_eq!(mutations(&runner), vec!["podman kill demo", "podman rm demo"]);
}

#[tokio::test]
async fn failing_ps_reads_as_not_created() {
    let dir = tempfile::tempdir().unwrap();
    let runner = MockCommandRunner::new(|_, args| {
        if args.first() == Some(&"ps") {
            Ok(err_output(b"cannot connect to podman socket"))
        } else {
            Ok(ok_output(b""))
        }
    });
    let backend = Backend::select(runner, handle(), Some("podman"), dir.path())
        .await
        .unwrap();
    let store = ProvisioningFileStore::new(dir.path());
    let reporter = CollectingReporter::default();
    let lifecycle = Lifecycle::new(&backend, &store, &NoCache, &reporter);
    assert_eq!(lifecycle.current_state().await, InfrastructureState::NotCreated);
}

#[tokio::test]
async fn runtime_detection_falls_back_to_docker() {
    let dir = tempfile::tempdir().unwrap();
    let runner = MockCommandRunner::new(|program, _| {
        if program == "podman" {
            anyhow::bail!("failed to spawn podman")
        }
        Ok(ok_output(b"Docker version 27.0.3\n"))
    });
    let config = Configuration::from_pairs([("infra_kind", "container")]);
    let settings = InfraSettings::from_config(&config).unwrap();
    let backend = Backend::select(runner, handle(), settings.backend_name.as_deref(), dir.path())
        .await
        .unwrap();
    assert_eq!(backend.backend_label(), "docker");
}

#[tokio::test]
async fn no_runtime_is_backend_not_available() {
    let dir = tempfile::tempdir().unwrap();
    let runner = MockCommandRunner::new(|program, _| anyhow::bail!("failed to spawn {program}"));
    let config = Configuration::from_pairs([("infra_kind", "container")]);
    let settings = InfraSettings::from_config(&config).unwrap();
    let err = Backend::select(runner, handle(), settings.backend_name.as_deref(), dir.path())
        .await
        .err()
        .expect("selection should fail");
    let typed = err.downcast_ref::<VagrantpError>().unwrap();
    assert!(matches!(typed, VagrantpError::BackendNotAvailable { .. }));
    assert_eq!(typed.exit_code(), 5);
}

#[tokio::test]
async fn unknown_runtime_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = Configuration::from_pairs([("infra_kind", "container"), ("backend", "lxc")]);
    let settings = InfraSettings::from_config(&config).unwrap();
    let runner = MockCommandRunner::new_ok();
    let err = Backend::select(runner, handle(), settings.backend_name.as_deref(), dir.path())
        .await
        .err()
        .expect("selection should fail");
    assert!(err.to_string().contains("lxc"), "{err}");
}
