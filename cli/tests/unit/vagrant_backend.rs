//! Vagrant backend against a scripted `vagrant` CLI.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use vagrantp_cli::application::ports::InstanceInspector;
use vagrantp_cli::application::services::lifecycle::Lifecycle;
use vagrantp_cli::domain::{
    Configuration, InfraKind, InfraSettings, InfrastructureState, InstanceHandle,
};
use vagrantp_cli::infra::backend::Backend;
use vagrantp_cli::infra::store::ProvisioningFileStore;
use vagrantp_cli::infra::vagrant::GENERATED_MARKER;

use crate::mocks::{CollectingReporter, MockCommandRunner, NoCache, ok_output};

const SSH_CONFIG: &str = "\
Host demo
  HostName 127.0.0.1
  User vagrant
  Port 2222
  IdentityFile /home/dev/project/.vagrant/machines/demo/libvirt/private_key
";

fn fake_vagrant(state: Arc<Mutex<&'static str>>) -> MockCommandRunner {
    MockCommandRunner::new(move |program, args| {
        anyhow::ensure!(program == "vagrant", "unexpected program {program}");
        let mut current = state.lock().expect("mutex poisoned");
        match args.first().copied() {
            Some("--version") => Ok(ok_output(b"Vagrant 2.4.1\n")),
            Some("status") => Ok(ok_output(
                format!("1700000000,demo,provider-name,libvirt\n1700000000,demo,state,{current}\n")
                    .as_bytes(),
            )),
            Some("up") => {
                *current = "running";
                Ok(ok_output(b""))
            }
            Some("halt") => {
                *current = "shutoff";
                Ok(ok_output(b""))
            }
            Some("destroy") => {
                *current = "not_created";
                Ok(ok_output(b""))
            }
            Some("ssh-config") => Ok(ok_output(SSH_CONFIG.as_bytes())),
            other => anyhow::bail!("unexpected vagrant call: {other:?}"),
        }
    })
}

fn vm_settings() -> InfraSettings {
    let config = Configuration::from_pairs([
        ("infra_kind", "vm"),
        ("provider", "libvirt"),
        ("memory", "4G"),
    ]);
    InfraSettings::from_config(&config).expect("settings")
}

fn handle() -> InstanceHandle {
    InstanceHandle::new("demo", InfraKind::Vm)
}

#[tokio::test]
async fn without_vagrantfile_nothing_is_queried() {
    let dir = tempfile::tempdir().unwrap();
    let runner = fake_vagrant(Arc::new(Mutex::new("running")));
    let backend = Backend::select(runner.clone(), handle(), Some("libvirt"), dir.path())
        .await
        .unwrap();
    assert_eq!(backend.query_state().await.unwrap(), InfrastructureState::NotCreated);
    assert!(runner.recorded_calls().is_empty());
}

#[tokio::test]
async fn create_renders_vagrantfile_and_brings_machine_up() {
    let dir = tempfile::tempdir().unwrap();
    let runner = fake_vagrant(Arc::new(Mutex::new("not_created")));
    let settings = vm_settings();
    let backend = Backend::select(runner.clone(), handle(), settings.backend_name.as_deref(), dir.path())
        .await
        .unwrap();
    let store = ProvisioningFileStore::new(dir.path());
    let reporter = CollectingReporter::default();
    let lifecycle = Lifecycle::new(&backend, &store, &NoCache, &reporter);

    lifecycle.create(&settings).await.unwrap();

    let vagrantfile = std::fs::read_to_string(dir.path().join("Vagrantfile")).unwrap();
    assert!(vagrantfile.starts_with(GENERATED_MARKER));
    assert!(vagrantfile.contains("config.vm.define \"demo\""));
    assert!(vagrantfile.contains("p.memory = 4096"));
    assert!(
        runner
            .command_lines()
            .contains(&"vagrant up demo --provider libvirt".to_string())
    );
    assert_eq!(lifecycle.current_state().await, InfrastructureState::Running);

    let address = lifecycle.resolve_address().await.unwrap();
    assert_eq!(address.host, "127.0.0.1");
    assert_eq!(address.port, Some(2222));
    assert_eq!(address.user.as_deref(), Some("vagrant"));
}

#[tokio::test]
async fn user_vagrantfile_is_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let original = "Vagrant.configure(\"2\") do |config|\nend\n";
    std::fs::write(dir.path().join("Vagrantfile"), original).unwrap();
    let runner = fake_vagrant(Arc::new(Mutex::new("not_created")));
    let settings = vm_settings();
    let backend = Backend::select(runner.clone(), handle(), settings.backend_name.as_deref(), dir.path())
        .await
        .unwrap();
    let store = ProvisioningFileStore::new(dir.path());
    let reporter = CollectingReporter::default();
    let lifecycle = Lifecycle::new(&backend, &store, &NoCache, &reporter);

    let err = lifecycle.create(&settings).await.unwrap_err();
    assert!(err.to_string().contains("not generated by vagrantp"), "{err}");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("Vagrantfile")).unwrap(),
        original
    );
    assert!(!runner.command_lines().iter().any(|l| l.starts_with("vagrant up")));
    assert_ne!(lifecycle.current_state().await, InfrastructureState::Running);
}

#[tokio::test]
async fn old_vagrant_is_not_available() {
    let dir = tempfile::tempdir().unwrap();
    let runner = MockCommandRunner::new(|_, _| Ok(ok_output(b"Vagrant 2.1.5\n")));
    let backend = Backend::select(runner, handle(), Some("libvirt"), dir.path())
        .await
        .unwrap();
    assert!(!backend.is_available().await.unwrap());
}

#[tokio::test]
async fn forced_stop_uses_halt_force() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Vagrantfile"), GENERATED_MARKER).unwrap();
    let runner = fake_vagrant(Arc::new(Mutex::new("running")));
    let backend = Backend::select(runner.clone(), handle(), Some("libvirt"), dir.path())
        .await
        .unwrap();
    let store = ProvisioningFileStore::new(dir.path());
    let reporter = CollectingReporter::default();
    let lifecycle = Lifecycle::new(&backend, &store, &NoCache, &reporter);

    lifecycle.stop(true).await.unwrap();
    assert!(
        runner
            .command_lines()
            .contains(&"vagrant halt demo --force".to_string())
    );
    assert_eq!(lifecycle.current_state().await, InfrastructureState::Stopped);
}
