//! Supervisor startup ordering, failure handling and shutdown.
//!
//! Managed processes are real (`sleep`, `sh`); the control planes are
//! recording stubs.

#![cfg(unix)]

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{MeshStep, RecordingIpsec, RecordingMesh};
use tailswan_core::{
    IpsecConfig, MeshConfig, ProcessCommand, ServeConfig, ServiceCommands, SupervisorConfig,
    SupervisorTimings,
};
use tailswan_runtime::{ReadinessError, Service, SessionState, Supervisor, SupervisorError};
use tokio_util::sync::CancellationToken;

fn sleeper() -> ProcessCommand {
    ProcessCommand::new("sleep", ["30"])
}

fn fast_timings() -> SupervisorTimings {
    SupervisorTimings {
        settle_delay: Duration::from_millis(10),
        readiness_timeout: Duration::from_secs(2),
        readiness_poll_interval: Duration::from_millis(10),
        stop_grace: Duration::from_secs(2),
    }
}

fn config(embedded: bool, ipsec: IpsecConfig, control_server: ProcessCommand) -> SupervisorConfig {
    let mesh = MeshConfig {
        hostname: "gw".to_string(),
        embedded,
        ..MeshConfig::default()
    };
    SupervisorConfig::new(8080, mesh, ipsec)
        .with_commands(ServiceCommands {
            ipsec: sleeper(),
            control_server,
            mesh_daemon: sleeper(),
        })
        .with_timings(fast_timings())
}

fn ipsec_config(auto_start: bool, connections: &[&str]) -> IpsecConfig {
    IpsecConfig {
        config_path: PathBuf::from("/etc/swanctl/swanctl.conf"),
        auto_start,
        connections: connections.iter().map(ToString::to_string).collect(),
    }
}

#[tokio::test]
async fn test_full_startup_order() {
    let ipsec = Arc::new(RecordingIpsec::default());
    let mesh = Arc::new(RecordingMesh::default());
    let supervisor = Supervisor::new(
        config(false, ipsec_config(true, &["site-a"]), sleeper()),
        ipsec.clone(),
        mesh.clone(),
    );

    supervisor.start(&CancellationToken::new()).await.unwrap();
    assert_eq!(supervisor.state().await, SessionState::Running);

    assert_eq!(
        ipsec.calls(),
        [
            "load_config:/etc/swanctl/swanctl.conf",
            "initiate:site-a"
        ]
    );
    assert_eq!(
        &mesh.calls()[..4],
        ["status", "up:gw", "set_serve_config", "serve_config"]
    );
    assert_eq!(
        mesh.applied_serve_config(),
        Some(ServeConfig::reverse_proxy(8080))
    );
    for service in [Service::Ipsec, Service::ControlServer, Service::MeshDaemon] {
        assert!(supervisor.process(service).is_running().await, "{service}");
    }

    supervisor.stop().await;
    assert_eq!(supervisor.state().await, SessionState::Stopped);
    for service in [Service::Ipsec, Service::ControlServer, Service::MeshDaemon] {
        assert!(!supervisor.process(service).is_running().await, "{service}");
    }
}

#[tokio::test]
async fn test_control_server_failure_aborts_startup() {
    let ipsec = Arc::new(RecordingIpsec::default());
    let mesh = Arc::new(RecordingMesh::default());
    let broken = ProcessCommand::new("/nonexistent/controlserver", Vec::<String>::new());
    let supervisor = Supervisor::new(
        config(false, ipsec_config(false, &[]), broken),
        ipsec.clone(),
        mesh.clone(),
    );

    let err = supervisor
        .start(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::StartProcess {
            service: Service::ControlServer,
            ..
        }
    ));

    assert!(mesh.calls().is_empty(), "no mesh step may run");
    assert!(!supervisor.process(Service::Ipsec).is_running().await);
    assert!(!supervisor.process(Service::MeshDaemon).is_running().await);
    assert_eq!(supervisor.state().await, SessionState::Stopped);
}

/// Start a full (non-embedded) session whose mesh fails at `step`.
async fn start_with_failing_mesh(
    step: MeshStep,
) -> (Supervisor, Arc<RecordingMesh>, SupervisorError) {
    let mesh = Arc::new(RecordingMesh::failing_at(step));
    let timings = SupervisorTimings {
        readiness_timeout: Duration::from_millis(200),
        ..fast_timings()
    };
    let supervisor = Supervisor::new(
        config(false, ipsec_config(false, &[]), sleeper()).with_timings(timings),
        Arc::new(RecordingIpsec::default()),
        mesh.clone(),
    );
    let err = supervisor
        .start(&CancellationToken::new())
        .await
        .unwrap_err();
    (supervisor, mesh, err)
}

async fn assert_torn_down(supervisor: &Supervisor) {
    for service in [Service::Ipsec, Service::ControlServer, Service::MeshDaemon] {
        assert!(!supervisor.process(service).is_running().await, "{service}");
    }
    assert_eq!(supervisor.state().await, SessionState::Stopped);
    assert!(supervisor.broadcaster().is_closed().await);
}

#[tokio::test]
async fn test_mesh_never_ready_aborts_startup() {
    let (supervisor, mesh, err) = start_with_failing_mesh(MeshStep::Status).await;

    assert!(matches!(
        err,
        SupervisorError::MeshNotReady(ReadinessError::TimedOut { .. })
    ));
    let calls = mesh.calls();
    assert!(calls.len() > 1, "readiness was not polled: {calls:?}");
    assert!(calls.iter().all(|c| c == "status"), "{calls:?}");
    assert_torn_down(&supervisor).await;
}

#[tokio::test]
async fn test_mesh_up_failure_aborts_startup() {
    let (supervisor, mesh, err) = start_with_failing_mesh(MeshStep::Up).await;

    assert!(matches!(err, SupervisorError::MeshUp(_)));
    assert_eq!(mesh.calls(), ["status", "up:gw"]);
    assert_eq!(mesh.applied_serve_config(), None);
    assert_torn_down(&supervisor).await;
}

#[tokio::test]
async fn test_serve_config_failure_aborts_startup() {
    let (supervisor, mesh, err) = start_with_failing_mesh(MeshStep::SetServeConfig).await;

    assert!(matches!(err, SupervisorError::ServeConfig(_)));
    assert_eq!(mesh.calls(), ["status", "up:gw", "set_serve_config"]);
    assert_torn_down(&supervisor).await;
}

#[tokio::test]
async fn test_auto_start_failure_does_not_stop_others() {
    let ipsec = Arc::new(RecordingIpsec::failing_on(&["site-b"]));
    let mesh = Arc::new(RecordingMesh::default());
    let supervisor = Supervisor::new(
        config(true, ipsec_config(true, &["site-a", "site-b", "site-c"]), sleeper()),
        ipsec.clone(),
        mesh.clone(),
    );

    supervisor.start(&CancellationToken::new()).await.unwrap();

    let initiated: Vec<String> = ipsec
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("initiate:"))
        .collect();
    assert_eq!(
        initiated,
        ["initiate:site-a", "initiate:site-b", "initiate:site-c"]
    );
    // Embedded mesh: the daemon is neither started nor configured.
    assert!(mesh.calls().is_empty());
    assert!(!supervisor.process(Service::MeshDaemon).is_running().await);

    supervisor.stop().await;
}

#[tokio::test]
async fn test_auto_start_disabled_initiates_nothing() {
    let ipsec = Arc::new(RecordingIpsec::default());
    let supervisor = Supervisor::new(
        config(true, ipsec_config(false, &["site-a"]), sleeper()),
        ipsec.clone(),
        Arc::new(RecordingMesh::default()),
    );

    supervisor.start(&CancellationToken::new()).await.unwrap();
    assert!(!ipsec.calls().iter().any(|c| c.starts_with("initiate:")));
    supervisor.stop().await;
}

#[tokio::test]
async fn test_process_exit_is_reported_once() {
    let crashing = ProcessCommand::new("sh", ["-c", "sleep 0.2; exit 1"]);
    let supervisor = Supervisor::new(
        config(true, ipsec_config(false, &[]), crashing),
        Arc::new(RecordingIpsec::default()),
        Arc::new(RecordingMesh::default()),
    );
    let mut errors = supervisor.errors().unwrap();
    assert!(supervisor.errors().is_none(), "receiver is handed out once");

    supervisor.start(&CancellationToken::new()).await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), errors.recv())
        .await
        .expect("process exit not reported")
        .unwrap();
    match err {
        SupervisorError::ProcessExited { service, .. } => {
            assert_eq!(service, Service::ControlServer);
        }
        other => panic!("unexpected error: {other}"),
    }

    supervisor.stop().await;
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn test_stop_is_idempotent_and_silent() {
    let supervisor = Supervisor::new(
        config(true, ipsec_config(false, &[]), sleeper()),
        Arc::new(RecordingIpsec::default()),
        Arc::new(RecordingMesh::default()),
    );
    let mut errors = supervisor.errors().unwrap();

    supervisor.start(&CancellationToken::new()).await.unwrap();
    supervisor.stop().await;
    supervisor.stop().await;

    assert_eq!(supervisor.state().await, SessionState::Stopped);
    assert!(supervisor.broadcaster().is_closed().await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let supervisor = Supervisor::new(
        config(true, ipsec_config(false, &[]), sleeper()),
        Arc::new(RecordingIpsec::default()),
        Arc::new(RecordingMesh::default()),
    );
    let ctx = CancellationToken::new();

    supervisor.start(&ctx).await.unwrap();
    let err = supervisor.start(&ctx).await.unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::InvalidState(SessionState::Running)
    ));

    supervisor.stop().await;
}

#[tokio::test]
async fn test_cancelled_context_aborts_startup() {
    let supervisor = Supervisor::new(
        config(true, ipsec_config(false, &[]), sleeper()),
        Arc::new(RecordingIpsec::default()),
        Arc::new(RecordingMesh::default()),
    );
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = supervisor.start(&ctx).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Cancelled));
    assert!(!supervisor.process(Service::Ipsec).is_running().await);
    assert!(!supervisor.process(Service::ControlServer).is_running().await);
}
