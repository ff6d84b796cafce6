//! Reconciliation passes over cluster snapshots.

use std::collections::{BTreeMap, BTreeSet};

use ingress_sync::config::ControllerSettings;
use ingress_sync::controller::Controller;
use ingress_sync::haproxy::models::{Backend, Cookie, Global, ServerOptions, ServerState, Toggle};
use ingress_sync::store::{
    ClusterSnapshot, Endpoints, Ingress, IngressPath, IngressRule, NamespaceSnapshot, PortEndpoints, Service,
    ServicePort, ServicePortRef, Status, Tracked,
};
use ingress_sync::sync::SlotPool;
use ingress_sync::SyncAction;

mod common;
use common::{Call, MockControlPlane, BACKEND};

const NO_ENDPOINTS: &[&str] = &[];

fn settings() -> ControllerSettings {
    ControllerSettings {
        default_annotations: BTreeMap::from([("scale-server-slots".to_string(), "4".to_string())]),
        ..Default::default()
    }
}

fn service(name: &str) -> Service {
    Service {
        namespace: "default".into(),
        name: name.into(),
        ports: vec![ServicePort { name: "http".into(), protocol: "TCP".into(), port: 80 }],
        dns: None,
        annotations: BTreeMap::new(),
    }
}

fn ingress(name: &str, services: &[&str]) -> Ingress {
    Ingress {
        namespace: "default".into(),
        name: name.into(),
        class: Some("haproxy".into()),
        annotations: BTreeMap::new(),
        rules: vec![IngressRule {
            host: "example.com".into(),
            paths: services
                .iter()
                .map(|svc| IngressPath {
                    path: format!("/{}", svc),
                    service: svc.to_string(),
                    port: ServicePortRef::Name("http".into()),
                })
                .collect(),
        }],
        default_backend: None,
    }
}

fn endpoints(service: &str, ips: &[&str]) -> Endpoints {
    Endpoints {
        namespace: "default".into(),
        service: service.into(),
        ports: BTreeMap::from([(
            "http".to_string(),
            PortEndpoints {
                port: 8080,
                addresses: ips.iter().map(|ip| ip.to_string()).collect::<BTreeSet<_>>(),
            },
        )]),
    }
}

fn snapshot(services: &[(&str, &[&str])]) -> ClusterSnapshot {
    let mut ns = NamespaceSnapshot::default();
    let names: Vec<&str> = services.iter().map(|(name, _)| *name).collect();
    for (name, ips) in services {
        ns.services.insert(name.to_string(), Tracked::new(service(name)));
        ns.endpoints.insert(name.to_string(), endpoints(name, ips));
    }
    ns.ingresses.insert("site".into(), Tracked::new(ingress("site", &names)));

    ClusterSnapshot {
        namespaces: BTreeMap::from([("default".to_string(), ns)]),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_first_pass_creates_backend_and_slots() {
    let mut controller = Controller::new(MockControlPlane::new(), &settings());

    let outcome = controller.reconcile(&snapshot(&[("web", &["10.0.0.1", "10.0.0.2"])])).await;

    assert_eq!(outcome.action, SyncAction::Reload);
    assert_eq!(outcome.backends, 1);
    assert!(outcome.is_success());

    let mock = controller.client();
    let backend = mock.backend(BACKEND).unwrap();
    assert_eq!(backend.mode.as_deref(), Some("http"));
    assert_eq!(mock.server_count(BACKEND), 4);
    assert_eq!(mock.server(BACKEND, "SRV_1").unwrap().address, "10.0.0.1");
    assert_eq!(mock.server(BACKEND, "SRV_2").unwrap().port, Some(8080));
    assert_eq!(mock.server(BACKEND, "SRV_3").unwrap().address, "127.0.0.1");
    assert_eq!(controller.state().len(), 1);
}

#[tokio::test]
async fn test_unchanged_snapshot_only_reads() {
    let snap = snapshot(&[("web", &["10.0.0.1"])]);
    let mut controller = Controller::new(MockControlPlane::new(), &settings());
    controller.reconcile(&snap).await;
    controller.client().clear_calls();

    let outcome = controller.reconcile(&snap).await;

    assert_eq!(outcome.action, SyncAction::None);
    assert!(controller.client().write_calls().is_empty());
    assert_eq!(
        controller.client().calls(),
        vec![Call::GetGlobal, Call::GetDefaults, Call::GetBackend(BACKEND.into())]
    );
}

#[tokio::test]
async fn test_endpoint_change_uses_runtime_only() {
    let mut controller = Controller::new(MockControlPlane::new(), &settings());
    controller.reconcile(&snapshot(&[("web", &["10.0.0.1"])])).await;
    controller.client().clear_calls();

    let outcome = controller.reconcile(&snapshot(&[("web", &["10.0.0.1", "10.0.0.2"])])).await;

    // The new address lands in a pre-allocated slot.
    assert_eq!(outcome.action, SyncAction::None);
    let runtime = controller.client().runtime_calls();
    assert_eq!(runtime.len(), 2);
    assert!(matches!(&runtime[0], Call::SetAddress { server, ip, .. } if server == "SRV_2" && ip == "10.0.0.2"));
}

#[tokio::test]
async fn test_global_change_requires_restart() {
    let mut snap = snapshot(&[("web", &["10.0.0.1"])]);
    snap.config_map.annotations.insert("maxconn".into(), "5000".into());
    let mock = MockControlPlane::new()
        .with_global(Global { maxconn: Some(2000), ..Default::default() });
    let mut controller = Controller::new(mock, &settings());

    let outcome = controller.reconcile(&snap).await;

    assert_eq!(outcome.action, SyncAction::Restart);
    assert_eq!(controller.client().global().maxconn, Some(5000));
    assert!(controller.client().calls().contains(&Call::Push("global")));
}

#[tokio::test]
async fn test_global_push_keeps_unmanaged_fields() {
    let mut snap = snapshot(&[("web", &["10.0.0.1"])]);
    snap.config_map.annotations.insert("maxconn".into(), "5000".into());
    let mut global = Global { maxconn: Some(2000), ..Default::default() };
    global.extra.insert("daemon".into(), "enabled".into());
    let mut controller = Controller::new(MockControlPlane::new().with_global(global), &settings());

    controller.reconcile(&snap).await;

    let pushed = controller.client().global();
    assert_eq!(pushed.maxconn, Some(5000));
    assert_eq!(pushed.extra["daemon"], "enabled");
}

#[tokio::test]
async fn test_restart_against_existing_backend() {
    let running = SlotPool::from_addresses([("10.0.0.1", 8080), ("10.0.0.2", 8080), ("10.0.0.3", 8080), ("", 0)]);
    let template = ServerOptions { check: Some(Toggle::Enabled), ..Default::default() };
    let mock = MockControlPlane::new()
        .with_backend(Backend::http(BACKEND))
        .with_servers(BACKEND, &running, &template);
    let mut controller = Controller::new(mock, &settings());

    let outcome = controller.reconcile(&snapshot(&[("web", &["10.0.0.3"])])).await;

    assert!(outcome.is_success());
    let mock = controller.client();
    assert_eq!(mock.server_count(BACKEND), 4);
    assert_eq!(mock.server(BACKEND, "SRV_3").unwrap().address, "10.0.0.3");
    for name in ["SRV_1", "SRV_2"] {
        assert_eq!(mock.server(BACKEND, name).unwrap().maintenance, Some(Toggle::Enabled));
        assert!(mock.runtime_calls().contains(&Call::SetState {
            backend: BACKEND.into(),
            server: name.into(),
            state: ServerState::Maint,
        }));
    }
}

#[tokio::test]
async fn test_defaults_change_requires_reload() {
    let snap = snapshot(&[("web", &["10.0.0.1"])]);
    let mut controller = Controller::new(MockControlPlane::new(), &settings());
    controller.reconcile(&snap).await;

    let mut snap = snap;
    snap.config_map.annotations.insert("timeout-connect".into(), "3s".into());
    controller.client().clear_calls();
    let outcome = controller.reconcile(&snap).await;

    assert_eq!(outcome.action, SyncAction::Reload);
    assert_eq!(controller.client().defaults().connect_timeout, Some(3000));
    assert_eq!(controller.client().write_calls(), vec![Call::Push("defaults")]);
}

#[tokio::test]
async fn test_backend_annotation_change_pushes_backend() {
    let mock = MockControlPlane::new().with_backend(Backend::http(BACKEND));
    let mut snap = snapshot(&[("web", &["10.0.0.1"])]);
    snap.namespaces.get_mut("default").unwrap().services.get_mut("web").unwrap()
        .resource
        .annotations
        .insert("cookie-persistence".into(), "SRVID".into());
    let mut controller = Controller::new(mock, &settings());

    let outcome = controller.reconcile(&snap).await;

    assert_eq!(outcome.action, SyncAction::Reload);
    assert_eq!(controller.client().backend(BACKEND).unwrap().cookie, Some(Cookie::insert("SRVID")));
    assert!(controller.client().calls().contains(&Call::Push("backend")));
}

#[tokio::test]
async fn test_ingress_class_filter() {
    let mut settings = settings();
    settings.ingress_class = Some("nginx".into());
    let mut controller = Controller::new(MockControlPlane::new(), &settings);

    let outcome = controller.reconcile(&snapshot(&[("web", &["10.0.0.1"])])).await;

    assert_eq!(outcome.backends, 0);
    assert!(controller.state().is_empty());
}

#[tokio::test]
async fn test_deleted_service_state_is_pruned() {
    let mut controller = Controller::new(MockControlPlane::new(), &settings());
    let mut snap = snapshot(&[("web", &["10.0.0.1"]), ("api", &["10.0.1.1"])]);
    controller.reconcile(&snap).await;
    assert_eq!(controller.state().len(), 2);

    let api = snap.namespaces.get_mut("default").unwrap().services.get_mut("api").unwrap();
    api.status = Status::Deleted;
    let outcome = controller.reconcile(&snap).await;

    assert_eq!(outcome.backends, 1);
    assert_eq!(controller.state().len(), 1);
}

#[tokio::test]
async fn test_failing_backend_does_not_block_others() {
    let mock = MockControlPlane::new();
    mock.fail("create_backend", "default-api-http");
    let mut controller = Controller::new(mock, &settings());

    let outcome = controller
        .reconcile(&snapshot(&[("web", &["10.0.0.1"]), ("api", &["10.0.1.1"])]))
        .await;

    assert_eq!(outcome.failed_backends, vec!["default-api-http".to_string()]);
    assert!(!outcome.is_success());
    assert_eq!(outcome.action, SyncAction::Reload);
    assert_eq!(controller.client().server_count("default-web-http"), 4);
    assert_eq!(controller.client().server_count("default-api-http"), 0);
}

#[tokio::test]
async fn test_global_read_failure_is_reported() {
    let mock = MockControlPlane::new();
    mock.fail("get_global", "");
    let mut controller = Controller::new(mock, &settings());

    let outcome = controller.reconcile(&snapshot(&[("web", &["10.0.0.1"])])).await;

    assert_eq!(outcome.failed_sections, vec!["global"]);
    assert_eq!(outcome.backends, 1);
}

#[tokio::test]
async fn test_external_name_service() {
    let mut snap = snapshot(&[("web", NO_ENDPOINTS)]);
    snap.namespaces.get_mut("default").unwrap().services.get_mut("web").unwrap().resource.dns =
        Some("db.example.com".into());
    let mut controller = Controller::new(MockControlPlane::new(), &settings());

    controller.reconcile(&snap).await;

    let server = controller.client().server(BACKEND, "SRV_1").unwrap();
    assert_eq!(server.address, "db.example.com");
    assert_eq!(server.port, Some(80));
}
