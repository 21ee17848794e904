//! End-to-end reconciliation passes against in-memory ECS and ELBv2.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tgsync::clients::memory::{LoadBalancerCall, MemoryLoadBalancer, MemoryOrchestrator};
use tgsync::model::{ContainerDetail, NodeId, Target, TaskDetail};
use tgsync::{ClientError, Config, LifecycleEvent, Mutation, PassOutcome, SyncAgent, SyncError};

const CLUSTER: &str = "arn:aws:ecs:eu-west-1:123456789012:cluster/prod";
const TARGET_GROUP: &str = "payments-tg";

struct Harness {
    orchestrator: Arc<MemoryOrchestrator>,
    lb: Arc<MemoryLoadBalancer>,
    agent: SyncAgent,
}

impl Harness {
    async fn new(registered: &[(u16, &str)]) -> Self {
        let orchestrator = Arc::new(MemoryOrchestrator::new());
        orchestrator.add_instance("ci/a", Some("i-aaa")).await;
        orchestrator.add_instance("ci/b", Some("i-bbb")).await;
        orchestrator.add_instance("ci/c", Some("i-ccc")).await;

        let lb = Arc::new(MemoryLoadBalancer::new());
        lb.add_target_group(TARGET_GROUP, registered).await;

        let config = Config {
            ecs_service: "payments".to_string(),
            target_group: TARGET_GROUP.to_string(),
            container_name: None,
            max_concurrency: NonZeroUsize::new(4).unwrap(),
            event_file: None,
        };
        let agent = SyncAgent::new(&config, orchestrator.clone(), lb.clone());

        Self {
            orchestrator,
            lb,
            agent,
        }
    }

    async fn run_task(&self, arn: &str, instance: &str, ports: &[u16]) {
        self.orchestrator
            .add_task(TaskDetail {
                task: arn.into(),
                instance: Some(instance.into()),
                containers: vec![ContainerDetail {
                    name: "app".to_string(),
                    host_ports: ports.to_vec(),
                }],
            })
            .await;
    }
}

fn event(group: &str, status: &str) -> LifecycleEvent {
    serde_json::from_value(serde_json::json!({
        "id": "4f1c3b8e-0000-0000-0000-000000000000",
        "detail-type": "ECS Task State Change",
        "time": "2024-03-01T12:00:00Z",
        "detail": {
            "group": group,
            "clusterArn": CLUSTER,
            "lastStatus": status,
            "containers": [{ "name": "app", "lastStatus": status }],
        }
    }))
    .unwrap()
}

fn target(port: u16, id: &str) -> Target {
    Target {
        id: NodeId::from(id),
        port,
    }
}

#[tokio::test]
async fn test_irrelevant_events_touch_nothing() {
    let h = Harness::new(&[(8080, "i-aaa")]).await;
    h.run_task("t/1", "ci/a", &[8081]).await;

    for (group, status) in [
        ("service:payments", "PENDING"),
        ("service:payments", "PROVISIONING"),
        ("service:payments", "DEPROVISIONING"),
        ("service:billing", "RUNNING"),
    ] {
        let outcome = h.agent.handle_event(&event(group, status)).await.unwrap();
        assert!(matches!(outcome, PassOutcome::Skipped { .. }), "{group} {status}");
    }

    assert!(h.orchestrator.calls().await.is_empty());
    assert!(h.lb.calls().await.is_empty());
}

#[tokio::test]
async fn test_container_without_status_is_skipped() {
    let h = Harness::new(&[(8080, "i-aaa")]).await;
    h.run_task("t/1", "ci/a", &[8081]).await;

    let event: LifecycleEvent = serde_json::from_value(serde_json::json!({
        "detail": {
            "group": "service:payments",
            "clusterArn": CLUSTER,
            "lastStatus": "RUNNING",
            "containers": [{ "name": "app" }],
        }
    }))
    .unwrap();
    let outcome = h.agent.handle_event(&event).await.unwrap();

    assert!(matches!(outcome, PassOutcome::Skipped { .. }));
    assert!(h.orchestrator.calls().await.is_empty());
    assert!(h.lb.calls().await.is_empty());
}

#[tokio::test]
async fn test_running_event_converges_target_group() {
    let h = Harness::new(&[(8080, "i-aaa"), (8082, "i-ccc")]).await;
    h.run_task("t/1", "ci/a", &[8080]).await;
    h.run_task("t/2", "ci/b", &[8081]).await;

    let outcome = h
        .agent
        .handle_event(&event("service:payments", "RUNNING"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PassOutcome::Reconciled {
            added: 1,
            removed: 1
        }
    );
    assert_eq!(
        h.lb.mutations().await,
        vec![
            LoadBalancerCall::Register(vec![target(8081, "i-bbb")]),
            LoadBalancerCall::Deregister(vec![target(8082, "i-ccc")]),
        ]
    );
    assert_eq!(
        h.lb.registered(TARGET_GROUP).await,
        vec![(8080, "i-aaa".to_string()), (8081, "i-bbb".to_string())]
    );
}

#[tokio::test]
async fn test_second_pass_is_a_noop() {
    let h = Harness::new(&[(8082, "i-ccc")]).await;
    h.run_task("t/1", "ci/a", &[8080]).await;
    h.run_task("t/2", "ci/b", &[8081]).await;

    let first = h
        .agent
        .handle_event(&event("payments", "RUNNING"))
        .await
        .unwrap();
    assert_eq!(
        first,
        PassOutcome::Reconciled {
            added: 2,
            removed: 1
        }
    );
    let mutations_after_first = h.lb.mutations().await.len();

    let second = h
        .agent
        .handle_event(&event("payments", "RUNNING"))
        .await
        .unwrap();
    assert_eq!(
        second,
        PassOutcome::Reconciled {
            added: 0,
            removed: 0
        }
    );
    assert_eq!(h.lb.mutations().await.len(), mutations_after_first);
}

#[tokio::test]
async fn test_stopped_task_is_deregistered() {
    let h = Harness::new(&[]).await;
    h.run_task("t/1", "ci/a", &[8080]).await;
    h.run_task("t/2", "ci/b", &[8081]).await;
    h.agent
        .handle_event(&event("service:payments", "RUNNING"))
        .await
        .unwrap();

    h.orchestrator.remove_task("t/2").await;
    let outcome = h
        .agent
        .handle_event(&event("service:payments", "STOPPED"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PassOutcome::Reconciled {
            added: 0,
            removed: 1
        }
    );
    assert_eq!(
        h.lb.registered(TARGET_GROUP).await,
        vec![(8080, "i-aaa".to_string())]
    );
}

#[tokio::test]
async fn test_drained_service_deregisters_everything() {
    let h = Harness::new(&[(8080, "i-aaa")]).await;

    let outcome = h
        .agent
        .handle_event(&event("service:payments", "STOPPED"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PassOutcome::Reconciled {
            added: 0,
            removed: 1
        }
    );
    assert_eq!(
        h.lb.mutations().await,
        vec![LoadBalancerCall::Deregister(vec![target(8080, "i-aaa")])]
    );
}

#[tokio::test]
async fn test_query_failure_never_mutates() {
    let h = Harness::new(&[(8080, "i-aaa")]).await;
    h.run_task("t/1", "ci/a", &[8081]).await;
    h.orchestrator.fail("DescribeTasks").await;

    let err = h
        .agent
        .handle_event(&event("service:payments", "RUNNING"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::UpstreamQuery(_)));
    assert!(h.lb.calls().await.is_empty());
    assert_eq!(h.lb.registered(TARGET_GROUP).await, vec![(8080, "i-aaa".to_string())]);
}

#[tokio::test]
async fn test_deregister_failure_keeps_registration() {
    let h = Harness::new(&[(8082, "i-ccc")]).await;
    h.run_task("t/1", "ci/a", &[8081]).await;
    h.lb.fail("DeregisterTargets").await;

    let err = h
        .agent
        .handle_event(&event("service:payments", "RUNNING"))
        .await
        .unwrap_err();

    match err {
        SyncError::UpstreamMutation {
            mutation,
            registered,
            source,
        } => {
            assert_eq!(mutation, Mutation::Deregister);
            assert_eq!(registered, 1);
            assert!(matches!(source, ClientError::Api { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        h.lb.registered(TARGET_GROUP).await,
        vec![(8081, "i-aaa".to_string()), (8082, "i-ccc".to_string())]
    );
}

#[tokio::test]
async fn test_port_moved_to_other_node_is_left_alone() {
    let h = Harness::new(&[(8080, "i-aaa")]).await;
    h.run_task("t/1", "ci/b", &[8080]).await;

    let outcome = h
        .agent
        .handle_event(&event("service:payments", "RUNNING"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PassOutcome::Reconciled {
            added: 0,
            removed: 0
        }
    );
    assert!(h.lb.mutations().await.is_empty());
    assert_eq!(h.lb.registered(TARGET_GROUP).await, vec![(8080, "i-aaa".to_string())]);
}

#[tokio::test]
async fn test_missing_target_group_is_fatal() {
    let h = Harness::new(&[]).await;
    let lb = Arc::new(MemoryLoadBalancer::new());
    let config = Config {
        ecs_service: "payments".to_string(),
        target_group: "does-not-exist".to_string(),
        container_name: None,
        max_concurrency: NonZeroUsize::new(1).unwrap(),
        event_file: None,
    };
    let agent = SyncAgent::new(&config, h.orchestrator.clone(), lb.clone());

    let err = agent
        .handle_event(&event("service:payments", "RUNNING"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NotFound(name) if name == "does-not-exist"));
    assert!(lb.mutations().await.is_empty());
}
