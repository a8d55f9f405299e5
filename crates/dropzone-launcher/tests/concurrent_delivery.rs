use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dropzone_launcher::{
    ComputeCluster, Delivery, DeliveryOutcome, EventRouter, InMemoryCluster, InMemoryEventBus,
    RunTaskOutput, RunTaskRequest, TaskLauncher,
};
use dropzone_matcher::MatchCriteria;
use dropzone_permissions::InvocationRole;
use dropzone_types::{
    Arn, ClusterRef, ContainerDefinition, DropzoneError, NetworkPlacement, Result,
    StorageChangeEvent, SubnetClass, TaskInvocationSpec, TaskTemplate,
};

const REGION: &str = "us-east-1";
const ACCOUNT: &str = "111122223333";

fn template() -> TaskTemplate {
    TaskTemplate {
        arn: Arn::ecs_task_definition(REGION, ACCOUNT, "ingest", 1),
        containers: vec![ContainerDefinition {
            name: "worker".into(),
            image: Some("ingest:latest".into()),
            essential: true,
        }],
        execution_role_arn: Arn::iam_role(ACCOUNT, "ingest-exec"),
        task_role_arn: Arn::iam_role(ACCOUNT, "ingest-task"),
    }
}

fn spec() -> Arc<TaskInvocationSpec> {
    Arc::new(
        TaskInvocationSpec::builder(ClusterRef::new(REGION, ACCOUNT, "ingest"), template())
            .base_command(["node", "/usr/src/app/lib/index.js"])
            .network(NetworkPlacement {
                subnet_class: SubnetClass::Private,
                subnet_ids: vec!["subnet-1".into(), "subnet-2".into()],
                security_groups: vec![],
                assign_public_ip: false,
            })
            .tag("pipeline", "ingest")
            .build()
            .unwrap(),
    )
}

fn launcher(cluster: Arc<dyn ComputeCluster>) -> Arc<TaskLauncher> {
    let spec = spec();
    let role = Arc::new(InvocationRole::for_task_launch("ingest-rule-role", &spec).unwrap());
    Arc::new(
        TaskLauncher::new(
            "ingest-rule",
            MatchCriteria::object_created("uploads", "input/"),
            role,
            spec,
            cluster,
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_concurrent_events_for_same_key_start_two_tasks() {
    let cluster = Arc::new(InMemoryCluster::new(ClusterRef::new(REGION, ACCOUNT, "ingest")));
    cluster.register_template(template());
    let launcher = launcher(cluster.clone());

    let event = StorageChangeEvent::object_created("uploads", "input/batch-7.json", 512);
    let (first, second) = tokio::join!(launcher.deliver(&event), launcher.deliver(&event));
    assert!(matches!(first.unwrap(), Delivery::Launched(_)));
    assert!(matches!(second.unwrap(), Delivery::Launched(_)));

    let accepted = cluster.accepted().await;
    assert_eq!(accepted.len(), 2);
    for entry in &accepted {
        let command = &entry.request.overrides.container_overrides[0].command;
        assert_eq!(command, &["node", "/usr/src/app/lib/index.js", "input/batch-7.json"]);
        assert_eq!(entry.request.tags[0].key, "pipeline");
    }
}

#[tokio::test]
async fn test_bus_fans_out_concurrent_publishes() {
    let cluster = Arc::new(InMemoryCluster::new(ClusterRef::new(REGION, ACCOUNT, "ingest")));
    cluster.register_template(template());
    let bus = Arc::new(InMemoryEventBus::new());
    bus.register(launcher(cluster.clone())).unwrap();

    let payload = |key: &str| {
        serde_json::json!({
            "source": "aws.s3",
            "detail-type": "Object Created",
            "detail": { "bucket": { "name": "uploads" }, "object": { "key": key, "size": 1 } }
        })
    };
    let publishes = (0..8).map(|i| {
        let bus = bus.clone();
        let event = payload(&format!("input/{i}.json"));
        tokio::spawn(async move { bus.put_event(event).await })
    });
    for handle in publishes.collect::<Vec<_>>() {
        let deliveries = handle.await.unwrap();
        assert!(matches!(deliveries[0].outcome, DeliveryOutcome::Launched { .. }));
    }
    assert_eq!(cluster.task_count().await, 8);
}

/// Cluster that refuses everything, counting attempts.
#[derive(Default)]
struct RefusingCluster {
    attempts: AtomicUsize,
}

#[async_trait]
impl ComputeCluster for RefusingCluster {
    async fn run_task(
        &self,
        _caller: &InvocationRole,
        request: RunTaskRequest,
    ) -> Result<RunTaskOutput> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DropzoneError::AccessDenied {
            action: "ecs:RunTask".into(),
            resource: request.task_definition,
        })
    }
}

#[tokio::test]
async fn test_rejected_launch_is_not_retried() {
    let cluster = Arc::new(RefusingCluster::default());
    let launcher = launcher(cluster.clone());

    let event = StorageChangeEvent::object_created("uploads", "input/a.json", 10);
    let err = launcher.deliver(&event).await.unwrap_err();
    assert!(matches!(err, DropzoneError::AccessDenied { .. }));
    assert_eq!(cluster.attempts.load(Ordering::SeqCst), 1);
}
