use dropzone_types::{
    Arn, ClusterRef, ContainerDefinition, NetworkPlacement, SubnetClass, TaskInvocationSpec,
    TaskInvocationSpecBuilder, TaskTemplate,
};

pub const REGION: &str = "ap-northeast-1";
pub const ACCOUNT: &str = "123456789012";
pub const ROLE_NAME: &str = "dz-rule-role";

pub fn template() -> TaskTemplate {
    TaskTemplate {
        arn: Arn::ecs_task_definition(REGION, ACCOUNT, "dz-task", 4),
        containers: vec![
            ContainerDefinition {
                name: "app".into(),
                image: None,
                essential: true,
            },
            ContainerDefinition {
                name: "log-router".into(),
                image: None,
                essential: false,
            },
        ],
        execution_role_arn: Arn::iam_role(ACCOUNT, "dz-exec"),
        task_role_arn: Arn::iam_role(ACCOUNT, "dz-task"),
    }
}

pub fn cluster() -> ClusterRef {
    ClusterRef::new(REGION, ACCOUNT, "dz-cluster")
}

pub fn builder() -> TaskInvocationSpecBuilder {
    TaskInvocationSpec::builder(cluster(), template())
        .base_command(["/usr/src/app/lib/index.js"])
        .network(NetworkPlacement {
            subnet_class: SubnetClass::Public,
            subnet_ids: vec!["subnet-a".into()],
            security_groups: vec!["sg-a".into()],
            assign_public_ip: true,
        })
}

pub fn spec() -> TaskInvocationSpec {
    builder().build().unwrap()
}
