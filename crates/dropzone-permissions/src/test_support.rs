use dropzone_types::{
    Arn, ClusterRef, ContainerDefinition, NetworkPlacement, SubnetClass, TaskInvocationSpec,
    TaskTemplate,
};

pub const REGION: &str = "ap-northeast-1";
pub const ACCOUNT: &str = "123456789012";

pub fn spec() -> TaskInvocationSpec {
    spec_with_roles("dz-exec", "dz-task")
}

pub fn spec_with_roles(execution_role: &str, task_role: &str) -> TaskInvocationSpec {
    let template = TaskTemplate {
        arn: Arn::ecs_task_definition(REGION, ACCOUNT, "dz-task", 4),
        containers: vec![ContainerDefinition {
            name: "app".into(),
            image: None,
            essential: true,
        }],
        execution_role_arn: Arn::iam_role(ACCOUNT, execution_role),
        task_role_arn: Arn::iam_role(ACCOUNT, task_role),
    };
    TaskInvocationSpec::builder(ClusterRef::new(REGION, ACCOUNT, "dz-cluster"), template)
        .base_command(["/usr/src/app/lib/index.js"])
        .network(NetworkPlacement {
            subnet_class: SubnetClass::Public,
            subnet_ids: vec!["subnet-a".into()],
            security_groups: vec!["sg-a".into()],
            assign_public_ip: true,
        })
        .build()
        .unwrap()
}
