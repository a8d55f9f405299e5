use std::sync::Arc;

use anyhow::{Context, Result};

use dropzone_launcher::{EventRouter, InMemoryCluster, InMemoryEventBus, TaskLauncher};
use dropzone_permissions::InvocationRole;

use crate::config::DropzoneConfig;

/// Everything the handlers share, wired in dependency order from the config.
#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<InMemoryEventBus>,
    pub cluster: Arc<InMemoryCluster>,
}

impl AppState {
    pub fn from_config(config: &DropzoneConfig) -> Result<Self> {
        let spec = Arc::new(config.invocation_spec()?);

        let cluster = Arc::new(InMemoryCluster::with_history(
            spec.cluster().clone(),
            config.task_history,
        ));
        cluster.register_template(spec.template().clone());

        let role = InvocationRole::for_task_launch(config.role_name(), &spec)
            .context("Failed to build invocation role")?;
        let launcher = TaskLauncher::new(
            config.rule_name(),
            config.criteria(),
            Arc::new(role),
            spec,
            cluster.clone(),
        )
        .context("Failed to bind rule")?;

        let bus = Arc::new(InMemoryEventBus::new());
        bus.register(Arc::new(launcher))
            .context("Failed to register rule")?;

        Ok(Self { bus, cluster })
    }
}
