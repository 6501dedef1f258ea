use crate::policy::ErrorPolicy;
use beanq_core::{expand_tube_name, Priority, DEFAULT_TUBE_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub beanstalk_url: String,
    pub tube_namespace: String,
    pub default_priority: u32,
    /// Default TTR in seconds for enqueued jobs
    pub respond_timeout: u32,
    /// Queues a worker watches when it is not given any explicitly
    pub default_queues: Vec<String>,
    pub priority_labels: HashMap<String, u32>,
    pub worker_id: Option<String>,
    #[serde(skip)]
    pub on_error: Option<ErrorPolicy>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            beanstalk_url: "beanstalk://127.0.0.1:11300".to_string(),
            tube_namespace: DEFAULT_TUBE_NAMESPACE.to_string(),
            default_priority: Priority::DEFAULT,
            respond_timeout: 120,
            default_queues: vec![],
            priority_labels: Priority::default_labels(),
            worker_id: None,
            on_error: None,
        }
    }
}

impl WorkerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: WorkerConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Set the error policy
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = Some(policy);
        self
    }

    /// Namespace a queue name
    pub fn expand_tube_name(&self, name: &str) -> String {
        expand_tube_name(&self.tube_namespace, name)
    }

    pub fn generate_worker_id(&self) -> String {
        use std::process;
        use uuid::Uuid;

        if let Some(id) = &self.worker_id {
            return id.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let pid = process::id();
        let random = Uuid::new_v4().simple().to_string();

        format!("{}-{}-{}", hostname, pid, &random[..8])
    }
}
