use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::kind::PrimaryKind;

type Extra = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub cluster_arn: String,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub running_tasks_count: i64,
    #[serde(default)]
    pub pending_tasks_count: i64,
    #[serde(default)]
    pub active_services_count: i64,
    #[serde(default)]
    pub registered_container_instances_count: i64,
    #[serde(default)]
    pub capacity_providers: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub service_arn: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub cluster_arn: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub desired_count: i64,
    #[serde(default)]
    pub running_count: i64,
    #[serde(default)]
    pub pending_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_type: Option<String>,
    #[serde(default)]
    pub task_definition: String,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
    #[serde(default)]
    pub events: Vec<ServiceEvent>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub task_arn: String,
    #[serde(default)]
    pub cluster_arn: String,
    #[serde(default)]
    pub task_definition_arn: String,
    #[serde(default)]
    pub last_status: String,
    #[serde(default)]
    pub desired_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub enable_execute_command: bool,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default)]
    pub container_arn: String,
    #[serde(default)]
    pub task_arn: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub last_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    #[serde(default)]
    pub task_definition_arn: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub revision: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(default)]
    pub requires_compatibilities: Vec<String>,
    #[serde(default)]
    pub container_definitions: Vec<Value>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInstance {
    #[serde(default)]
    pub container_instance_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ec2_instance_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub agent_connected: bool,
    #[serde(default)]
    pub running_tasks_count: i64,
    #[serde(default)]
    pub pending_tasks_count: i64,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub task_definition: String,
    #[serde(default)]
    pub desired_count: i64,
    #[serde(default)]
    pub running_count: i64,
    #[serde(default)]
    pub pending_count: i64,
    #[serde(default)]
    pub failed_tasks: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_state: Option<String>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEvent {
    #[serde(default)]
    pub id: String,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub average: f64,
    pub maximum: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Synthetic identity: the owning resource's name with a `#metrics` suffix.
    pub name: String,
    pub cpu_utilization: Vec<MetricPoint>,
    pub memory_utilization: Vec<MetricPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalingSnapshot {
    pub resource_id: String,
    pub scalable_targets: Vec<Value>,
    pub scaling_policies: Vec<Value>,
    pub scheduled_actions: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsSnapshot {
    pub service_arn: String,
    pub events: Vec<ServiceEvent>,
}

/// The resource attached to a list row. Superseded on reload, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Cluster(Cluster),
    Service(Service),
    Task(Task),
    Container(Container),
    TaskDefinition(TaskDefinition),
    Instance(ContainerInstance),
    Deployment(Deployment),
    Metrics(MetricsSnapshot),
    AutoScaling(AutoScalingSnapshot),
    Events(EventsSnapshot),
}

impl Entity {
    pub fn entity_name(&self) -> &str {
        match self {
            Self::Cluster(cluster) => &cluster.cluster_arn,
            Self::Service(service) => &service.service_arn,
            Self::Task(task) => &task.task_arn,
            Self::Container(container) => &container.container_arn,
            Self::TaskDefinition(definition) => &definition.task_definition_arn,
            Self::Instance(instance) => &instance.container_instance_arn,
            Self::Deployment(deployment) => &deployment.id,
            Self::Metrics(metrics) => &metrics.name,
            Self::AutoScaling(scaling) => &scaling.resource_id,
            Self::Events(events) => &events.service_arn,
        }
    }

    /// Primary kind whose rows carry this variant; synthetic payloads have none.
    pub fn kind(&self) -> Option<PrimaryKind> {
        match self {
            Self::Cluster(_) => Some(PrimaryKind::Cluster),
            Self::Service(_) => Some(PrimaryKind::Service),
            Self::Task(_) => Some(PrimaryKind::Task),
            Self::Container(_) => Some(PrimaryKind::Container),
            Self::TaskDefinition(_) => Some(PrimaryKind::TaskDefinition),
            Self::Instance(_) => Some(PrimaryKind::Instance),
            Self::Deployment(_) => Some(PrimaryKind::Deployment),
            Self::Metrics(_) | Self::AutoScaling(_) | Self::Events(_) => None,
        }
    }

    pub fn to_pretty_json(&self) -> String {
        let rendered = match self {
            Self::Cluster(value) => serde_json::to_string_pretty(value),
            Self::Service(value) => serde_json::to_string_pretty(value),
            Self::Task(value) => serde_json::to_string_pretty(value),
            Self::Container(value) => serde_json::to_string_pretty(value),
            Self::TaskDefinition(value) => serde_json::to_string_pretty(value),
            Self::Instance(value) => serde_json::to_string_pretty(value),
            Self::Deployment(value) => serde_json::to_string_pretty(value),
            Self::Metrics(value) => serde_json::to_string_pretty(value),
            Self::AutoScaling(value) => serde_json::to_string_pretty(value),
            Self::Events(value) => serde_json::to_string_pretty(value),
        };
        rendered.unwrap_or_else(|error| format!("failed to format description: {error}"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RowData {
    pub name: String,
    pub columns: Vec<String>,
    pub entity: Option<Entity>,
}

impl RowData {
    pub fn matches_filter(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }

        let query_lower = query.to_ascii_lowercase();
        if self.name.to_ascii_lowercase().contains(&query_lower) {
            return true;
        }

        self.columns
            .iter()
            .any(|column| column.to_ascii_lowercase().contains(&query_lower))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<RowData>,
    pub selected: usize,
    pub last_refreshed: Option<DateTime<Local>>,
    pub error: Option<String>,
}

impl TableData {
    pub fn set_rows(
        &mut self,
        headers: Vec<String>,
        rows: Vec<RowData>,
        refreshed_at: DateTime<Local>,
    ) {
        self.headers = headers;
        self.rows = rows;
        self.last_refreshed = Some(refreshed_at);
        self.error = None;
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }

    pub fn set_error(&mut self, error: impl Into<String>, refreshed_at: DateTime<Local>) {
        self.rows.clear();
        self.error = Some(error.into());
        self.last_refreshed = Some(refreshed_at);
        self.selected = 0;
    }
}

/// Resources highlighted along the current drill-down path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub cluster: Option<Cluster>,
    pub service: Option<Service>,
    pub task: Option<Task>,
    pub container: Option<Container>,
    pub task_definition: Option<TaskDefinition>,
    pub instance: Option<ContainerInstance>,
    pub deployment: Option<Deployment>,
}

impl Selection {
    /// Copies the entity into the matching field. Picking a different resource at
    /// one level clears the levels beneath it.
    pub fn capture(&mut self, entity: &Entity) -> bool {
        match entity {
            Entity::Cluster(cluster) => {
                if self.cluster.as_ref().map(|current| &current.cluster_arn)
                    != Some(&cluster.cluster_arn)
                {
                    self.service = None;
                    self.task = None;
                    self.container = None;
                    self.instance = None;
                    self.deployment = None;
                }
                self.cluster = Some(cluster.clone());
            }
            Entity::Service(service) => {
                if self.service.as_ref().map(|current| &current.service_arn)
                    != Some(&service.service_arn)
                {
                    self.task = None;
                    self.container = None;
                    self.deployment = None;
                }
                self.service = Some(service.clone());
            }
            Entity::Task(task) => {
                if self.task.as_ref().map(|current| &current.task_arn) != Some(&task.task_arn) {
                    self.container = None;
                }
                self.task = Some(task.clone());
            }
            Entity::Container(container) => self.container = Some(container.clone()),
            Entity::TaskDefinition(definition) => {
                self.task_definition = Some(definition.clone())
            }
            Entity::Instance(instance) => self.instance = Some(instance.clone()),
            Entity::Deployment(deployment) => self.deployment = Some(deployment.clone()),
            Entity::Metrics(_) | Entity::AutoScaling(_) | Entity::Events(_) => return false,
        }
        true
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster
            .as_ref()
            .map(|cluster| cluster.cluster_name.as_str())
    }

    /// Composite `cluster.container` identifier used to group forwarding sessions.
    pub fn container_id(&self) -> Option<String> {
        let cluster = self.cluster_name()?;
        let container = self.container.as_ref()?;
        Some(container_session_id(cluster, container))
    }
}

pub fn container_session_id(cluster_name: &str, container: &Container) -> String {
    format!("{cluster_name}.{}", container.name)
}

/// Last path segment of an ARN (`.../name` or `.../cluster/id`).
pub fn short_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

/// Family of a task definition given its ARN, `family:revision` or bare family.
pub fn task_definition_family(reference: &str) -> &str {
    let tail = short_arn(reference);
    match tail.rsplit_once(':') {
        Some((family, revision)) if revision.chars().all(|ch| ch.is_ascii_digit()) => family,
        _ => tail,
    }
}

pub fn human_age(timestamp: Option<DateTime<Utc>>) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_string();
    };
    let elapsed_seconds = (Utc::now() - timestamp).num_seconds().max(0);
    format_elapsed_seconds(elapsed_seconds)
}

fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}

mod timestamp {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accepts both ISO-8601 strings and epoch seconds, whichever the CLI emits.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(parse))
    }

    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc)),
            Value::Number(number) => {
                let seconds = number.as_f64()?;
                Utc.timestamp_millis_opt((seconds * 1_000.0) as i64).single()
            }
            _ => None,
        }
    }
}
