use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::app::{LoadRequest, LogSource, OverlayContent, OverlayRequest};
use crate::model::{
    AutoScalingSnapshot, Cluster, ContainerInstance, Entity, MetricPoint, MetricsSnapshot,
    RowData, Service, TableData, Task, TaskDefinition, human_age, short_arn,
};

const DESCRIBE_SERVICES_BATCH: usize = 10;
const DESCRIBE_BATCH: usize = 100;
const LOG_EVENT_LIMIT: usize = 200;
const REVISION_HISTORY_LIMIT: usize = 15;
const METRICS_WINDOW_HOURS: i64 = 3;
const METRICS_PERIOD_SECS: i64 = 300;

/// Fields AWS returns on a task definition that `register-task-definition`
/// rejects.
const READ_ONLY_TASK_DEFINITION_FIELDS: [&str; 8] = [
    "taskDefinitionArn",
    "revision",
    "status",
    "requiresAttributes",
    "compatibilities",
    "registeredAt",
    "registeredBy",
    "deregisteredAt",
];

#[derive(Debug, Clone)]
pub struct EcsGateway {
    profile: Option<String>,
    region: Option<String>,
}

/// Where the awslogs driver of one container writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub container: String,
    pub group: String,
    /// Exact stream when the task is known, otherwise a stream prefix.
    pub stream: String,
    pub exact: bool,
    pub region: Option<String>,
}

impl EcsGateway {
    pub fn new(profile: Option<String>, region: Option<String>) -> Self {
        Self { profile, region }
    }

    /// `aws` invocation carrying the profile and region flags.
    pub fn command<S: AsRef<str>>(&self, args: &[S]) -> Command {
        let mut command = Command::new("aws");
        if let Some(profile) = &self.profile {
            command.args(["--profile", profile.as_str()]);
        }
        if let Some(region) = &self.region {
            command.args(["--region", region.as_str()]);
        }
        for arg in args {
            let arg: &str = arg.as_ref();
            command.arg(arg);
        }
        command
    }

    pub async fn fetch_table(&self, request: &LoadRequest) -> Result<TableData> {
        let refreshed_at = Local::now();
        let (headers, mut rows) = match request {
            LoadRequest::Clusters => cluster_rows(self.list_clusters().await?),
            LoadRequest::Services { cluster } => service_rows(self.list_services(cluster).await?),
            LoadRequest::Tasks { cluster, service } => {
                task_rows(self.list_tasks(cluster, service).await?)
            }
            LoadRequest::Containers { cluster, task } => {
                container_rows(self.describe_task(cluster, task).await?)
            }
            LoadRequest::TaskDefinitions { family } => {
                task_definition_rows(self.list_task_definitions(family).await?)
            }
            LoadRequest::Instances { cluster } => {
                instance_rows(self.list_container_instances(cluster).await?)
            }
            LoadRequest::Deployments { cluster, service } => {
                let service = self.describe_service(cluster, service).await?;
                deployment_rows(service)
            }
        };

        if !matches!(request, LoadRequest::TaskDefinitions { .. }) {
            rows.sort_by(|left, right| left.name.cmp(&right.name));
        }

        let mut table = TableData::default();
        table.set_rows(headers, rows, refreshed_at);
        Ok(table)
    }

    pub async fn fetch_overlay(&self, request: &OverlayRequest) -> Result<OverlayContent> {
        match request {
            OverlayRequest::Logs(source) => {
                let lines = self.fetch_logs(source).await?;
                if lines.is_empty() {
                    return Ok(OverlayContent::Text("No log events found.".to_string()));
                }
                Ok(OverlayContent::Text(lines.join("\n")))
            }
            OverlayRequest::Metrics {
                cluster,
                service,
                owner,
            } => {
                let cpu = self
                    .fetch_metric(cluster, service.as_deref(), "CPUUtilization")
                    .await?;
                let memory = self
                    .fetch_metric(cluster, service.as_deref(), "MemoryUtilization")
                    .await?;
                Ok(OverlayContent::Entity(Entity::Metrics(MetricsSnapshot {
                    name: owner.clone(),
                    cpu_utilization: cpu,
                    memory_utilization: memory,
                })))
            }
            OverlayRequest::AutoScaling { cluster, service } => Ok(OverlayContent::Entity(
                Entity::AutoScaling(self.fetch_autoscaling(cluster, service).await?),
            )),
            OverlayRequest::RevisionHistory { family } => {
                let (headers, rows) = task_definition_rows(self.list_task_definitions(family).await?);
                let mut table = TableData::default();
                table.set_rows(headers, rows, Local::now());
                Ok(OverlayContent::Table(table))
            }
            OverlayRequest::RevisionDiff { task_definition } => Ok(OverlayContent::Text(
                self.fetch_revision_diff(task_definition).await?,
            )),
        }
    }

    pub async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        desired_count: i64,
        task_definition: Option<&str>,
        force_new_deployment: bool,
    ) -> Result<Service> {
        let mut args = strings(&["ecs", "update-service", "--cluster", cluster, "--service", service]);
        args.extend(strings(&["--desired-count", &desired_count.to_string()]));
        if let Some(task_definition) = task_definition {
            args.extend(strings(&["--task-definition", task_definition]));
        }
        if force_new_deployment {
            args.push("--force-new-deployment".to_string());
        }
        let response = self.call(&args).await?;
        field_as(&response, "service")
    }

    pub async fn stop_task(&self, cluster: &str, task: &str, reason: &str) -> Result<Task> {
        let mut args = strings(&["ecs", "stop-task", "--cluster", cluster, "--task", task]);
        if !reason.trim().is_empty() {
            args.extend(strings(&["--reason", reason.trim()]));
        }
        let response = self.call(&args).await?;
        field_as(&response, "task")
    }

    /// Registers the document at `path` as a new revision of its family.
    pub async fn register_task_definition(&self, path: &Path) -> Result<TaskDefinition> {
        let input = format!("file://{}", path.display());
        let response = self
            .call(&strings(&[
                "ecs",
                "register-task-definition",
                "--cli-input-json",
                &input,
            ]))
            .await?;
        field_as(&response, "taskDefinition")
    }

    pub async fn terminate_session(&self, session_id: &str) -> Result<()> {
        self.call(&strings(&["ssm", "terminate-session", "--session-id", session_id]))
            .await
            .with_context(|| format!("failed to terminate session {session_id}"))?;
        Ok(())
    }

    /// Log targets for the containers the source refers to.
    pub async fn resolve_log_targets(&self, source: &LogSource) -> Result<Vec<LogTarget>> {
        let definition = self.describe_task_definition(&source.task_definition).await?;
        let targets = log_targets(&definition, source);
        if targets.is_empty() {
            bail!(
                "{} has no container using the awslogs driver",
                short_arn(&source.task_definition)
            );
        }
        Ok(targets)
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let arns = self
            .list_arns(&strings(&["ecs", "list-clusters"]), "clusterArns")
            .await?;
        self.describe_in_batches(&arns, DESCRIBE_BATCH, "clusters", |chunk| {
            let mut args = strings(&["ecs", "describe-clusters", "--clusters"]);
            args.extend(chunk.iter().cloned());
            args
        })
        .await
    }

    async fn list_services(&self, cluster: &str) -> Result<Vec<Service>> {
        let arns = self
            .list_arns(
                &strings(&["ecs", "list-services", "--cluster", cluster]),
                "serviceArns",
            )
            .await?;
        self.describe_in_batches(&arns, DESCRIBE_SERVICES_BATCH, "services", |chunk| {
            let mut args = strings(&["ecs", "describe-services", "--cluster", cluster, "--services"]);
            args.extend(chunk.iter().cloned());
            args
        })
        .await
    }

    async fn describe_service(&self, cluster: &str, service: &str) -> Result<Service> {
        let response = self
            .call(&strings(&[
                "ecs",
                "describe-services",
                "--cluster",
                cluster,
                "--services",
                service,
            ]))
            .await?;
        let services: Vec<Service> = field_as(&response, "services")?;
        services
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("service {} was not found", short_arn(service)))
    }

    async fn list_tasks(&self, cluster: &str, service: &str) -> Result<Vec<Task>> {
        let arns = self
            .list_arns(
                &strings(&[
                    "ecs",
                    "list-tasks",
                    "--cluster",
                    cluster,
                    "--service-name",
                    short_arn(service),
                ]),
                "taskArns",
            )
            .await?;
        self.describe_in_batches(&arns, DESCRIBE_BATCH, "tasks", |chunk| {
            let mut args = strings(&["ecs", "describe-tasks", "--cluster", cluster, "--tasks"]);
            args.extend(chunk.iter().cloned());
            args
        })
        .await
    }

    async fn describe_task(&self, cluster: &str, task: &str) -> Result<Task> {
        let response = self
            .call(&strings(&[
                "ecs",
                "describe-tasks",
                "--cluster",
                cluster,
                "--tasks",
                task,
            ]))
            .await?;
        let tasks: Vec<Task> = field_as(&response, "tasks")?;
        tasks
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("task {} was not found", short_arn(task)))
    }

    async fn describe_task_definition(&self, reference: &str) -> Result<TaskDefinition> {
        let response = self
            .call(&strings(&[
                "ecs",
                "describe-task-definition",
                "--task-definition",
                reference,
            ]))
            .await?;
        field_as(&response, "taskDefinition")
    }

    async fn list_task_definitions(&self, family: &str) -> Result<Vec<TaskDefinition>> {
        let limit = REVISION_HISTORY_LIMIT.to_string();
        let arns = self
            .list_arns(
                &strings(&[
                    "ecs",
                    "list-task-definitions",
                    "--family-prefix",
                    family,
                    "--sort",
                    "DESC",
                    "--max-items",
                    &limit,
                ]),
                "taskDefinitionArns",
            )
            .await?;
        let mut definitions = try_join_all(
            arns.iter()
                .map(|arn| self.describe_task_definition(arn)),
        )
        .await?;
        // --family-prefix also matches longer family names.
        definitions.retain(|definition| definition.family == family);
        definitions.sort_by(|left, right| right.revision.cmp(&left.revision));
        Ok(definitions)
    }

    async fn list_container_instances(&self, cluster: &str) -> Result<Vec<ContainerInstance>> {
        let arns = self
            .list_arns(
                &strings(&["ecs", "list-container-instances", "--cluster", cluster]),
                "containerInstanceArns",
            )
            .await?;
        self.describe_in_batches(&arns, DESCRIBE_BATCH, "containerInstances", |chunk| {
            let mut args = strings(&[
                "ecs",
                "describe-container-instances",
                "--cluster",
                cluster,
                "--container-instances",
            ]);
            args.extend(chunk.iter().cloned());
            args
        })
        .await
    }

    async fn fetch_logs(&self, source: &LogSource) -> Result<Vec<String>> {
        let targets = self.resolve_log_targets(source).await?;
        let limit = LOG_EVENT_LIMIT.to_string();
        let responses = try_join_all(targets.iter().map(|target| {
            let mut args = if target.exact {
                strings(&[
                    "logs",
                    "get-log-events",
                    "--log-group-name",
                    &target.group,
                    "--log-stream-name",
                    &target.stream,
                    "--limit",
                    &limit,
                ])
            } else {
                strings(&[
                    "logs",
                    "filter-log-events",
                    "--log-group-name",
                    &target.group,
                    "--log-stream-name-prefix",
                    &target.stream,
                    "--max-items",
                    &limit,
                ])
            };
            if let Some(region) = &target.region {
                args.extend(strings(&["--region", region]));
            }
            async move {
                let response = self.call(&args).await?;
                Ok::<_, anyhow::Error>((target.container.clone(), response))
            }
        }))
        .await?;

        let mut events = responses
            .iter()
            .flat_map(|(container, response)| log_events(container, response))
            .collect::<Vec<_>>();
        events.sort_by_key(|(timestamp, _)| *timestamp);
        let skip = events.len().saturating_sub(LOG_EVENT_LIMIT);
        Ok(events.into_iter().skip(skip).map(|(_, line)| line).collect())
    }

    async fn fetch_metric(
        &self,
        cluster: &str,
        service: Option<&str>,
        metric: &str,
    ) -> Result<Vec<MetricPoint>> {
        let end = Utc::now();
        let start = end - Duration::hours(METRICS_WINDOW_HOURS);
        let mut dimensions = vec![format!("Name=ClusterName,Value={}", short_arn(cluster))];
        if let Some(service) = service {
            dimensions.push(format!("Name=ServiceName,Value={}", short_arn(service)));
        }

        let mut args = strings(&[
            "cloudwatch",
            "get-metric-statistics",
            "--namespace",
            "AWS/ECS",
            "--metric-name",
            metric,
            "--start-time",
            &start.to_rfc3339(),
            "--end-time",
            &end.to_rfc3339(),
            "--period",
            &METRICS_PERIOD_SECS.to_string(),
            "--statistics",
            "Average",
            "Maximum",
            "--dimensions",
        ]);
        args.extend(dimensions);
        let response = self.call(&args).await?;
        Ok(metric_points(&response))
    }

    async fn fetch_autoscaling(&self, cluster: &str, service: &str) -> Result<AutoScalingSnapshot> {
        let resource_id = format!("service/{}/{}", short_arn(cluster), short_arn(service));
        let targets_args = strings(&[
            "application-autoscaling",
            "describe-scalable-targets",
            "--service-namespace",
            "ecs",
            "--resource-ids",
            &resource_id,
        ]);
        let policies_args = strings(&[
            "application-autoscaling",
            "describe-scaling-policies",
            "--service-namespace",
            "ecs",
            "--resource-id",
            &resource_id,
        ]);
        let scheduled_args = strings(&[
            "application-autoscaling",
            "describe-scheduled-actions",
            "--service-namespace",
            "ecs",
            "--resource-id",
            &resource_id,
        ]);
        let (targets, policies, scheduled) = futures::try_join!(
            self.call(&targets_args),
            self.call(&policies_args),
            self.call(&scheduled_args)
        )?;

        Ok(AutoScalingSnapshot {
            resource_id,
            scalable_targets: array_field(&targets, "ScalableTargets"),
            scaling_policies: array_field(&policies, "ScalingPolicies"),
            scheduled_actions: array_field(&scheduled, "ScheduledActions"),
        })
    }

    async fn fetch_revision_diff(&self, task_definition: &str) -> Result<String> {
        let current = self.describe_task_definition(task_definition).await?;
        let label = format!("{}:{}", current.family, current.revision);
        if current.revision <= 1 {
            return Ok(format!("{label} is the first revision of its family."));
        }

        let previous_reference = format!("{}:{}", current.family, current.revision - 1);
        let previous = self
            .describe_task_definition(&previous_reference)
            .await
            .with_context(|| format!("failed to load {previous_reference}"))?;

        let old = pretty(&registration_document(&previous)?);
        let new = pretty(&registration_document(&current)?);
        let diff = diff_lines(&old, &new);
        if diff.iter().all(|line| line.starts_with("  ")) {
            return Ok(format!("{previous_reference} and {label} are identical."));
        }
        let mut text = format!("--- {previous_reference}\n+++ {label}\n");
        text.push_str(&diff.join("\n"));
        Ok(text)
    }

    async fn list_arns(&self, args: &[String], field: &str) -> Result<Vec<String>> {
        let response = self.call(args).await?;
        field_as(&response, field)
    }

    async fn describe_in_batches<T, F>(
        &self,
        arns: &[String],
        batch: usize,
        field: &str,
        build_args: F,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&[String]) -> Vec<String>,
    {
        if arns.is_empty() {
            return Ok(Vec::new());
        }
        let responses = try_join_all(
            arns.chunks(batch)
                .map(|chunk| build_args(chunk))
                .map(|args| async move { self.call(&args).await }),
        )
        .await?;

        let mut records = Vec::new();
        for response in &responses {
            records.extend(field_as::<Vec<T>>(response, field)?);
        }
        Ok(records)
    }

    /// Non-interactive call returning JSON. The child dies with its future
    /// when the caller gives up on it.
    fn json_command(&self, args: &[String]) -> Command {
        let mut command = self.command(args);
        command
            .args(["--output", "json", "--no-cli-pager"])
            .kill_on_drop(true);
        command
    }

    async fn call(&self, args: &[String]) -> Result<Value> {
        let operation = args.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
        debug!(operation = %operation, "aws call");

        let mut command = self.json_command(args);
        let output = command.output().await.map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                anyhow!("aws CLI not found in PATH; install AWS CLI v2 to browse ECS")
            } else {
                anyhow!(error).context(format!("failed to run aws {operation}"))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("aws {operation} failed: {}", stderr.trim());
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("aws {operation} returned malformed JSON"))
    }
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn field_as<T: DeserializeOwned>(response: &Value, field: &str) -> Result<T> {
    let value = response.get(field).cloned().unwrap_or(Value::Null);
    let value = if value.is_null() {
        Value::Array(Vec::new())
    } else {
        value
    };
    serde_json::from_value(value).with_context(|| format!("unexpected shape for '{field}'"))
}

fn array_field(response: &Value, field: &str) -> Vec<Value> {
    response
        .get(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Task definition as `register-task-definition --cli-input-json` accepts it.
pub fn registration_document(definition: &TaskDefinition) -> Result<Value> {
    let mut document =
        serde_json::to_value(definition).context("failed to serialize task definition")?;
    if let Value::Object(map) = &mut document {
        for field in READ_ONLY_TASK_DEFINITION_FIELDS {
            map.remove(field);
        }
        map.retain(|_, value| !value.is_null());
    }
    Ok(document)
}

pub fn log_targets(definition: &TaskDefinition, source: &LogSource) -> Vec<LogTarget> {
    definition
        .container_definitions
        .iter()
        .filter_map(|container| {
            let name = container.get("name")?.as_str()?;
            if source
                .container
                .as_deref()
                .is_some_and(|wanted| wanted != name)
            {
                return None;
            }
            let config = container.get("logConfiguration")?;
            if config.get("logDriver")?.as_str()? != "awslogs" {
                return None;
            }
            let options = config.get("options")?;
            let group = options.get("awslogs-group")?.as_str()?.to_string();
            let prefix = options
                .get("awslogs-stream-prefix")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let region = options
                .get("awslogs-region")
                .and_then(Value::as_str)
                .map(str::to_string);

            let mut stream = if prefix.is_empty() {
                String::new()
            } else {
                format!("{prefix}/{name}")
            };
            let exact = match &source.task_id {
                Some(task_id) if !stream.is_empty() => {
                    stream = format!("{stream}/{task_id}");
                    true
                }
                _ => false,
            };

            Some(LogTarget {
                container: name.to_string(),
                group,
                stream,
                exact,
                region,
            })
        })
        .collect()
}

fn log_events(container: &str, response: &Value) -> Vec<(i64, String)> {
    array_field(response, "events")
        .iter()
        .filter_map(|event| {
            let timestamp = event.get("timestamp")?.as_i64()?;
            let message = event
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim_end();
            let at = Utc
                .timestamp_millis_opt(timestamp)
                .single()
                .map(|ts| ts.with_timezone(&Local).format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "--:--:--".to_string());
            Some((timestamp, format!("{at} [{container}] {message}")))
        })
        .collect()
}

fn metric_points(response: &Value) -> Vec<MetricPoint> {
    let mut points = array_field(response, "Datapoints")
        .iter()
        .map(|point| MetricPoint {
            timestamp: point
                .get("Timestamp")
                .and_then(Value::as_str)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|parsed| parsed.with_timezone(&Utc)),
            average: point.get("Average").and_then(Value::as_f64).unwrap_or_default(),
            maximum: point.get("Maximum").and_then(Value::as_f64).unwrap_or_default(),
        })
        .collect::<Vec<_>>();
    points.sort_by_key(|point| point.timestamp);
    points
}

/// Line diff of two documents. Lines are prefixed with `  `, `- ` or `+ `.
pub fn diff_lines(old: &str, new: &str) -> Vec<String> {
    let old = old.lines().collect::<Vec<_>>();
    let new = new.lines().collect::<Vec<_>>();

    let mut common = vec![vec![0usize; new.len() + 1]; old.len() + 1];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            common[i][j] = if old[i] == new[j] {
                common[i + 1][j + 1] + 1
            } else {
                common[i + 1][j].max(common[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    let mut lines = Vec::new();
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            lines.push(format!("  {}", old[i]));
            i += 1;
            j += 1;
        } else if common[i + 1][j] >= common[i][j + 1] {
            lines.push(format!("- {}", old[i]));
            i += 1;
        } else {
            lines.push(format!("+ {}", new[j]));
            j += 1;
        }
    }
    lines.extend(old[i..].iter().map(|line| format!("- {line}")));
    lines.extend(new[j..].iter().map(|line| format!("+ {line}")));
    lines
}

fn headers(names: &[&str]) -> Vec<String> {
    strings(names)
}

fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|value| !value.is_empty())
        .unwrap_or("-")
        .to_string()
}

fn cluster_rows(clusters: Vec<Cluster>) -> (Vec<String>, Vec<RowData>) {
    let rows = clusters
        .into_iter()
        .map(|cluster| RowData {
            name: cluster.cluster_name.clone(),
            columns: vec![
                cluster.cluster_name.clone(),
                cluster.status.clone(),
                cluster.active_services_count.to_string(),
                cluster.running_tasks_count.to_string(),
                cluster.pending_tasks_count.to_string(),
                cluster.registered_container_instances_count.to_string(),
            ],
            entity: Some(Entity::Cluster(cluster)),
        })
        .collect();
    (
        headers(&["Name", "Status", "Services", "Running", "Pending", "Instances"]),
        rows,
    )
}

fn service_rows(services: Vec<Service>) -> (Vec<String>, Vec<RowData>) {
    let rows = services
        .into_iter()
        .map(|service| RowData {
            name: service.service_name.clone(),
            columns: vec![
                service.service_name.clone(),
                service.status.clone(),
                format!("{}/{}", service.running_count, service.desired_count),
                service.pending_count.to_string(),
                or_dash(service.launch_type.as_deref()),
                short_arn(&service.task_definition).to_string(),
                human_age(service.created_at),
            ],
            entity: Some(Entity::Service(service)),
        })
        .collect();
    (
        headers(&[
            "Name",
            "Status",
            "Running",
            "Pending",
            "Launch",
            "Task Def",
            "Age",
        ]),
        rows,
    )
}

fn task_rows(tasks: Vec<Task>) -> (Vec<String>, Vec<RowData>) {
    let rows = tasks
        .into_iter()
        .map(|task| {
            let id = short_arn(&task.task_arn).to_string();
            RowData {
                name: id.clone(),
                columns: vec![
                    id,
                    task.last_status.clone(),
                    task.desired_status.clone(),
                    or_dash(task.health_status.as_deref()),
                    short_arn(&task.task_definition_arn).to_string(),
                    or_dash(task.availability_zone.as_deref()),
                    if task.enable_execute_command { "yes" } else { "no" }.to_string(),
                    human_age(task.started_at),
                ],
                entity: Some(Entity::Task(task)),
            }
        })
        .collect();
    (
        headers(&[
            "Task", "Status", "Desired", "Health", "Task Def", "AZ", "Exec", "Age",
        ]),
        rows,
    )
}

fn container_rows(task: Task) -> (Vec<String>, Vec<RowData>) {
    let rows = task
        .containers
        .into_iter()
        .map(|mut container| {
            if container.task_arn.is_empty() {
                container.task_arn = task.task_arn.clone();
            }
            RowData {
                name: container.name.clone(),
                columns: vec![
                    container.name.clone(),
                    container.last_status.clone(),
                    or_dash(container.health_status.as_deref()),
                    container.image.clone(),
                    container
                        .exit_code
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ],
                entity: Some(Entity::Container(container)),
            }
        })
        .collect();
    (
        headers(&["Name", "Status", "Health", "Image", "Exit"]),
        rows,
    )
}

fn task_definition_rows(definitions: Vec<TaskDefinition>) -> (Vec<String>, Vec<RowData>) {
    let rows = definitions
        .into_iter()
        .map(|definition| {
            let label = format!("{}:{}", definition.family, definition.revision);
            let images = definition
                .container_definitions
                .iter()
                .filter_map(|container| container.get("image").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(", ");
            RowData {
                name: label.clone(),
                columns: vec![
                    label,
                    definition.status.clone(),
                    or_dash(definition.cpu.as_deref()),
                    or_dash(definition.memory.as_deref()),
                    or_dash(definition.network_mode.as_deref()),
                    if images.is_empty() { "-".to_string() } else { images },
                    human_age(definition.registered_at),
                ],
                entity: Some(Entity::TaskDefinition(definition)),
            }
        })
        .collect();
    (
        headers(&[
            "Revision", "Status", "CPU", "Memory", "Network", "Images", "Age",
        ]),
        rows,
    )
}

fn instance_rows(instances: Vec<ContainerInstance>) -> (Vec<String>, Vec<RowData>) {
    let rows = instances
        .into_iter()
        .map(|instance| {
            let id = short_arn(&instance.container_instance_arn).to_string();
            RowData {
                name: id.clone(),
                columns: vec![
                    id,
                    or_dash(instance.ec2_instance_id.as_deref()),
                    instance.status.clone(),
                    if instance.agent_connected { "yes" } else { "no" }.to_string(),
                    instance.running_tasks_count.to_string(),
                    instance.pending_tasks_count.to_string(),
                    human_age(instance.registered_at),
                ],
                entity: Some(Entity::Instance(instance)),
            }
        })
        .collect();
    (
        headers(&[
            "Instance", "EC2", "Status", "Agent", "Running", "Pending", "Age",
        ]),
        rows,
    )
}

fn deployment_rows(service: Service) -> (Vec<String>, Vec<RowData>) {
    let rows = service
        .deployments
        .into_iter()
        .map(|deployment| RowData {
            name: deployment.id.clone(),
            columns: vec![
                deployment.id.clone(),
                deployment.status.clone(),
                or_dash(deployment.rollout_state.as_deref()),
                short_arn(&deployment.task_definition).to_string(),
                format!("{}/{}", deployment.running_count, deployment.desired_count),
                deployment.pending_count.to_string(),
                deployment.failed_tasks.to_string(),
                human_age(deployment.updated_at.or(deployment.created_at)),
            ],
            entity: Some(Entity::Deployment(deployment)),
        })
        .collect();
    (
        headers(&[
            "ID", "Status", "Rollout", "Task Def", "Running", "Pending", "Failed", "Updated",
        ]),
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::{
        EcsGateway, cluster_rows, container_rows, diff_lines, field_as, log_events, log_targets,
        metric_points, registration_document, task_definition_rows,
    };
    use crate::app::LogSource;
    use crate::model::{Cluster, Entity, Task, TaskDefinition};
    use serde_json::json;

    #[test]
    fn json_calls_carry_output_flags_and_die_with_their_future() {
        let gateway = EcsGateway::new(Some("prod".to_string()), None);
        let command = gateway.json_command(&["ecs".to_string(), "list-clusters".to_string()]);
        assert!(command.get_kill_on_drop());

        let args = command
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(
            args,
            [
                "--profile",
                "prod",
                "ecs",
                "list-clusters",
                "--output",
                "json",
                "--no-cli-pager"
            ]
        );
    }

    fn web_definition() -> TaskDefinition {
        serde_json::from_value(json!({
            "taskDefinitionArn": "arn:aws:ecs:eu-west-1:1:task-definition/web:7",
            "family": "web",
            "revision": 7,
            "status": "ACTIVE",
            "registeredAt": "2024-03-01T10:15:30+00:00",
            "registeredBy": "arn:aws:iam::1:user/dev",
            "requiresAttributes": [{"name": "ecs.capability.execution-role-awslogs"}],
            "compatibilities": ["EC2", "FARGATE"],
            "executionRoleArn": "arn:aws:iam::1:role/exec",
            "containerDefinitions": [
                {
                    "name": "app",
                    "image": "repo/app:1",
                    "logConfiguration": {
                        "logDriver": "awslogs",
                        "options": {
                            "awslogs-group": "/ecs/web",
                            "awslogs-stream-prefix": "ecs",
                            "awslogs-region": "eu-west-1"
                        }
                    }
                },
                {
                    "name": "sidecar",
                    "image": "repo/envoy:1",
                    "logConfiguration": {"logDriver": "json-file", "options": {}}
                }
            ]
        }))
        .expect("task definition")
    }

    #[test]
    fn registration_document_strips_read_only_fields() {
        let document = registration_document(&web_definition()).expect("document");
        for field in [
            "taskDefinitionArn",
            "revision",
            "status",
            "registeredAt",
            "registeredBy",
            "requiresAttributes",
            "compatibilities",
        ] {
            assert!(document.get(field).is_none(), "{field} survived");
        }
        assert_eq!(document["family"], json!("web"));
        assert_eq!(document["executionRoleArn"], json!("arn:aws:iam::1:role/exec"));
        assert!(document.get("cpu").is_none());
    }

    #[test]
    fn log_targets_use_exact_stream_when_task_is_known() {
        let source = LogSource {
            task_definition: "web:7".to_string(),
            container: None,
            task_id: Some("abc123".to_string()),
        };
        let targets = log_targets(&web_definition(), &source);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].group, "/ecs/web");
        assert_eq!(targets[0].stream, "ecs/app/abc123");
        assert!(targets[0].exact);
        assert_eq!(targets[0].region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn log_targets_for_a_service_use_a_prefix() {
        let source = LogSource {
            task_definition: "web:7".to_string(),
            container: None,
            task_id: None,
        };
        let targets = log_targets(&web_definition(), &source);
        assert_eq!(targets[0].stream, "ecs/app");
        assert!(!targets[0].exact);

        let sidecar_only = LogSource {
            container: Some("sidecar".to_string()),
            ..source
        };
        assert!(log_targets(&web_definition(), &sidecar_only).is_empty());
    }

    #[test]
    fn log_events_are_tagged_with_their_container() {
        let response = json!({"events": [
            {"timestamp": 1709288130000i64, "message": "listening on :8080\n"},
            {"message": "no timestamp"}
        ]});
        let events = log_events("app", &response);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, 1_709_288_130_000);
        assert!(events[0].1.ends_with("[app] listening on :8080"));
    }

    #[test]
    fn metric_points_are_sorted_by_time() {
        let response = json!({"Datapoints": [
            {"Timestamp": "2024-03-01T10:10:00Z", "Average": 20.5, "Maximum": 40.0},
            {"Timestamp": "2024-03-01T10:05:00Z", "Average": 10.0, "Maximum": 15.0}
        ]});
        let points = metric_points(&response);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].average, 10.0);
        assert_eq!(points[1].maximum, 40.0);
    }

    #[test]
    fn missing_list_field_reads_as_empty() {
        let arns: Vec<String> = field_as(&json!({}), "clusterArns").expect("arns");
        assert!(arns.is_empty());
        let clusters: Vec<Cluster> = field_as(
            &json!({"clusters": [{"clusterArn": "arn:c/prod", "clusterName": "prod"}]}),
            "clusters",
        )
        .expect("clusters");
        assert_eq!(clusters[0].cluster_name, "prod");
    }

    #[test]
    fn cluster_rows_attach_cluster_entities() {
        let (headers, rows) = cluster_rows(vec![Cluster {
            cluster_arn: "arn:c/prod".to_string(),
            cluster_name: "prod".to_string(),
            status: "ACTIVE".to_string(),
            active_services_count: 3,
            ..Cluster::default()
        }]);
        assert_eq!(headers.len(), rows[0].columns.len());
        assert_eq!(rows[0].columns[2], "3");
        assert!(matches!(&rows[0].entity, Some(Entity::Cluster(cluster)) if cluster.cluster_name == "prod"));
    }

    #[test]
    fn container_rows_inherit_the_task_arn() {
        let task: Task = serde_json::from_value(json!({
            "taskArn": "arn:aws:ecs:r:1:task/prod/abc",
            "containers": [{"containerArn": "arn:container/1", "name": "app", "lastStatus": "RUNNING", "exitCode": 0}]
        }))
        .expect("task");
        let (_, rows) = container_rows(task);
        let Some(Entity::Container(container)) = &rows[0].entity else {
            panic!("expected container entity");
        };
        assert_eq!(container.task_arn, "arn:aws:ecs:r:1:task/prod/abc");
        assert_eq!(rows[0].columns[4], "0");
    }

    #[test]
    fn task_definition_rows_list_images() {
        let (_, rows) = task_definition_rows(vec![web_definition()]);
        assert_eq!(rows[0].name, "web:7");
        assert_eq!(rows[0].columns[5], "repo/app:1, repo/envoy:1");
    }

    #[test]
    fn diff_marks_changed_lines() {
        let diff = diff_lines("a\nb\nc", "a\nx\nc");
        assert_eq!(diff, vec!["  a", "- b", "+ x", "  c"]);
        assert!(diff_lines("same", "same").iter().all(|line| line.starts_with("  ")));
    }
}
