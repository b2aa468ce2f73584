use crate::form::{Form, FormField, FormKind};
use crate::input::Action;
use crate::kind::{KeyHint, PrimaryKind, SecondaryKind, page_key};
use crate::model::{
    Entity, EventsSnapshot, RowData, Selection, TableData, TaskDefinition, container_session_id,
    human_age, short_arn, task_definition_family,
};
use crate::notice::{Notice, NoticeLevel};
use crate::page::{Navigation, Page, PageBody, PageStore};
use crate::session::{Session, SessionRegistry};
use chrono::Local;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Command,
    Filter,
    Form,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub read_only: bool,
    /// Seconds between background reloads; `<= 0` disables them.
    pub refresh_secs: i64,
    pub shell: String,
    pub profile: Option<String>,
    pub region: Option<String>,
    /// Cluster to open right after the cluster list loads.
    pub cluster: Option<String>,
}

impl EngineConfig {
    pub fn refresh_enabled(&self) -> bool {
        self.refresh_secs > 0
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            refresh_secs: 30,
            shell: "/bin/sh".to_string(),
            profile: None,
            region: None,
            cluster: None,
        }
    }
}

/// Provider query needed to build a primary page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    Clusters,
    Services { cluster: String },
    Tasks { cluster: String, service: String },
    Containers { cluster: String, task: String },
    TaskDefinitions { family: String },
    Instances { cluster: String },
    Deployments { cluster: String, service: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    pub task_definition: String,
    pub container: Option<String>,
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayRequest {
    Logs(LogSource),
    Metrics {
        cluster: String,
        service: Option<String>,
        owner: String,
    },
    AutoScaling {
        cluster: String,
        service: String,
    },
    RevisionHistory {
        family: String,
    },
    RevisionDiff {
        task_definition: String,
    },
}

#[derive(Debug, Clone)]
pub enum OverlayContent {
    Table(TableData),
    Text(String),
    Entity(Entity),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    None,
    Load {
        kind: PrimaryKind,
        request: LoadRequest,
    },
    LoadOverlay {
        request: OverlayRequest,
    },
    UpdateService {
        cluster: String,
        service: String,
        desired_count: i64,
        task_definition: Option<String>,
        force_new_deployment: bool,
    },
    StopTask {
        cluster: String,
        task: String,
        reason: String,
    },
    EditTaskDefinition {
        definition: TaskDefinition,
    },
    ExecShell {
        cluster: String,
        task: String,
        container: String,
        shell: String,
    },
    TailLogs {
        source: LogSource,
    },
    StartPortForward {
        cluster: String,
        task: String,
        runtime_id: String,
        container_id: String,
        remote_port: u16,
        local_port: u16,
    },
    TerminateSessions {
        sessions: Vec<Session>,
    },
}

/// Navigation state owned by the engine and written only on the UI task.
#[derive(Debug, Clone)]
pub struct AppState {
    pub primary: PrimaryKind,
    pub secondary: SecondaryKind,
    /// One-shot target for the next back navigation.
    pub back_to: Option<PrimaryKind>,
    pub selection: Selection,
    pub row_index: usize,
    pub task_definition_family: Option<String>,
}

#[derive(Debug, Clone)]
struct PendingLoad {
    kind: PrimaryKind,
    parent: Option<String>,
    reload: bool,
    back_to: Option<PrimaryKind>,
}

#[derive(Debug, Clone)]
struct PendingOverlay {
    secondary: SecondaryKind,
    owner: String,
    title: String,
}

const COMMANDS: [&str; 10] = [
    "clusters",
    "services",
    "tasks",
    "containers",
    "taskdefinitions",
    "instances",
    "deployments",
    "help",
    "refresh",
    "quit",
];

pub struct App {
    running: bool,
    mode: InputMode,
    config: EngineConfig,
    state: AppState,
    pages: PageStore,
    primary_key: Option<String>,
    sessions: SessionRegistry,
    notice: Option<Notice>,
    notice_generation: u64,
    fresh_notice: bool,
    input: String,
    filter: String,
    completion_index: usize,
    full_screen: bool,
    overlay_scroll: u16,
    page_size: usize,
    text_view_height: u16,
    pending_load: Option<PendingLoad>,
    pending_overlay: Option<PendingOverlay>,
    pending_mutation: Option<PrimaryKind>,
    startup_cluster: Option<String>,
}

impl App {
    pub fn new(config: EngineConfig) -> Self {
        let startup_cluster = config.cluster.clone();
        Self {
            running: true,
            mode: InputMode::Normal,
            config,
            state: AppState {
                primary: PrimaryKind::ROOT,
                secondary: SecondaryKind::Empty,
                back_to: None,
                selection: Selection::default(),
                row_index: 0,
                task_definition_family: None,
            },
            pages: PageStore::default(),
            primary_key: None,
            sessions: SessionRegistry::default(),
            notice: None,
            notice_generation: 0,
            fresh_notice: false,
            input: String::new(),
            filter: String::new(),
            completion_index: 0,
            full_screen: false,
            overlay_scroll: 0,
            page_size: 10,
            text_view_height: 20,
            pending_load: None,
            pending_overlay: None,
            pending_mutation: None,
            startup_cluster,
        }
    }

    /// First navigation: the cluster list.
    pub fn start(&mut self) -> AppCommand {
        self.navigate(PrimaryKind::ROOT, true, None)
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn read_only(&self) -> bool {
        self.config.read_only
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn full_screen(&self) -> bool {
        self.full_screen
    }

    pub fn overlay_scroll(&self) -> u16 {
        self.overlay_scroll
    }

    #[cfg(test)]
    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn hints(&self) -> &'static [KeyHint] {
        self.state.primary.hints()
    }

    pub fn set_viewport(&mut self, page_size: usize, text_view_height: u16) {
        self.page_size = page_size.max(1);
        self.text_view_height = text_view_height.max(1);
    }

    pub fn primary_page(&self) -> Option<&Page> {
        self.primary_key
            .as_deref()
            .and_then(|key| self.pages.get(key))
    }

    /// The overlay on screen, if any.
    pub fn overlay_page(&self) -> Option<&Page> {
        if self.state.secondary == SecondaryKind::Empty {
            return None;
        }
        self.pages
            .visible()
            .filter(|page| page.secondary != SecondaryKind::Empty)
    }

    pub fn visible_rows<'a>(&'a self, page: &'a Page) -> Vec<&'a RowData> {
        let Some(table) = page.table() else {
            return Vec::new();
        };
        let filter = if page.secondary == SecondaryKind::Empty {
            self.filter.as_str()
        } else {
            ""
        };
        table
            .rows
            .iter()
            .filter(|row| row.matches_filter(filter))
            .collect()
    }

    pub fn selected_index(&self, page: &Page) -> Option<usize> {
        let table = page.table()?;
        let len = self.visible_rows(page).len();
        if len == 0 {
            None
        } else {
            Some(table.selected.min(len - 1))
        }
    }

    /// Local ports forwarded for a container row, `-` when none.
    pub fn session_cell(&self, row: &RowData) -> String {
        let (Some(Entity::Container(container)), Some(cluster)) =
            (&row.entity, self.state.selection.cluster_name())
        else {
            return "-".to_string();
        };
        let container_id = container_session_id(cluster, container);
        let ports = self
            .sessions
            .for_container(&container_id)
            .iter()
            .map(|session| session.local_port.to_string())
            .collect::<Vec<_>>();
        if ports.is_empty() {
            "-".to_string()
        } else {
            ports.join(",")
        }
    }

    pub fn breadcrumb(&self) -> Vec<String> {
        let selection = &self.state.selection;
        let mut crumbs = Vec::new();
        if self.state.primary == PrimaryKind::Cluster || self.state.primary == PrimaryKind::Help {
            return crumbs;
        }
        if let Some(cluster) = selection.cluster_name() {
            crumbs.push(cluster.to_string());
        }
        match self.state.primary {
            PrimaryKind::Task | PrimaryKind::Deployment => {
                if let Some(service) = &selection.service {
                    crumbs.push(service.service_name.clone());
                }
            }
            PrimaryKind::Container => {
                if let Some(service) = &selection.service {
                    crumbs.push(service.service_name.clone());
                }
                if let Some(task) = &selection.task {
                    crumbs.push(short_arn(&task.task_arn).to_string());
                }
            }
            PrimaryKind::TaskDefinition => {
                if let Some(family) = &self.state.task_definition_family {
                    crumbs.push(family.clone());
                }
            }
            _ => {}
        }
        crumbs
    }

    pub fn completion_candidates(&self) -> Vec<String> {
        if self.mode != InputMode::Command {
            return Vec::new();
        }
        let query = self.input.trim().to_ascii_lowercase();
        COMMANDS
            .iter()
            .filter(|command| command.starts_with(&query))
            .map(|command| command.to_string())
            .collect()
    }

    pub fn completion_index(&self) -> usize {
        self.completion_index
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        match self.mode {
            InputMode::Form => return self.apply_form_action(action),
            InputMode::Command | InputMode::Filter => return self.apply_input_action(action),
            InputMode::Normal => {}
        }

        match action {
            Action::Quit => {
                self.running = false;
                AppCommand::None
            }
            Action::Down => {
                self.move_selection(1);
                AppCommand::None
            }
            Action::Up => {
                self.move_selection(-1);
                AppCommand::None
            }
            Action::PageDown => {
                self.move_selection(self.page_step());
                AppCommand::None
            }
            Action::PageUp => {
                self.move_selection(-self.page_step());
                AppCommand::None
            }
            Action::Top => {
                self.move_selection(isize::MIN / 2);
                AppCommand::None
            }
            Action::Bottom => {
                self.move_selection(isize::MAX / 2);
                AppCommand::None
            }
            Action::Enter => self.enter_selected(),
            Action::Back => self.go_back(),
            Action::ShowHelp => {
                if self.state.primary == PrimaryKind::Help {
                    self.go_back()
                } else {
                    self.show_help_page()
                }
            }
            Action::Refresh => {
                if self.state.secondary != SecondaryKind::Empty {
                    self.close_overlay();
                }
                self.reload_current()
            }
            Action::StartCommand => {
                self.mode = InputMode::Command;
                self.input.clear();
                self.completion_index = 0;
                AppCommand::None
            }
            Action::StartFilter => {
                if self.state.secondary != SecondaryKind::Empty {
                    self.notify(NoticeLevel::Info, "Close the current view to filter rows");
                    return AppCommand::None;
                }
                self.mode = InputMode::Filter;
                self.input = self.filter.clone();
                AppCommand::None
            }
            Action::ShowDescription => self.open_overlay(SecondaryKind::Description),
            Action::ShowEvents => self.open_overlay(SecondaryKind::EventList),
            Action::ShowLogs => self.open_overlay(SecondaryKind::LogList),
            Action::ShowAutoScaling => self.open_overlay(SecondaryKind::AutoScaling),
            Action::ShowRevisions => self.open_overlay(SecondaryKind::Revision),
            Action::ShowMetrics => self.open_metrics(),
            Action::ToggleFullScreen => {
                if self.state.secondary == SecondaryKind::Empty {
                    self.notify(NoticeLevel::Info, "Nothing to expand");
                } else {
                    self.full_screen = !self.full_screen;
                }
                AppCommand::None
            }
            Action::OpenShell => self.prepare_shell(),
            Action::TailLogs => self.prepare_tail_logs(),
            Action::OpenTaskDefinition => self.open_task_definitions(),
            Action::OpenDeployments => self.open_deployments(),
            Action::OpenInstances => self.open_instances(),
            Action::UpdateService => self.open_update_service_form(),
            Action::StopTask => self.open_stop_task_form(),
            Action::PortForward => self.open_port_forward_form(),
            Action::TerminateSessions => self.open_terminate_sessions_form(),
            Action::EditTaskDefinition => self.prepare_task_definition_edit(),
            Action::SubmitInput
            | Action::CompleteInput
            | Action::CancelInput
            | Action::Backspace
            | Action::InputChar(_)
            | Action::NextField
            | Action::PrevField
            | Action::CycleLeft
            | Action::CycleRight => AppCommand::None,
        }
    }

    /// Periodic reload. Skipped while an overlay, form or prompt is active.
    pub fn on_refresh_tick(&mut self) -> AppCommand {
        if self.state.secondary != SecondaryKind::Empty
            || self.mode != InputMode::Normal
            || self.pending_load.is_some()
            || self.state.primary == PrimaryKind::Help
        {
            debug!(
                primary = ?self.state.primary,
                secondary = ?self.state.secondary,
                "refresh tick skipped"
            );
            return AppCommand::None;
        }
        self.reload_current()
    }

    /// Receives the provider result for the last `AppCommand::Load`.
    pub fn install_page(&mut self, result: Result<TableData, String>) -> AppCommand {
        let Some(pending) = self.pending_load.take() else {
            warn!("page data arrived without a pending navigation");
            return AppCommand::None;
        };
        let kind = pending.kind;

        let mut table = match result {
            Ok(table) => table,
            Err(error) => {
                let line = summarize_error_line(&error);
                self.notify(
                    NoticeLevel::Error,
                    format!("Loading {} failed: {line}", kind.title()),
                );
                if kind.is_root() && self.primary_key.is_none() {
                    self.install_error_page(&pending, line);
                } else {
                    self.fall_back(&pending);
                }
                return AppCommand::None;
            }
        };

        if table.rows.is_empty() {
            if !kind.is_root() {
                self.notify(NoticeLevel::Warn, self.empty_result_message(kind));
                self.fall_back(&pending);
                return AppCommand::None;
            }
            self.notify(NoticeLevel::Warn, "No clusters found");
        }

        let key = page_key(kind, pending.parent.as_deref(), None);
        let reloading_current = pending.reload && self.primary_key.as_deref() == Some(key.as_str());
        table.selected = if reloading_current {
            self.state.row_index
        } else {
            self.filter.clear();
            self.pages
                .get(&key)
                .and_then(Page::table)
                .map(|existing| existing.selected)
                .unwrap_or(0)
        };

        let page = Page {
            kind,
            secondary: SecondaryKind::Empty,
            parent: pending.parent.clone(),
            title: self.page_title(kind),
            header: self.header_for(kind),
            body: PageBody::Table(table),
            built_at: Local::now(),
        };
        self.pages.add_page(key.clone(), page);
        self.commit_primary(kind, key, pending.reload, pending.back_to);

        if kind.is_root()
            && !self.visible_is_empty()
            && let Some(name) = self.startup_cluster.take()
        {
            return self.open_startup_cluster(&name);
        }
        AppCommand::None
    }

    /// Receives the provider result for the last `AppCommand::LoadOverlay`.
    pub fn install_overlay(&mut self, result: Result<OverlayContent, String>) {
        let Some(pending) = self.pending_overlay.take() else {
            warn!("overlay data arrived without a pending request");
            return;
        };

        let content = match result {
            Ok(content) => content,
            Err(error) => {
                self.notify(
                    NoticeLevel::Error,
                    format!(
                        "Loading {} failed: {}",
                        pending.title,
                        summarize_error_line(&error)
                    ),
                );
                return;
            }
        };

        let (owner, body) = match content {
            OverlayContent::Entity(entity) => (
                entity.entity_name().to_string(),
                PageBody::Text(entity.to_pretty_json()),
            ),
            OverlayContent::Text(text) => (pending.owner, PageBody::Text(text)),
            OverlayContent::Table(table) => {
                if table.rows.is_empty() {
                    self.notify(
                        NoticeLevel::Warn,
                        format!("No {} to show", pending.secondary.title()),
                    );
                    return;
                }
                (pending.owner, PageBody::Table(table))
            }
        };
        self.show_overlay(pending.secondary, &owner, pending.title, body);
    }

    /// Outcome of a side effect started from a form or editor. Success forces one
    /// reload of the page that owned it.
    pub fn complete_mutation(&mut self, result: Result<String, String>) -> AppCommand {
        let owner = self.pending_mutation.take();
        match result {
            Ok(message) => {
                self.notify(NoticeLevel::Success, message);
                match owner {
                    Some(kind) if kind == self.state.primary => self.reload_current(),
                    _ => AppCommand::None,
                }
            }
            Err(error) => {
                self.notify(NoticeLevel::Error, summarize_error_line(&error));
                AppCommand::None
            }
        }
    }

    /// A side effect that ended without changing anything; no reload follows.
    pub fn cancel_mutation(&mut self, message: &str) {
        self.pending_mutation = None;
        self.notify(NoticeLevel::Info, message);
    }

    /// Outcome of an interactive sub-session (shell, log tail).
    pub fn finish_interactive(&mut self, label: &str, result: Result<(), String>) {
        match result {
            Ok(()) => self.notify(NoticeLevel::Info, format!("{label} closed")),
            Err(error) => self.notify(
                NoticeLevel::Error,
                format!("{label} failed: {}", summarize_error_line(&error)),
            ),
        }
    }

    pub fn register_session(&mut self, session: Session) {
        self.sessions.register(session);
    }

    pub fn session_exited(&mut self, pid: u32, detail: &str) {
        if let Some(session) = self.sessions.remove_by_pid(pid) {
            self.notify(
                NoticeLevel::Warn,
                format!(
                    "Port forward {} -> {} ended ({detail})",
                    session.local_port, session.remote_port
                ),
            );
        }
    }

    pub fn take_all_sessions(&mut self) -> Vec<Session> {
        self.sessions.terminate_all()
    }

    pub fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let text = normalize_status_text(text.into());
        match level {
            NoticeLevel::Warn | NoticeLevel::Error => warn!(?level, "{text}"),
            NoticeLevel::Info | NoticeLevel::Success => info!(?level, "{text}"),
        }
        self.notice_generation += 1;
        self.notice = Some(Notice {
            level,
            text,
            generation: self.notice_generation,
        });
        self.fresh_notice = true;
    }

    /// Generation of a notice posted since the last call, for timer scheduling.
    pub fn take_fresh_notice(&mut self) -> Option<u64> {
        if !self.fresh_notice {
            return None;
        }
        self.fresh_notice = false;
        self.notice.as_ref().map(|notice| notice.generation)
    }

    pub fn expire_notice(&mut self, generation: u64, forced: bool) {
        if let Some(notice) = &self.notice
            && notice.generation == generation
            && (forced || notice.level.auto_clears())
        {
            self.notice = None;
        }
    }

    fn navigate(
        &mut self,
        kind: PrimaryKind,
        reload: bool,
        back_to: Option<PrimaryKind>,
    ) -> AppCommand {
        if kind == PrimaryKind::Help {
            return self.show_help_page();
        }

        let request = match self.load_request(kind) {
            Ok(request) => request,
            Err(message) => {
                self.notify(NoticeLevel::Warn, message);
                return AppCommand::None;
            }
        };
        let parent = self.parent_of(kind);

        match self.pages.resolve_navigation(
            kind,
            parent.as_deref(),
            reload,
            self.config.refresh_enabled(),
        ) {
            Navigation::Reuse => {
                let key = page_key(kind, parent.as_deref(), None);
                if self.pages.switch_to(&key) {
                    self.commit_primary(kind, key, false, back_to);
                }
                AppCommand::None
            }
            Navigation::Rebuild => {
                debug!(?kind, ?parent, reload, "page rebuild requested");
                self.pending_load = Some(PendingLoad {
                    kind,
                    parent,
                    reload,
                    back_to,
                });
                AppCommand::Load { kind, request }
            }
        }
    }

    fn reload_current(&mut self) -> AppCommand {
        if self.state.primary == PrimaryKind::Help {
            return AppCommand::None;
        }
        if let Some(index) = self.primary_page().and_then(|page| self.selected_index(page)) {
            self.state.row_index = index;
        }
        self.navigate(self.state.primary, true, None)
    }

    fn commit_primary(
        &mut self,
        kind: PrimaryKind,
        key: String,
        reload: bool,
        back_to: Option<PrimaryKind>,
    ) {
        self.state.primary = kind;
        self.state.secondary = SecondaryKind::Empty;
        if !reload {
            self.state.back_to = back_to;
        }
        self.full_screen = false;
        self.overlay_scroll = 0;
        self.primary_key = Some(key);
        self.clamp_selection();
        self.track_selection();
    }

    /// Nothing to fall back to: keep the failure on screen until a reload.
    fn install_error_page(&mut self, pending: &PendingLoad, error: String) {
        let mut table = TableData::default();
        table.set_error(error, Local::now());
        let key = page_key(pending.kind, pending.parent.as_deref(), None);
        let page = Page {
            kind: pending.kind,
            secondary: SecondaryKind::Empty,
            parent: pending.parent.clone(),
            title: self.page_title(pending.kind),
            header: Vec::new(),
            body: PageBody::Table(table),
            built_at: Local::now(),
        };
        self.pages.add_page(key.clone(), page);
        self.commit_primary(pending.kind, key, pending.reload, pending.back_to);
    }

    fn fall_back(&mut self, pending: &PendingLoad) {
        if !(pending.reload && pending.kind == self.state.primary) {
            return;
        }
        let target = self
            .state
            .back_to
            .take()
            .unwrap_or_else(|| pending.kind.previous());
        if target == pending.kind {
            return;
        }
        let parent = self.parent_of(target);
        let key = page_key(target, parent.as_deref(), None);
        if self.pages.switch_to(&key) {
            self.commit_primary(target, key, false, None);
        }
    }

    fn go_back(&mut self) -> AppCommand {
        if self.state.secondary != SecondaryKind::Empty {
            self.close_overlay();
            return AppCommand::None;
        }
        if !self.filter.is_empty() {
            self.filter.clear();
            self.clamp_selection();
            self.track_selection();
            return AppCommand::None;
        }

        // The override is cleared by the commit of the target page, so a failed
        // back navigation keeps it for the next attempt.
        let current = self.state.primary;
        let target = self.state.back_to.unwrap_or_else(|| current.previous());
        if target == current {
            debug!(?current, "back requested at the root");
            return AppCommand::None;
        }
        self.navigate(target, false, None)
    }

    fn enter_selected(&mut self) -> AppCommand {
        if self.state.secondary != SecondaryKind::Empty {
            return AppCommand::None;
        }
        let kind = self.state.primary;
        if kind == PrimaryKind::Help {
            return AppCommand::None;
        }
        if self.selected_entity().is_none() {
            self.notify(NoticeLevel::Warn, format!("No {} selected", kind.title()));
            return AppCommand::None;
        }
        if kind.has_children() {
            self.navigate(kind.next(), false, None)
        } else {
            self.open_overlay(SecondaryKind::Description)
        }
    }

    fn open_task_definitions(&mut self) -> AppCommand {
        let selection = &self.state.selection;
        let reference = match self.state.primary {
            PrimaryKind::Service => selection
                .service
                .as_ref()
                .map(|service| service.task_definition.clone()),
            PrimaryKind::Task => selection
                .task
                .as_ref()
                .map(|task| task.task_definition_arn.clone()),
            _ => {
                self.notify(
                    NoticeLevel::Info,
                    "Task definitions open from a service or a task",
                );
                return AppCommand::None;
            }
        };
        let Some(reference) = reference.filter(|value| !value.is_empty()) else {
            self.notify(NoticeLevel::Warn, "Selected resource has no task definition");
            return AppCommand::None;
        };
        self.state.task_definition_family = Some(task_definition_family(&reference).to_string());
        let origin = self.state.primary;
        self.navigate(PrimaryKind::TaskDefinition, false, Some(origin))
    }

    fn open_deployments(&mut self) -> AppCommand {
        if self.state.primary != PrimaryKind::Service {
            self.notify(NoticeLevel::Info, "Deployments open from a service");
            return AppCommand::None;
        }
        self.navigate(PrimaryKind::Deployment, false, Some(PrimaryKind::Service))
    }

    fn open_instances(&mut self) -> AppCommand {
        if self.state.primary != PrimaryKind::Cluster {
            self.notify(NoticeLevel::Info, "Container instances open from a cluster");
            return AppCommand::None;
        }
        self.navigate(PrimaryKind::Instance, false, Some(PrimaryKind::Cluster))
    }

    fn open_startup_cluster(&mut self, name: &str) -> AppCommand {
        let index = self.primary_page().and_then(|page| {
            self.visible_rows(page).iter().position(|row| {
                matches!(
                    &row.entity,
                    Some(Entity::Cluster(cluster))
                        if cluster.cluster_name == name || cluster.cluster_arn == name
                )
            })
        });
        let Some(index) = index else {
            self.notify(NoticeLevel::Warn, format!("Cluster '{name}' not found"));
            return AppCommand::None;
        };
        self.select_index(index);
        self.navigate(PrimaryKind::Service, false, None)
    }

    fn show_help_page(&mut self) -> AppCommand {
        let origin = self.state.primary;
        if self.state.secondary != SecondaryKind::Empty {
            self.close_overlay();
        }

        let mut rows = origin
            .hints()
            .iter()
            .map(|hint| help_row(hint.key, hint.label, origin.title()))
            .collect::<Vec<_>>();
        for (key, label) in GLOBAL_HINTS {
            rows.push(help_row(key, label, "global"));
        }
        let mut table = TableData::default();
        table.set_rows(
            vec!["Key".to_string(), "Action".to_string(), "Scope".to_string()],
            rows,
            Local::now(),
        );

        let key = page_key(PrimaryKind::Help, None, None);
        let page = Page {
            kind: PrimaryKind::Help,
            secondary: SecondaryKind::Empty,
            parent: None,
            title: format!("help · {}", origin.title()),
            header: vec![("Keys for".to_string(), origin.title().to_string())],
            body: PageBody::Table(table),
            built_at: Local::now(),
        };
        self.pages.add_page(key.clone(), page);
        let back_to = if origin == PrimaryKind::Help {
            self.state.back_to
        } else {
            Some(origin)
        };
        self.filter.clear();
        self.commit_primary(PrimaryKind::Help, key, false, back_to);
        AppCommand::None
    }

    fn open_overlay(&mut self, secondary: SecondaryKind) -> AppCommand {
        let kind = self.state.primary;
        if !kind.supports(secondary) {
            self.notify(
                NoticeLevel::Warn,
                format!("{} are not available for {}", secondary.title(), kind.title()),
            );
            return AppCommand::None;
        }
        if self.state.secondary != SecondaryKind::Empty {
            self.close_overlay();
        }
        let Some(entity) = self.selected_entity().cloned() else {
            self.notify(NoticeLevel::Warn, format!("No {} selected", kind.title()));
            return AppCommand::None;
        };
        let name = display_name(&entity);

        match secondary {
            SecondaryKind::Description => {
                self.show_overlay(
                    secondary,
                    entity.entity_name(),
                    format!("{name} description"),
                    PageBody::Text(entity.to_pretty_json()),
                );
                AppCommand::None
            }
            SecondaryKind::EventList => {
                let Entity::Service(service) = &entity else {
                    return AppCommand::None;
                };
                let snapshot = EventsSnapshot {
                    service_arn: service.service_arn.clone(),
                    events: service.events.clone(),
                };
                if snapshot.events.is_empty() {
                    self.notify(NoticeLevel::Info, format!("No events for {name}"));
                    return AppCommand::None;
                }
                let table = events_table(&snapshot);
                let owner = Entity::Events(snapshot);
                self.show_overlay(
                    secondary,
                    owner.entity_name(),
                    format!("{name} events"),
                    PageBody::Table(table),
                );
                AppCommand::None
            }
            SecondaryKind::LogList => {
                let Some(source) = self.log_source() else {
                    self.notify(NoticeLevel::Warn, "No task definition to read log settings from");
                    return AppCommand::None;
                };
                self.request_overlay(
                    secondary,
                    &entity,
                    format!("{name} logs"),
                    OverlayRequest::Logs(source),
                )
            }
            SecondaryKind::AutoScaling => {
                let Entity::Service(service) = &entity else {
                    return AppCommand::None;
                };
                let Some(cluster) = self.state.selection.cluster_name() else {
                    return AppCommand::None;
                };
                let request = OverlayRequest::AutoScaling {
                    cluster: cluster.to_string(),
                    service: service.service_name.clone(),
                };
                self.request_overlay(secondary, &entity, format!("{name} autoscaling"), request)
            }
            SecondaryKind::Revision => {
                let request = match &entity {
                    Entity::Service(service) => OverlayRequest::RevisionHistory {
                        family: task_definition_family(&service.task_definition).to_string(),
                    },
                    Entity::TaskDefinition(definition) => OverlayRequest::RevisionDiff {
                        task_definition: definition.task_definition_arn.clone(),
                    },
                    _ => return AppCommand::None,
                };
                self.request_overlay(secondary, &entity, format!("{name} revisions"), request)
            }
            SecondaryKind::Modal | SecondaryKind::Empty => AppCommand::None,
        }
    }

    fn open_metrics(&mut self) -> AppCommand {
        let kind = self.state.primary;
        if !matches!(kind, PrimaryKind::Cluster | PrimaryKind::Service) {
            self.notify(
                NoticeLevel::Warn,
                format!("metrics are not available for {}", kind.title()),
            );
            return AppCommand::None;
        }
        if self.state.secondary != SecondaryKind::Empty {
            self.close_overlay();
        }
        let Some(entity) = self.selected_entity().cloned() else {
            self.notify(NoticeLevel::Warn, format!("No {} selected", kind.title()));
            return AppCommand::None;
        };
        let Some(cluster) = self.state.selection.cluster_name().map(str::to_string) else {
            return AppCommand::None;
        };
        let service = match &entity {
            Entity::Service(service) => Some(service.service_name.clone()),
            _ => None,
        };
        let request = OverlayRequest::Metrics {
            cluster,
            service,
            owner: format!("{}#metrics", entity.entity_name()),
        };
        let title = format!("{} metrics", display_name(&entity));
        self.request_overlay(SecondaryKind::Description, &entity, title, request)
    }

    fn request_overlay(
        &mut self,
        secondary: SecondaryKind,
        owner: &Entity,
        title: String,
        request: OverlayRequest,
    ) -> AppCommand {
        self.pending_overlay = Some(PendingOverlay {
            secondary,
            owner: owner.entity_name().to_string(),
            title,
        });
        AppCommand::LoadOverlay { request }
    }

    fn show_overlay(&mut self, secondary: SecondaryKind, owner: &str, title: String, body: PageBody) {
        let kind = self.state.primary;
        let parent = self.primary_page().and_then(|page| page.parent.clone());
        let key = page_key(kind, parent.as_deref(), Some((owner, secondary)));
        let page = Page {
            kind,
            secondary,
            parent,
            title,
            header: self.header_for(kind),
            body,
            built_at: Local::now(),
        };
        self.pages.add_page(key, page);
        self.state.secondary = secondary;
        self.overlay_scroll = 0;
    }

    fn close_overlay(&mut self) {
        self.state.secondary = SecondaryKind::Empty;
        self.full_screen = false;
        self.overlay_scroll = 0;
        if self.mode == InputMode::Form {
            self.mode = InputMode::Normal;
        }
        if let Some(key) = self.primary_key.clone() {
            self.pages.switch_to(&key);
        }
    }

    fn open_form(&mut self, form: Form) -> AppCommand {
        if self.state.secondary != SecondaryKind::Empty {
            self.close_overlay();
        }
        let Some(owner) = self
            .selected_entity()
            .map(|entity| entity.entity_name().to_string())
        else {
            self.notify(NoticeLevel::Warn, "Nothing selected");
            return AppCommand::None;
        };
        let title = form.kind.title().to_string();
        self.show_overlay(SecondaryKind::Modal, &owner, title, PageBody::Form(form));
        self.mode = InputMode::Form;
        AppCommand::None
    }

    fn open_update_service_form(&mut self) -> AppCommand {
        if !self.require_writable("Updating services") {
            return AppCommand::None;
        }
        if self.state.primary != PrimaryKind::Service {
            self.notify(NoticeLevel::Info, "Services are updated from the services view");
            return AppCommand::None;
        }
        let Some(Entity::Service(service)) = self.selected_entity().cloned() else {
            self.notify(NoticeLevel::Warn, "No service selected");
            return AppCommand::None;
        };
        let form = Form::new(
            FormKind::UpdateService,
            vec![
                FormField::note("Service", service.service_name.clone()),
                FormField::number("Desired count", service.desired_count.to_string()),
                FormField::text("Task definition", short_arn(&service.task_definition)),
                FormField::choice(
                    "Force new deployment",
                    vec!["no".to_string(), "yes".to_string()],
                    0,
                ),
            ],
        );
        self.open_form(form)
    }

    fn open_stop_task_form(&mut self) -> AppCommand {
        if !self.require_writable("Stopping tasks") {
            return AppCommand::None;
        }
        if self.state.primary != PrimaryKind::Task {
            self.notify(NoticeLevel::Info, "Tasks are stopped from the tasks view");
            return AppCommand::None;
        }
        let Some(Entity::Task(task)) = self.selected_entity().cloned() else {
            self.notify(NoticeLevel::Warn, "No task selected");
            return AppCommand::None;
        };
        let form = Form::new(
            FormKind::StopTask,
            vec![
                FormField::note("Task", short_arn(&task.task_arn)),
                FormField::note("Status", task.last_status.clone()),
                FormField::text("Reason", "Stopped from ecsnav"),
            ],
        );
        self.open_form(form)
    }

    fn open_port_forward_form(&mut self) -> AppCommand {
        if self.state.primary != PrimaryKind::Container {
            self.notify(NoticeLevel::Info, "Port forwards open from the containers view");
            return AppCommand::None;
        }
        let Some(Entity::Container(container)) = self.selected_entity().cloned() else {
            self.notify(NoticeLevel::Warn, "No container selected");
            return AppCommand::None;
        };
        let exec_enabled = self
            .state
            .selection
            .task
            .as_ref()
            .is_some_and(|task| task.enable_execute_command);
        if !exec_enabled {
            self.notify(
                NoticeLevel::Warn,
                "Port forwarding needs ECS Exec enabled on the task",
            );
            return AppCommand::None;
        }
        let remote_port = container
            .extra
            .get("networkBindings")
            .and_then(|bindings| bindings.get(0))
            .and_then(|binding| binding.get("containerPort"))
            .and_then(|port| port.as_u64())
            .map(|port| port.to_string())
            .unwrap_or_default();
        let form = Form::new(
            FormKind::PortForward,
            vec![
                FormField::note("Container", container.name.clone()),
                FormField::number("Container port", remote_port),
                FormField::number("Local port", ""),
            ],
        );
        self.open_form(form)
    }

    fn open_terminate_sessions_form(&mut self) -> AppCommand {
        if self.state.primary != PrimaryKind::Container {
            self.notify(NoticeLevel::Info, "Port forwards are listed in the containers view");
            return AppCommand::None;
        }
        let Some(container_id) = self.state.selection.container_id() else {
            self.notify(NoticeLevel::Warn, "No container selected");
            return AppCommand::None;
        };
        let mut fields = self
            .sessions
            .for_container(&container_id)
            .iter()
            .map(|session| {
                FormField::note(
                    &format!("{} -> {}", session.local_port, session.remote_port),
                    session.id.clone(),
                )
            })
            .collect::<Vec<_>>();
        if fields.is_empty() {
            self.notify(
                NoticeLevel::Info,
                format!("No port forwards for {container_id}"),
            );
            return AppCommand::None;
        }
        fields.insert(0, FormField::note("Container", container_id));
        self.open_form(Form::new(FormKind::TerminateSessions, fields))
    }

    fn apply_form_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::CancelInput => {
                self.close_overlay();
                self.notify(NoticeLevel::Info, "Cancelled");
                AppCommand::None
            }
            Action::SubmitInput => self.submit_form(),
            Action::NextField => self.with_form(Form::focus_next),
            Action::PrevField => self.with_form(Form::focus_previous),
            Action::CycleLeft => self.with_form(|form| form.cycle(-1)),
            Action::CycleRight => self.with_form(|form| form.cycle(1)),
            Action::Backspace => self.with_form(Form::backspace),
            Action::InputChar(ch) => self.with_form(|form| form.insert_char(ch)),
            _ => AppCommand::None,
        }
    }

    fn with_form(&mut self, edit: impl FnOnce(&mut Form)) -> AppCommand {
        let key = self.pages.visible_key().map(str::to_string);
        if let Some(form) = key
            .as_deref()
            .and_then(|key| self.pages.get_mut(key))
            .and_then(Page::form_mut)
        {
            edit(form);
        }
        AppCommand::None
    }

    fn submit_form(&mut self) -> AppCommand {
        let Some(form) = self.pages.visible().and_then(Page::form).cloned() else {
            self.mode = InputMode::Normal;
            return AppCommand::None;
        };
        let command = match self.form_command(&form) {
            Ok(command) => command,
            Err(message) => {
                self.notify(NoticeLevel::Warn, message);
                return AppCommand::None;
            }
        };
        self.close_overlay();
        self.pending_mutation = Some(self.state.primary);
        command
    }

    fn form_command(&mut self, form: &Form) -> Result<AppCommand, String> {
        let selection = &self.state.selection;
        let cluster = selection
            .cluster
            .as_ref()
            .map(|cluster| cluster.cluster_arn.clone())
            .ok_or_else(|| "No cluster selected".to_string())?;

        match form.kind {
            FormKind::UpdateService => {
                let service = selection
                    .service
                    .as_ref()
                    .ok_or_else(|| "No service selected".to_string())?;
                let desired_count = form.number("Desired count")?;
                if desired_count < 0 {
                    return Err("Desired count cannot be negative".to_string());
                }
                let task_definition = form
                    .text("Task definition")
                    .filter(|value| !value.is_empty())
                    .filter(|value| *value != short_arn(&service.task_definition))
                    .map(str::to_string);
                Ok(AppCommand::UpdateService {
                    cluster,
                    service: service.service_arn.clone(),
                    desired_count,
                    task_definition,
                    force_new_deployment: form.choice("Force new deployment") == Some("yes"),
                })
            }
            FormKind::StopTask => {
                let task = selection
                    .task
                    .as_ref()
                    .ok_or_else(|| "No task selected".to_string())?;
                Ok(AppCommand::StopTask {
                    cluster,
                    task: task.task_arn.clone(),
                    reason: form.text("Reason").unwrap_or_default().to_string(),
                })
            }
            FormKind::PortForward => {
                let task = selection
                    .task
                    .as_ref()
                    .ok_or_else(|| "No task selected".to_string())?;
                let container = selection
                    .container
                    .as_ref()
                    .ok_or_else(|| "No container selected".to_string())?;
                let container_id = selection
                    .container_id()
                    .ok_or_else(|| "No container selected".to_string())?;
                let runtime_id = container
                    .runtime_id
                    .clone()
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| "Container has no runtime id yet".to_string())?;
                let remote_port = parse_port(form.number("Container port")?)?;
                let local_port = parse_port(form.number("Local port")?)?;
                if self.sessions.is_local_port_taken(local_port) {
                    return Err(format!("Local port {local_port} is already forwarded"));
                }
                Ok(AppCommand::StartPortForward {
                    cluster: selection.cluster_name().unwrap_or_default().to_string(),
                    task: short_arn(&task.task_arn).to_string(),
                    runtime_id,
                    container_id,
                    remote_port,
                    local_port,
                })
            }
            FormKind::TerminateSessions => {
                let container_id = selection
                    .container_id()
                    .ok_or_else(|| "No container selected".to_string())?;
                let sessions = self.sessions.terminate_by_container(&container_id);
                Ok(AppCommand::TerminateSessions { sessions })
            }
        }
    }

    fn prepare_shell(&mut self) -> AppCommand {
        if !self.require_writable("Interactive shells") {
            return AppCommand::None;
        }
        if self.state.primary != PrimaryKind::Container {
            self.notify(NoticeLevel::Info, "Shells open from the containers view");
            return AppCommand::None;
        }
        let selection = &self.state.selection;
        let (Some(cluster), Some(task), Some(container)) =
            (&selection.cluster, &selection.task, &selection.container)
        else {
            self.notify(NoticeLevel::Warn, "No container selected");
            return AppCommand::None;
        };
        if !task.enable_execute_command {
            self.notify(NoticeLevel::Warn, "ECS Exec is not enabled on this task");
            return AppCommand::None;
        }
        AppCommand::ExecShell {
            cluster: cluster.cluster_arn.clone(),
            task: task.task_arn.clone(),
            container: container.name.clone(),
            shell: self.config.shell.clone(),
        }
    }

    fn prepare_tail_logs(&mut self) -> AppCommand {
        if !matches!(
            self.state.primary,
            PrimaryKind::Service | PrimaryKind::Task | PrimaryKind::Container
        ) {
            self.notify(
                NoticeLevel::Info,
                "Log tailing is available for services, tasks and containers",
            );
            return AppCommand::None;
        }
        match self.log_source() {
            Some(source) => AppCommand::TailLogs { source },
            None => {
                self.notify(NoticeLevel::Warn, "No task definition to read log settings from");
                AppCommand::None
            }
        }
    }

    fn prepare_task_definition_edit(&mut self) -> AppCommand {
        if !self.require_writable("Registering task definitions") {
            return AppCommand::None;
        }
        if self.state.primary != PrimaryKind::TaskDefinition {
            self.notify(
                NoticeLevel::Info,
                "Task definitions are edited from the task definitions view",
            );
            return AppCommand::None;
        }
        let Some(Entity::TaskDefinition(definition)) = self.selected_entity().cloned() else {
            self.notify(NoticeLevel::Warn, "No task definition selected");
            return AppCommand::None;
        };
        self.pending_mutation = Some(PrimaryKind::TaskDefinition);
        AppCommand::EditTaskDefinition { definition }
    }

    fn require_writable(&mut self, what: &str) -> bool {
        if self.config.read_only {
            self.notify(
                NoticeLevel::Warn,
                format!("{what} is disabled in read-only mode"),
            );
            return false;
        }
        true
    }

    fn apply_input_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::CancelInput => {
                self.mode = InputMode::Normal;
                self.input.clear();
                self.completion_index = 0;
                AppCommand::None
            }
            Action::Backspace => {
                self.input.pop();
                self.completion_index = 0;
                AppCommand::None
            }
            Action::InputChar(ch) => {
                self.input.push(ch);
                self.completion_index = 0;
                AppCommand::None
            }
            Action::CompleteInput => {
                let candidates = self.completion_candidates();
                if let Some(candidate) =
                    candidates.get(self.completion_index % candidates.len().max(1))
                {
                    self.input = candidate.clone();
                }
                AppCommand::None
            }
            Action::SubmitInput => self.submit_input(),
            _ => AppCommand::None,
        }
    }

    fn submit_input(&mut self) -> AppCommand {
        let line = self.input.trim().to_string();
        let mode = self.mode;
        self.mode = InputMode::Normal;
        self.input.clear();
        self.completion_index = 0;

        match mode {
            InputMode::Filter => {
                self.filter = line;
                self.clamp_selection();
                self.track_selection();
                AppCommand::None
            }
            InputMode::Command => self.execute_command_line(&line),
            InputMode::Normal | InputMode::Form => AppCommand::None,
        }
    }

    fn execute_command_line(&mut self, line: &str) -> AppCommand {
        let token = line.trim_start_matches(':').trim();
        match token {
            "" => AppCommand::None,
            "q" | "quit" | "exit" => {
                self.running = false;
                AppCommand::None
            }
            "refresh" | "reload" => self.reload_current(),
            _ => match PrimaryKind::from_token(token) {
                Some(PrimaryKind::TaskDefinition) => self.open_task_definitions(),
                Some(PrimaryKind::Help) => self.show_help_page(),
                Some(kind) => {
                    if self.state.secondary != SecondaryKind::Empty {
                        self.close_overlay();
                    }
                    self.navigate(kind, false, None)
                }
                None => {
                    self.notify(NoticeLevel::Warn, format!("Unknown command '{token}'"));
                    AppCommand::None
                }
            },
        }
    }

    fn track_selection(&mut self) {
        if self.state.secondary != SecondaryKind::Empty
            || self.state.primary == PrimaryKind::Help
        {
            return;
        }
        let kind = self.state.primary;
        let Some(page) = self.primary_page() else {
            return;
        };
        let Some(index) = self.selected_index(page) else {
            return;
        };
        let entity = self
            .visible_rows(page)
            .get(index)
            .and_then(|row| row.entity.clone());

        match entity {
            Some(entity) if !entity.entity_name().is_empty() && entity.kind() == Some(kind) => {
                self.state.selection.capture(&entity);
                self.state.row_index = index;
            }
            Some(entity) => warn!(
                ?kind,
                entity_kind = ?entity.kind(),
                name = entity.entity_name(),
                "selected row carries an entity of the wrong shape"
            ),
            None => warn!(?kind, index, "selected row carries no entity"),
        }
    }

    fn selected_entity(&self) -> Option<&Entity> {
        let page = self.primary_page()?;
        let index = self.selected_index(page)?;
        self.visible_rows(page)
            .get(index)
            .and_then(|row| row.entity.as_ref())
    }

    fn visible_is_empty(&self) -> bool {
        self.primary_page()
            .map(|page| self.visible_rows(page).is_empty())
            .unwrap_or(true)
    }

    fn move_selection(&mut self, delta: isize) {
        let Some(key) = self.pages.visible_key().map(str::to_string) else {
            return;
        };
        let Some(page) = self.pages.get(&key) else {
            return;
        };

        if let PageBody::Text(text) = &page.body {
            let max = text
                .lines()
                .count()
                .saturating_sub(self.text_view_height as usize) as isize;
            let next = (self.overlay_scroll as isize).saturating_add(delta).clamp(0, max);
            self.overlay_scroll = next as u16;
            return;
        }

        let len = self.visible_rows(page).len();
        if len == 0 {
            return;
        }
        if let Some(table) = self.pages.get_mut(&key).and_then(Page::table_mut) {
            let current = table.selected.min(len - 1) as isize;
            table.selected = current.saturating_add(delta).clamp(0, len as isize - 1) as usize;
        }
        if self.state.secondary == SecondaryKind::Empty {
            self.track_selection();
        }
    }

    fn select_index(&mut self, index: usize) {
        let Some(key) = self.primary_key.clone() else {
            return;
        };
        if let Some(table) = self.pages.get_mut(&key).and_then(Page::table_mut) {
            table.selected = index;
        }
        self.clamp_selection();
        self.track_selection();
    }

    fn clamp_selection(&mut self) {
        let Some(key) = self.primary_key.clone() else {
            return;
        };
        let Some(page) = self.pages.get(&key) else {
            return;
        };
        let len = self.visible_rows(page).len();
        if let Some(table) = self.pages.get_mut(&key).and_then(Page::table_mut) {
            table.selected = table.selected.min(len.saturating_sub(1));
        }
    }

    fn page_step(&self) -> isize {
        self.page_size.saturating_sub(1).max(1) as isize
    }

    fn parent_of(&self, kind: PrimaryKind) -> Option<String> {
        let selection = &self.state.selection;
        match kind {
            PrimaryKind::Cluster | PrimaryKind::Help => None,
            PrimaryKind::Service | PrimaryKind::Instance => selection
                .cluster
                .as_ref()
                .map(|cluster| cluster.cluster_arn.clone()),
            PrimaryKind::Task | PrimaryKind::Deployment => selection
                .service
                .as_ref()
                .map(|service| service.service_arn.clone()),
            PrimaryKind::Container => selection.task.as_ref().map(|task| task.task_arn.clone()),
            PrimaryKind::TaskDefinition => self.state.task_definition_family.clone(),
        }
    }

    fn load_request(&self, kind: PrimaryKind) -> Result<LoadRequest, String> {
        let selection = &self.state.selection;
        let cluster = || {
            selection
                .cluster
                .as_ref()
                .map(|cluster| cluster.cluster_arn.clone())
                .ok_or_else(|| "Select a cluster first".to_string())
        };
        let service = || {
            selection
                .service
                .as_ref()
                .map(|service| service.service_arn.clone())
                .ok_or_else(|| "Select a service first".to_string())
        };

        match kind {
            PrimaryKind::Cluster => Ok(LoadRequest::Clusters),
            PrimaryKind::Service => Ok(LoadRequest::Services { cluster: cluster()? }),
            PrimaryKind::Instance => Ok(LoadRequest::Instances { cluster: cluster()? }),
            PrimaryKind::Task => Ok(LoadRequest::Tasks {
                cluster: cluster()?,
                service: service()?,
            }),
            PrimaryKind::Deployment => Ok(LoadRequest::Deployments {
                cluster: cluster()?,
                service: service()?,
            }),
            PrimaryKind::Container => Ok(LoadRequest::Containers {
                cluster: cluster()?,
                task: selection
                    .task
                    .as_ref()
                    .map(|task| task.task_arn.clone())
                    .ok_or_else(|| "Select a task first".to_string())?,
            }),
            PrimaryKind::TaskDefinition => self
                .state
                .task_definition_family
                .clone()
                .map(|family| LoadRequest::TaskDefinitions { family })
                .ok_or_else(|| "Select a service or task first".to_string()),
            PrimaryKind::Help => Err("help is not loaded from the provider".to_string()),
        }
    }

    fn log_source(&self) -> Option<LogSource> {
        let selection = &self.state.selection;
        match self.state.primary {
            PrimaryKind::Service => selection.service.as_ref().map(|service| LogSource {
                task_definition: service.task_definition.clone(),
                container: None,
                task_id: None,
            }),
            PrimaryKind::Task => selection.task.as_ref().map(|task| LogSource {
                task_definition: task.task_definition_arn.clone(),
                container: None,
                task_id: Some(short_arn(&task.task_arn).to_string()),
            }),
            PrimaryKind::Container => {
                let task = selection.task.as_ref()?;
                let container = selection.container.as_ref()?;
                Some(LogSource {
                    task_definition: task.task_definition_arn.clone(),
                    container: Some(container.name.clone()),
                    task_id: Some(short_arn(&task.task_arn).to_string()),
                })
            }
            _ => None,
        }
        .filter(|source| !source.task_definition.is_empty())
    }

    fn page_title(&self, kind: PrimaryKind) -> String {
        let selection = &self.state.selection;
        let scope = match kind {
            PrimaryKind::Service | PrimaryKind::Instance => selection
                .cluster_name()
                .map(str::to_string),
            PrimaryKind::Task | PrimaryKind::Deployment => selection
                .service
                .as_ref()
                .map(|service| service.service_name.clone()),
            PrimaryKind::Container => selection
                .task
                .as_ref()
                .map(|task| short_arn(&task.task_arn).to_string()),
            PrimaryKind::TaskDefinition => self.state.task_definition_family.clone(),
            PrimaryKind::Cluster | PrimaryKind::Help => None,
        };
        match scope {
            Some(scope) => format!("{} · {scope}", kind.title()),
            None => kind.title().to_string(),
        }
    }

    fn header_for(&self, kind: PrimaryKind) -> Vec<(String, String)> {
        let selection = &self.state.selection;
        let pair = |label: &str, value: String| (label.to_string(), value);
        match kind {
            PrimaryKind::Cluster | PrimaryKind::Help => vec![
                pair(
                    "Profile",
                    self.config.profile.clone().unwrap_or_else(|| "default".to_string()),
                ),
                pair(
                    "Region",
                    self.config.region.clone().unwrap_or_else(|| "default".to_string()),
                ),
            ],
            PrimaryKind::Service | PrimaryKind::Instance => selection
                .cluster
                .as_ref()
                .map(|cluster| {
                    vec![
                        pair("Cluster", cluster.cluster_name.clone()),
                        pair("Status", cluster.status.clone()),
                        pair("Services", cluster.active_services_count.to_string()),
                        pair(
                            "Tasks",
                            format!(
                                "{} running / {} pending",
                                cluster.running_tasks_count, cluster.pending_tasks_count
                            ),
                        ),
                    ]
                })
                .unwrap_or_default(),
            PrimaryKind::Task | PrimaryKind::Deployment => selection
                .service
                .as_ref()
                .map(|service| {
                    vec![
                        pair("Service", service.service_name.clone()),
                        pair("Status", service.status.clone()),
                        pair(
                            "Tasks",
                            format!(
                                "{}/{} ({} pending)",
                                service.running_count, service.desired_count, service.pending_count
                            ),
                        ),
                        pair(
                            "Task definition",
                            short_arn(&service.task_definition).to_string(),
                        ),
                    ]
                })
                .unwrap_or_default(),
            PrimaryKind::Container => selection
                .task
                .as_ref()
                .map(|task| {
                    vec![
                        pair("Task", short_arn(&task.task_arn).to_string()),
                        pair("Status", task.last_status.clone()),
                        pair(
                            "Launch type",
                            task.launch_type.clone().unwrap_or_else(|| "-".to_string()),
                        ),
                        pair(
                            "Size",
                            format!(
                                "{} cpu / {} MiB",
                                task.cpu.as_deref().unwrap_or("-"),
                                task.memory.as_deref().unwrap_or("-")
                            ),
                        ),
                        pair("Started", human_age(task.started_at)),
                    ]
                })
                .unwrap_or_default(),
            PrimaryKind::TaskDefinition => vec![pair(
                "Family",
                self.state
                    .task_definition_family
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
            )],
        }
    }

    fn empty_result_message(&self, kind: PrimaryKind) -> String {
        let scope = self.page_title(kind);
        match scope.split_once(" · ") {
            Some((_, owner)) => format!("No {} found in {owner}", kind.title()),
            None => format!("No {} found", kind.title()),
        }
    }
}

const GLOBAL_HINTS: [(&str, &str); 9] = [
    ("esc", "back / close view"),
    ("f", "toggle full screen"),
    ("ctrl+r", "reload"),
    (":", "command"),
    ("/", "filter rows"),
    ("j/k", "move"),
    ("g/G", "top / bottom"),
    ("?", "help"),
    ("q", "quit"),
];

fn help_row(key: &str, label: &str, scope: &str) -> RowData {
    RowData {
        name: key.to_string(),
        columns: vec![key.to_string(), label.to_string(), scope.to_string()],
        entity: None,
    }
}

fn events_table(snapshot: &EventsSnapshot) -> TableData {
    let rows = snapshot
        .events
        .iter()
        .map(|event| RowData {
            name: event.id.clone(),
            columns: vec![
                event
                    .created_at
                    .map(|ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                event.message.clone(),
            ],
            entity: None,
        })
        .collect::<Vec<_>>();
    let mut table = TableData::default();
    table.set_rows(
        vec!["Time".to_string(), "Message".to_string()],
        rows,
        Local::now(),
    );
    table
}

fn display_name(entity: &Entity) -> String {
    match entity {
        Entity::Cluster(cluster) => cluster.cluster_name.clone(),
        Entity::Service(service) => service.service_name.clone(),
        Entity::Container(container) => container.name.clone(),
        Entity::TaskDefinition(definition) => {
            format!("{}:{}", definition.family, definition.revision)
        }
        Entity::Instance(instance) => instance
            .ec2_instance_id
            .clone()
            .unwrap_or_else(|| short_arn(&instance.container_instance_arn).to_string()),
        other => short_arn(other.entity_name()).to_string(),
    }
}

fn parse_port(value: i64) -> Result<u16, String> {
    u16::try_from(value)
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| format!("{value} is not a valid port"))
}

fn summarize_error_line(error: &str) -> String {
    error
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

fn normalize_status_text(status: String) -> String {
    const MAX_STATUS_LEN: usize = 180;
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, EngineConfig, InputMode, LoadRequest, OverlayContent};
    use crate::input::Action;
    use crate::kind::{PrimaryKind, SecondaryKind, page_key};
    use crate::model::{
        Cluster, Container, Entity, RowData, Service, ServiceEvent, TableData, Task,
    };
    use crate::notice::NoticeLevel;
    use crate::session::Session;
    use chrono::Local;

    fn config(refresh_secs: i64) -> EngineConfig {
        EngineConfig {
            refresh_secs,
            ..EngineConfig::default()
        }
    }

    fn table(entities: Vec<Entity>) -> TableData {
        let rows = entities
            .into_iter()
            .map(|entity| RowData {
                name: entity.entity_name().to_string(),
                columns: vec![entity.entity_name().to_string()],
                entity: Some(entity),
            })
            .collect();
        let mut table = TableData::default();
        table.set_rows(vec!["Name".to_string()], rows, Local::now());
        table
    }

    fn cluster(name: &str) -> Entity {
        Entity::Cluster(Cluster {
            cluster_arn: format!("arn:cluster/{name}"),
            cluster_name: name.to_string(),
            ..Cluster::default()
        })
    }

    fn service(name: &str) -> Service {
        Service {
            service_arn: format!("arn:service/{name}"),
            service_name: name.to_string(),
            desired_count: 2,
            task_definition: format!("arn:task-definition/{name}:3"),
            ..Service::default()
        }
    }

    fn task(id: &str) -> Task {
        Task {
            task_arn: format!("arn:task/prod/{id}"),
            task_definition_arn: "arn:task-definition/web:3".to_string(),
            enable_execute_command: true,
            ..Task::default()
        }
    }

    fn container(name: &str) -> Entity {
        Entity::Container(Container {
            container_arn: format!("arn:container/{name}"),
            name: name.to_string(),
            runtime_id: Some(format!("rt-{name}")),
            ..Container::default()
        })
    }

    /// Loads clusters and opens the cluster list.
    fn app_at_clusters(refresh_secs: i64) -> App {
        let mut app = App::new(config(refresh_secs));
        assert!(matches!(
            app.start(),
            AppCommand::Load {
                kind: PrimaryKind::Cluster,
                request: LoadRequest::Clusters
            }
        ));
        app.install_page(Ok(table(vec![cluster("prod"), cluster("staging")])));
        app
    }

    fn drill(app: &mut App, entities: Vec<Entity>) {
        let command = app.apply_action(Action::Enter);
        assert!(matches!(command, AppCommand::Load { .. }), "{command:?}");
        app.install_page(Ok(table(entities)));
    }

    fn app_at_containers(refresh_secs: i64) -> App {
        let mut app = app_at_clusters(refresh_secs);
        drill(&mut app, vec![Entity::Service(service("web"))]);
        drill(&mut app, vec![Entity::Task(task("t1"))]);
        drill(&mut app, vec![container("c1"), container("c2")]);
        app
    }

    #[test]
    fn failed_startup_keeps_an_error_page_until_reload() {
        let mut app = App::new(config(0));
        app.start();
        app.install_page(Err("aws CLI not found in PATH\ncaused by: os error 2".to_string()));

        let page = app.primary_page().expect("error page");
        let table = page.table().expect("table body");
        assert_eq!(table.error.as_deref(), Some("aws CLI not found in PATH"));
        assert_eq!(app.notice().map(|notice| notice.level), Some(NoticeLevel::Error));

        assert!(matches!(
            app.apply_action(Action::Refresh),
            AppCommand::Load {
                kind: PrimaryKind::Cluster,
                ..
            }
        ));
        app.install_page(Ok(table_of_clusters()));
        let table = app
            .primary_page()
            .and_then(|page| page.table())
            .expect("table");
        assert!(table.error.is_none());
        assert_eq!(table.rows.len(), 2);
    }

    fn table_of_clusters() -> TableData {
        table(vec![cluster("prod"), cluster("staging")])
    }

    #[test]
    fn cancelled_mutation_does_not_reload() {
        let mut app = app_at_containers(0);
        app.cancel_mutation("Task definition unchanged, nothing registered");
        let notice = app.notice().expect("notice");
        assert_eq!(notice.level, NoticeLevel::Info);
        assert_eq!(
            app.complete_mutation(Ok("late".to_string())),
            AppCommand::None
        );
    }

    #[test]
    fn back_at_root_keeps_the_cluster_view() {
        let mut app = app_at_clusters(0);
        let visible = app.pages().visible_key().map(str::to_string);

        let command = app.apply_action(Action::Back);
        assert_eq!(command, AppCommand::None);
        assert_eq!(app.state().primary, PrimaryKind::Cluster);
        assert_eq!(app.pages().visible_key().map(str::to_string), visible);
    }

    #[test]
    fn drill_down_and_back_reuses_cached_pages() {
        let mut app = app_at_containers(0);
        assert_eq!(app.state().primary, PrimaryKind::Container);

        for expected in [
            PrimaryKind::Task,
            PrimaryKind::Service,
            PrimaryKind::Cluster,
        ] {
            assert_eq!(app.apply_action(Action::Back), AppCommand::None);
            assert_eq!(app.state().primary, expected);
        }

        for key in [
            page_key(PrimaryKind::Service, Some("arn:cluster/prod"), None),
            page_key(PrimaryKind::Task, Some("arn:service/web"), None),
            page_key(PrimaryKind::Container, Some("arn:task/prod/t1"), None),
        ] {
            assert!(app.pages().has_page(&key), "missing {key}");
        }
    }

    #[test]
    fn enter_requests_services_of_the_selected_cluster() {
        let mut app = app_at_clusters(30);
        app.apply_action(Action::Down);
        let command = app.apply_action(Action::Enter);
        assert_eq!(
            command,
            AppCommand::Load {
                kind: PrimaryKind::Service,
                request: LoadRequest::Services {
                    cluster: "arn:cluster/staging".to_string()
                }
            }
        );
    }

    #[test]
    fn back_with_refresh_enabled_rebuilds_and_keeps_row() {
        let mut app = app_at_clusters(30);
        app.apply_action(Action::Down);
        drill(&mut app, vec![Entity::Service(service("web"))]);

        let command = app.apply_action(Action::Back);
        assert!(matches!(
            command,
            AppCommand::Load {
                kind: PrimaryKind::Cluster,
                ..
            }
        ));
        app.install_page(Ok(table(vec![cluster("prod"), cluster("staging")])));
        assert_eq!(app.state().primary, PrimaryKind::Cluster);
        assert_eq!(app.state().selection.cluster_name(), Some("staging"));
    }

    #[test]
    fn refresh_tick_is_skipped_while_an_overlay_is_open() {
        let mut app = app_at_clusters(5);
        drill(
            &mut app,
            vec![
                Entity::Service(service("web")),
                Entity::Service(service("api")),
            ],
        );
        app.apply_action(Action::Down);
        app.apply_action(Action::ShowDescription);
        assert_eq!(app.state().secondary, SecondaryKind::Description);
        let visible = app.pages().visible_key().map(str::to_string);
        let row = app.state().row_index;

        assert_eq!(app.on_refresh_tick(), AppCommand::None);
        assert_eq!(app.pages().visible_key().map(str::to_string), visible);
        assert_eq!(app.state().row_index, row);
        assert_eq!(row, 1);
    }

    #[test]
    fn refresh_tick_rebuilds_at_the_remembered_row() {
        let mut app = app_at_clusters(5);
        drill(
            &mut app,
            vec![
                Entity::Service(service("web")),
                Entity::Service(service("api")),
            ],
        );
        app.apply_action(Action::Down);

        let command = app.on_refresh_tick();
        assert!(matches!(
            command,
            AppCommand::Load {
                kind: PrimaryKind::Service,
                ..
            }
        ));
        app.install_page(Ok(table(vec![
            Entity::Service(service("web")),
            Entity::Service(service("api")),
        ])));
        assert_eq!(app.state().row_index, 1);
        assert_eq!(
            app.state()
                .selection
                .service
                .as_ref()
                .map(|service| service.service_name.as_str()),
            Some("api")
        );
    }

    #[test]
    fn empty_service_list_returns_to_clusters_with_warning() {
        let mut app = app_at_clusters(0);
        let command = app.apply_action(Action::Enter);
        assert!(matches!(command, AppCommand::Load { .. }));

        app.install_page(Ok(TableData::default()));
        assert_eq!(app.state().primary, PrimaryKind::Cluster);
        let notice = app.notice().expect("notice");
        assert_eq!(notice.level, NoticeLevel::Warn);
        assert!(notice.text.contains("No services"), "{}", notice.text);
    }

    #[test]
    fn provider_failure_on_reload_falls_back_to_previous_kind() {
        let mut app = app_at_clusters(5);
        drill(&mut app, vec![Entity::Service(service("web"))]);

        let command = app.on_refresh_tick();
        assert!(matches!(command, AppCommand::Load { .. }));
        app.install_page(Err("AccessDeniedException: nope\nmore".to_string()));

        assert_eq!(app.state().primary, PrimaryKind::Cluster);
        let notice = app.notice().expect("notice");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.text.contains("AccessDeniedException"));
        assert!(!notice.text.contains("more"));
    }

    #[test]
    fn update_service_submission_reloads_owner_once() {
        let mut app = app_at_clusters(0);
        drill(&mut app, vec![Entity::Service(service("web"))]);

        app.apply_action(Action::UpdateService);
        assert_eq!(app.mode(), InputMode::Form);
        assert_eq!(app.state().secondary, SecondaryKind::Modal);

        app.apply_action(Action::Backspace);
        app.apply_action(Action::InputChar('5'));
        app.apply_action(Action::NextField);
        app.apply_action(Action::NextField);
        app.apply_action(Action::CycleRight);
        let command = app.apply_action(Action::SubmitInput);
        assert_eq!(
            command,
            AppCommand::UpdateService {
                cluster: "arn:cluster/prod".to_string(),
                service: "arn:service/web".to_string(),
                desired_count: 5,
                task_definition: None,
                force_new_deployment: true,
            }
        );
        assert_eq!(app.state().secondary, SecondaryKind::Empty);
        assert_eq!(app.mode(), InputMode::Normal);

        let follow_up = app.complete_mutation(Ok("Service web updated".to_string()));
        assert!(matches!(
            follow_up,
            AppCommand::Load {
                kind: PrimaryKind::Service,
                ..
            }
        ));
        app.install_page(Ok(table(vec![Entity::Service(service("web"))])));
        assert_eq!(
            app.complete_mutation(Ok("again".to_string())),
            AppCommand::None
        );
    }

    #[test]
    fn invalid_form_input_keeps_the_form_open() {
        let mut app = app_at_clusters(0);
        drill(&mut app, vec![Entity::Service(service("web"))]);
        app.apply_action(Action::UpdateService);
        app.apply_action(Action::Backspace);

        assert_eq!(app.apply_action(Action::SubmitInput), AppCommand::None);
        assert_eq!(app.mode(), InputMode::Form);
        assert_eq!(app.state().secondary, SecondaryKind::Modal);

        app.apply_action(Action::CancelInput);
        assert_eq!(app.mode(), InputMode::Normal);
        assert_eq!(app.state().secondary, SecondaryKind::Empty);
        assert_eq!(
            app.pages().visible_key(),
            Some(page_key(PrimaryKind::Service, Some("arn:cluster/prod"), None).as_str())
        );
    }

    #[test]
    fn read_only_mode_blocks_mutations() {
        let mut app = App::new(EngineConfig {
            read_only: true,
            refresh_secs: 0,
            ..EngineConfig::default()
        });
        app.start();
        app.install_page(Ok(table(vec![cluster("prod")])));
        drill(&mut app, vec![Entity::Service(service("web"))]);

        assert_eq!(app.apply_action(Action::UpdateService), AppCommand::None);
        assert_eq!(app.mode(), InputMode::Normal);
        assert_eq!(app.notice().map(|notice| notice.level), Some(NoticeLevel::Warn));
    }

    #[test]
    fn unsupported_overlay_is_rejected() {
        let mut app = app_at_clusters(0);
        assert_eq!(app.apply_action(Action::ShowLogs), AppCommand::None);
        assert_eq!(app.state().secondary, SecondaryKind::Empty);
        assert_eq!(app.notice().map(|notice| notice.level), Some(NoticeLevel::Warn));
    }

    #[test]
    fn events_overlay_uses_service_events_and_esc_restores_page() {
        let mut app = app_at_clusters(0);
        let mut web = service("web");
        web.events = vec![ServiceEvent {
            id: "e1".to_string(),
            created_at: None,
            message: "service web has reached a steady state.".to_string(),
        }];
        drill(&mut app, vec![Entity::Service(web)]);
        let owner = app.pages().visible_key().map(str::to_string);

        assert_eq!(app.apply_action(Action::ShowEvents), AppCommand::None);
        assert_eq!(app.state().secondary, SecondaryKind::EventList);
        let overlay = app.overlay_page().expect("overlay");
        assert_eq!(app.visible_rows(overlay).len(), 1);

        app.apply_action(Action::ToggleFullScreen);
        assert!(app.full_screen());
        assert_eq!(app.state().secondary, SecondaryKind::EventList);

        app.apply_action(Action::Back);
        assert_eq!(app.state().secondary, SecondaryKind::Empty);
        assert!(!app.full_screen());
        assert_eq!(app.pages().visible_key().map(str::to_string), owner);
    }

    #[test]
    fn logs_overlay_is_installed_from_provider_content() {
        let mut app = app_at_clusters(0);
        drill(&mut app, vec![Entity::Service(service("web"))]);

        let command = app.apply_action(Action::ShowLogs);
        assert!(matches!(command, AppCommand::LoadOverlay { .. }));
        assert_eq!(app.state().secondary, SecondaryKind::Empty);

        app.install_overlay(Ok(OverlayContent::Text("line one\nline two".to_string())));
        assert_eq!(app.state().secondary, SecondaryKind::LogList);
        assert!(
            app.pages()
                .visible_key()
                .is_some_and(|key| key.ends_with(".logs"))
        );
    }

    #[test]
    fn terminating_sessions_removes_them_from_the_registry() {
        let mut app = app_at_containers(0);
        for (id, port) in [("s-1", 8080), ("s-2", 9090)] {
            app.register_session(Session {
                id: id.to_string(),
                local_port: port,
                remote_port: 80,
                container_id: "prod.c1".to_string(),
                pid: None,
            });
        }

        app.apply_action(Action::TerminateSessions);
        assert_eq!(app.mode(), InputMode::Form);
        let command = app.apply_action(Action::SubmitInput);
        let AppCommand::TerminateSessions { sessions } = command else {
            panic!("unexpected command {command:?}");
        };
        assert_eq!(sessions.len(), 2);
        assert!(app.sessions().for_container("prod.c1").is_empty());

        app.apply_action(Action::TerminateSessions);
        assert_eq!(app.mode(), InputMode::Normal);
    }

    #[test]
    fn port_forward_form_builds_command() {
        let mut app = app_at_containers(0);
        app.apply_action(Action::PortForward);
        for ch in "80".chars() {
            app.apply_action(Action::InputChar(ch));
        }
        app.apply_action(Action::NextField);
        for ch in "8080".chars() {
            app.apply_action(Action::InputChar(ch));
        }
        let command = app.apply_action(Action::SubmitInput);
        assert_eq!(
            command,
            AppCommand::StartPortForward {
                cluster: "prod".to_string(),
                task: "t1".to_string(),
                runtime_id: "rt-c1".to_string(),
                container_id: "prod.c1".to_string(),
                remote_port: 80,
                local_port: 8080,
            }
        );
    }

    #[test]
    fn selection_ignores_rows_with_the_wrong_entity() {
        let mut app = app_at_clusters(0);
        drill(
            &mut app,
            vec![Entity::Service(service("web")), cluster("intruder")],
        );
        app.apply_action(Action::Down);
        assert_eq!(
            app.state()
                .selection
                .service
                .as_ref()
                .map(|service| service.service_name.as_str()),
            Some("web")
        );
        assert_eq!(app.state().selection.cluster_name(), Some("prod"));
    }

    #[test]
    fn deployments_back_returns_to_service() {
        let mut app = app_at_clusters(0);
        drill(&mut app, vec![Entity::Service(service("web"))]);

        let command = app.apply_action(Action::OpenDeployments);
        assert!(matches!(
            command,
            AppCommand::Load {
                kind: PrimaryKind::Deployment,
                ..
            }
        ));
        app.install_page(Ok(table(vec![Entity::Deployment(
            crate::model::Deployment {
                id: "ecs-svc/1".to_string(),
                ..crate::model::Deployment::default()
            },
        )])));
        assert_eq!(app.state().back_to, Some(PrimaryKind::Service));

        app.apply_action(Action::Back);
        assert_eq!(app.state().primary, PrimaryKind::Service);
        assert_eq!(app.state().back_to, None);
    }

    #[test]
    fn failed_back_navigation_keeps_the_override() {
        let mut app = app_at_clusters(30);
        drill(&mut app, vec![Entity::Service(service("web"))]);
        app.apply_action(Action::OpenDeployments);
        app.install_page(Ok(table(vec![Entity::Deployment(
            crate::model::Deployment {
                id: "ecs-svc/1".to_string(),
                ..crate::model::Deployment::default()
            },
        )])));

        let command = app.apply_action(Action::Back);
        assert!(matches!(
            command,
            AppCommand::Load {
                kind: PrimaryKind::Service,
                ..
            }
        ));
        app.install_page(Err("ThrottlingException: Rate exceeded".to_string()));
        assert_eq!(app.state().primary, PrimaryKind::Deployment);
        assert_eq!(app.state().back_to, Some(PrimaryKind::Service));

        let command = app.apply_action(Action::Back);
        assert!(matches!(
            command,
            AppCommand::Load {
                kind: PrimaryKind::Service,
                ..
            }
        ));
        app.install_page(Ok(table(vec![Entity::Service(service("web"))])));
        assert_eq!(app.state().primary, PrimaryKind::Service);
        assert_eq!(app.state().back_to, None);
    }

    #[test]
    fn help_page_returns_to_origin() {
        let mut app = app_at_clusters(0);
        drill(&mut app, vec![Entity::Service(service("web"))]);

        assert_eq!(app.apply_action(Action::ShowHelp), AppCommand::None);
        assert_eq!(app.state().primary, PrimaryKind::Help);
        assert_eq!(app.on_refresh_tick(), AppCommand::None);

        app.apply_action(Action::Back);
        assert_eq!(app.state().primary, PrimaryKind::Service);
    }

    #[test]
    fn command_line_navigates_to_kind() {
        let mut app = app_at_clusters(0);
        app.apply_action(Action::StartCommand);
        for ch in "svc".chars() {
            app.apply_action(Action::InputChar(ch));
        }
        let command = app.apply_action(Action::SubmitInput);
        assert!(matches!(
            command,
            AppCommand::Load {
                kind: PrimaryKind::Service,
                ..
            }
        ));
    }

    #[test]
    fn filter_narrows_rows_and_tracks_selection() {
        let mut app = app_at_clusters(0);
        app.apply_action(Action::StartFilter);
        for ch in "stag".chars() {
            app.apply_action(Action::InputChar(ch));
        }
        app.apply_action(Action::SubmitInput);
        let page = app.primary_page().expect("page");
        assert_eq!(app.visible_rows(page).len(), 1);
        assert_eq!(app.state().selection.cluster_name(), Some("staging"));

        app.apply_action(Action::Back);
        assert_eq!(app.filter(), "");
        assert_eq!(app.state().primary, PrimaryKind::Cluster);
    }

    #[test]
    fn notices_expire_by_level_and_generation() {
        let mut app = App::new(config(0));
        app.notify(NoticeLevel::Info, "loaded");
        let info = app.take_fresh_notice().expect("generation");
        assert_eq!(app.take_fresh_notice(), None);
        app.expire_notice(info, false);
        assert!(app.notice().is_none());

        app.notify(NoticeLevel::Error, "boom");
        let error = app.take_fresh_notice().expect("generation");
        app.expire_notice(error, false);
        assert!(app.notice().is_some());
        app.expire_notice(info, true);
        assert!(app.notice().is_some());
        app.expire_notice(error, true);
        assert!(app.notice().is_none());
    }

    #[test]
    fn startup_cluster_opens_services_directly() {
        let mut app = App::new(EngineConfig {
            cluster: Some("staging".to_string()),
            refresh_secs: 0,
            ..EngineConfig::default()
        });
        app.start();
        let command = app.install_page(Ok(table(vec![cluster("prod"), cluster("staging")])));
        assert_eq!(
            command,
            AppCommand::Load {
                kind: PrimaryKind::Service,
                request: LoadRequest::Services {
                    cluster: "arn:cluster/staging".to_string()
                }
            }
        );
    }
}
