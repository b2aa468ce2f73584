mod app;
mod aws;
mod cli;
mod config;
mod form;
mod input;
mod kind;
mod model;
mod notice;
mod page;
mod refresh;
mod session;
mod ui;

use anyhow::{Context, Result, anyhow, bail};
use app::{App, AppCommand, LogSource};
use aws::EcsGateway;
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::StreamExt;
use notice::{NoticeLevel, NoticeTimers};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use refresh::RefreshScheduler;
use session::Session;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{self, ErrorKind, Stdout, Write};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);
const SESSION_START_TIMEOUT: Duration = Duration::from_secs(20);

/// Events delivered to the UI task by background work.
#[derive(Debug)]
pub enum LoopEvent {
    RefreshTick,
    NoticeExpired {
        generation: u64,
        forced: bool,
    },
    SessionExited {
        pid: u32,
        result: std::result::Result<ExitStatus, String>,
    },
}

/// Kill switches of running forwarding processes, keyed by pid.
type ForwardProcesses = HashMap<u32, oneshot::Sender<()>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let settings = Settings::load(&args)?;
    init_tracing(&settings.log_filter, settings.log_file.as_deref())?;
    info!(
        config = ?settings.source,
        profile = ?settings.profile,
        region = ?settings.region,
        read_only = settings.read_only,
        refresh_secs = settings.refresh_secs,
        "starting ecsnav"
    );

    let gateway = EcsGateway::new(settings.profile.clone(), settings.region.clone());
    let mut app = App::new(settings.engine_config());
    run(&mut app, &gateway, settings.refresh_secs).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::sink).try_init();
        }
    }

    Ok(())
}

async fn run(app: &mut App, gateway: &EcsGateway, refresh_secs: i64) -> Result<()> {
    let mut tui = Tui::init()?;
    let mut forwards = ForwardProcesses::new();
    let run_result = run_loop(&mut tui, app, gateway, refresh_secs, &mut forwards).await;
    let run_result = finish_run(run_result, app, gateway, &mut forwards).await;
    let restore_result = tui.restore();

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum UiPhase {
    Running,
    Suspended,
}

struct Tui {
    terminal: TuiTerminal,
    keyboard_enhanced: bool,
    phase: UiPhase,
}

impl Tui {
    fn init() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        if keyboard_enhanced {
            execute!(stdout, PushKeyboardEnhancementFlags(keyboard_flags()))
                .context("failed to push keyboard enhancement flags")?;
        }
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
        terminal.clear().context("failed to clear terminal")?;
        Ok(Self {
            terminal,
            keyboard_enhanced,
            phase: UiPhase::Running,
        })
    }

    fn draw(&mut self, app: &mut App) -> Result<()> {
        if self.phase == UiPhase::Suspended {
            return Ok(());
        }
        self.terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        if self.keyboard_enhanced {
            execute!(self.terminal.backend_mut(), PopKeyboardEnhancementFlags)
                .context("failed to pop keyboard enhancement flags")?;
        }
        disable_raw_mode().context("failed to disable raw mode for subprocess")?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .context("failed to leave alternate screen for subprocess")?;
        self.terminal
            .show_cursor()
            .context("failed to show cursor for subprocess")?;
        self.phase = UiPhase::Suspended;
        debug!("terminal suspended");
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        enable_raw_mode().context("failed to re-enable raw mode after subprocess")?;
        execute!(self.terminal.backend_mut(), EnterAlternateScreen)
            .context("failed to re-enter alternate screen after subprocess")?;
        if self.keyboard_enhanced {
            execute!(
                self.terminal.backend_mut(),
                PushKeyboardEnhancementFlags(keyboard_flags())
            )
            .context("failed to push keyboard enhancement flags")?;
        }
        self.terminal
            .clear()
            .context("failed to clear terminal after subprocess")?;
        self.phase = UiPhase::Running;
        debug!("terminal resumed");
        Ok(())
    }

    /// Hands the terminal to `command` and takes it back when the child exits.
    async fn run_interactive(&mut self, mut command: TokioCommand, label: &str) -> Result<ExitStatus> {
        self.suspend()?;
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let run_result = command
            .status()
            .await
            .map_err(|error| spawn_error(error, label));
        let restore_result = self.resume();

        match (run_result, restore_result) {
            (Err(run_error), Err(restore_error)) => Err(anyhow!(
                "{run_error:#}\nterminal resume error: {restore_error:#}"
            )),
            (Err(error), _) => Err(error),
            (_, Err(error)) => Err(error),
            (Ok(status), Ok(())) => Ok(status),
        }
    }

    fn restore(&mut self) -> Result<()> {
        if self.phase == UiPhase::Suspended {
            return Ok(());
        }
        if self.keyboard_enhanced {
            execute!(self.terminal.backend_mut(), PopKeyboardEnhancementFlags)
                .context("failed to pop keyboard enhancement flags")?;
        }
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .context("failed to leave alternate screen")?;
        self.terminal.show_cursor().context("failed to show cursor")?;
        Ok(())
    }
}

fn keyboard_flags() -> KeyboardEnhancementFlags {
    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
        | KeyboardEnhancementFlags::REPORT_ALTERNATE_KEYS
}

async fn run_loop(
    tui: &mut Tui,
    app: &mut App,
    gateway: &EcsGateway,
    refresh_secs: i64,
    forwards: &mut ForwardProcesses,
) -> Result<()> {
    let (loop_tx, mut loop_rx) = mpsc::unbounded_channel::<LoopEvent>();
    let mut notices = NoticeTimers::new(loop_tx.clone());
    let refresh = RefreshScheduler::start(refresh_secs, loop_tx.clone());
    if let Some(scheduler) = &refresh {
        debug!(period = ?scheduler.period(), "auto refresh enabled");
    }
    let mut reader = EventStream::new();

    app.notify(NoticeLevel::Info, "Loading clusters…");
    let command = app.start();
    drive(tui, app, gateway, command, &loop_tx, forwards, &mut reader, &mut notices).await?;

    loop {
        sync_notice(app, &mut notices);
        tui.draw(app)?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!(?action, "action");
                            let command = app.apply_action(action);
                            drive(tui, app, gateway, command, &loop_tx, forwards, &mut reader, &mut notices).await?;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.notify(NoticeLevel::Error, format!("terminal event error: {error}"));
                    }
                    None => {
                        warn!("terminal event stream closed");
                        break;
                    }
                }
            }
            maybe_event = loop_rx.recv() => {
                let Some(event) = maybe_event else {
                    break;
                };
                let command = match event {
                    LoopEvent::RefreshTick => app.on_refresh_tick(),
                    LoopEvent::NoticeExpired { generation, forced } => {
                        app.expire_notice(generation, forced);
                        AppCommand::None
                    }
                    LoopEvent::SessionExited { pid, result } => {
                        forwards.remove(&pid);
                        let detail = match result {
                            Ok(status) => status.to_string(),
                            Err(error) => error,
                        };
                        debug!(pid, detail = %detail, "forwarding process exited");
                        app.session_exited(pid, &detail);
                        AppCommand::None
                    }
                };
                drive(tui, app, gateway, command, &loop_tx, forwards, &mut reader, &mut notices).await?;
            }
        }
    }

    Ok(())
}

fn sync_notice(app: &mut App, notices: &mut NoticeTimers) {
    if let Some(generation) = app.take_fresh_notice() {
        notices.schedule(generation);
    }
}

/// Executes a command and every follow-up it produces.
#[allow(clippy::too_many_arguments)]
async fn drive(
    tui: &mut Tui,
    app: &mut App,
    gateway: &EcsGateway,
    mut command: AppCommand,
    loop_tx: &mpsc::UnboundedSender<LoopEvent>,
    forwards: &mut ForwardProcesses,
    reader: &mut EventStream,
    notices: &mut NoticeTimers,
) -> Result<()> {
    while command != AppCommand::None {
        sync_notice(app, notices);
        tui.draw(app)?;
        let interactive = matches!(
            command,
            AppCommand::ExecShell { .. }
                | AppCommand::TailLogs { .. }
                | AppCommand::EditTaskDefinition { .. }
        );
        command = execute_app_command(tui, app, gateway, command, loop_tx, forwards).await?;
        if interactive {
            *reader = EventStream::new();
        }
    }
    Ok(())
}

async fn execute_app_command(
    tui: &mut Tui,
    app: &mut App,
    gateway: &EcsGateway,
    command: AppCommand,
    loop_tx: &mpsc::UnboundedSender<LoopEvent>,
    forwards: &mut ForwardProcesses,
) -> Result<AppCommand> {
    let follow_up = match command {
        AppCommand::None => AppCommand::None,
        AppCommand::Load { kind, request } => {
            debug!(?kind, ?request, "loading page");
            let result = bounded(kind.title(), gateway.fetch_table(&request)).await;
            app.install_page(result)
        }
        AppCommand::LoadOverlay { request } => {
            let result = bounded("overlay", gateway.fetch_overlay(&request)).await;
            app.install_overlay(result);
            AppCommand::None
        }
        AppCommand::UpdateService {
            cluster,
            service,
            desired_count,
            task_definition,
            force_new_deployment,
        } => {
            let result = bounded(
                "update-service",
                gateway.update_service(
                    &cluster,
                    &service,
                    desired_count,
                    task_definition.as_deref(),
                    force_new_deployment,
                ),
            )
            .await
            .map(|service| {
                format!(
                    "Updated {} (desired {})",
                    service.service_name, service.desired_count
                )
            });
            app.complete_mutation(result)
        }
        AppCommand::StopTask {
            cluster,
            task,
            reason,
        } => {
            let result = bounded("stop-task", gateway.stop_task(&cluster, &task, &reason))
                .await
                .map(|task| {
                    format!(
                        "Stopping task {} ({})",
                        model::short_arn(&task.task_arn),
                        task.desired_status
                    )
                });
            app.complete_mutation(result)
        }
        AppCommand::EditTaskDefinition { definition } => {
            match edit_and_register(tui, gateway, &definition).await {
                Ok(Some(message)) => app.complete_mutation(Ok(message)),
                Ok(None) => {
                    app.cancel_mutation("Task definition unchanged, nothing registered");
                    AppCommand::None
                }
                Err(error) => app.complete_mutation(Err(compact_error(&error))),
            }
        }
        AppCommand::ExecShell {
            cluster,
            task,
            container,
            shell,
        } => {
            let command = gateway.command(&[
                "ecs",
                "execute-command",
                "--cluster",
                cluster.as_str(),
                "--task",
                task.as_str(),
                "--container",
                container.as_str(),
                "--interactive",
                "--command",
                shell.as_str(),
            ]);
            info!(container = %container, "opening shell");
            let result = tui
                .run_interactive(command, "aws ecs execute-command")
                .await
                .and_then(|status| {
                    if status.success() {
                        Ok(())
                    } else {
                        Err(anyhow!("execute-command exited with {status}"))
                    }
                })
                .map_err(|error| compact_error(&error));
            app.finish_interactive(&format!("Shell in {container}"), result);
            AppCommand::None
        }
        AppCommand::TailLogs { source } => {
            let result = tail_logs(tui, gateway, &source)
                .await
                .map_err(|error| compact_error(&error));
            app.finish_interactive("Log tail", result);
            AppCommand::None
        }
        AppCommand::StartPortForward {
            cluster,
            task,
            runtime_id,
            container_id,
            remote_port,
            local_port,
        } => {
            let target = format!("ecs:{cluster}_{task}_{runtime_id}");
            match start_port_forward(gateway, &target, remote_port, local_port).await {
                Ok((session_id, pid, child)) => {
                    app.register_session(Session {
                        id: session_id.clone(),
                        local_port,
                        remote_port,
                        container_id,
                        pid: Some(pid),
                    });
                    watch_forward(child, pid, loop_tx.clone(), forwards);
                    app.complete_mutation(Ok(format!(
                        "Forwarding localhost:{local_port} -> {remote_port} ({session_id})"
                    )))
                }
                Err(error) => app.complete_mutation(Err(compact_error(&error))),
            }
        }
        AppCommand::TerminateSessions { sessions } => {
            let count = sessions.len();
            for session in sessions {
                terminate_session(gateway, forwards, &session).await;
            }
            app.complete_mutation(Ok(format!("Terminated {count} port forward(s)")))
        }
    };

    Ok(follow_up)
}

/// Runs a provider call under the provider timeout, flattening the error for
/// the engine.
async fn bounded<T>(
    what: &str,
    call: impl Future<Output = Result<T>>,
) -> std::result::Result<T, String> {
    match timeout(PROVIDER_TIMEOUT, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(compact_error(&error)),
        Err(_) => Err(format!(
            "{what} timed out after {}s",
            PROVIDER_TIMEOUT.as_secs()
        )),
    }
}

async fn tail_logs(tui: &mut Tui, gateway: &EcsGateway, source: &LogSource) -> Result<()> {
    let targets = match timeout(PROVIDER_TIMEOUT, gateway.resolve_log_targets(source)).await {
        Ok(targets) => targets?,
        Err(_) => bail!("resolving log configuration timed out"),
    };
    let Some(target) = targets.into_iter().next() else {
        bail!("no awslogs target found");
    };

    let mut args = vec![
        "logs".to_string(),
        "tail".to_string(),
        target.group.clone(),
        "--follow".to_string(),
    ];
    if !target.stream.is_empty() {
        args.extend(["--log-stream-name-prefix".to_string(), target.stream.clone()]);
    }
    if let Some(region) = &target.region {
        args.extend(["--region".to_string(), region.clone()]);
    }

    info!(group = %target.group, stream = %target.stream, "tailing logs");
    // Ctrl+C ends the tail with a non-zero status; only spawn failures count.
    tui.run_interactive(gateway.command(args.as_slice()), "aws logs tail")
        .await
        .map(|_| ())
}

async fn edit_and_register(
    tui: &mut Tui,
    gateway: &EcsGateway,
    definition: &model::TaskDefinition,
) -> Result<Option<String>> {
    let document = aws::registration_document(definition)?;
    let original =
        serde_json::to_string_pretty(&document).context("failed to render task definition")?;

    let mut file = tempfile::Builder::new()
        .prefix("ecsnav-taskdef-")
        .suffix(".json")
        .tempfile()
        .context("failed to create temporary task definition file")?;
    file.write_all(original.as_bytes())
        .and_then(|()| file.flush())
        .context("failed to write temporary task definition file")?;

    let status = tui
        .run_interactive(editor_command(file.path()), "editor")
        .await?;
    if !status.success() {
        bail!("editor exited with {status}");
    }

    let edited = fs::read_to_string(file.path()).context("failed to read edited task definition")?;
    if edited.trim() == original.trim() {
        return Ok(None);
    }
    serde_json::from_str::<serde_json::Value>(&edited)
        .context("edited task definition is not valid JSON")?;

    let registered = match timeout(PROVIDER_TIMEOUT, gateway.register_task_definition(file.path())).await {
        Ok(result) => result?,
        Err(_) => bail!("register-task-definition timed out"),
    };
    Ok(Some(format!(
        "Registered {}:{}",
        registered.family, registered.revision
    )))
}

fn editor_command(path: &Path) -> TokioCommand {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string());
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("vi");
    let mut command = TokioCommand::new(program);
    command.args(parts).arg(path);
    command
}

async fn start_port_forward(
    gateway: &EcsGateway,
    target: &str,
    remote_port: u16,
    local_port: u16,
) -> Result<(String, u32, Child)> {
    let parameters = serde_json::json!({
        "portNumber": [remote_port.to_string()],
        "localPortNumber": [local_port.to_string()],
    })
    .to_string();
    let mut command = gateway.command(&[
        "ssm",
        "start-session",
        "--target",
        target,
        "--document-name",
        "AWS-StartPortForwardingSession",
        "--parameters",
        parameters.as_str(),
    ]);
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|error| spawn_error(error, "aws ssm start-session"))?;

    let pid = child
        .id()
        .context("failed to determine process id for port forward")?;
    let stdout = child
        .stdout
        .take()
        .context("port forward stdout was not captured")?;
    let mut lines = BufReader::new(stdout).lines();

    let session_id = timeout(SESSION_START_TIMEOUT, async {
        while let Some(line) = lines.next_line().await? {
            if let Some(id) = parse_session_id(&line) {
                return Ok::<_, io::Error>(Some(id));
            }
        }
        Ok(None)
    })
    .await;

    let session_id = match session_id {
        Ok(Ok(Some(id))) => id,
        Ok(Ok(None)) | Ok(Err(_)) => {
            let stderr = read_stderr(&mut child).await;
            let _ = child.kill().await;
            if stderr.contains("SessionManagerPlugin") {
                bail!("session-manager-plugin is missing; install it to forward ports");
            }
            bail!("port forward to {target} failed: {}", stderr.trim());
        }
        Err(_) => {
            let _ = child.kill().await;
            bail!("port forward to {target} did not start in time");
        }
    };

    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(pid, line = %line, "port forward output");
        }
    });

    Ok((session_id, pid, child))
}

async fn read_stderr(child: &mut Child) -> String {
    let Some(stderr) = child.stderr.take() else {
        return String::new();
    };
    let mut lines = BufReader::new(stderr).lines();
    let mut collected = Vec::new();
    while let Ok(Ok(Some(line))) = timeout(Duration::from_secs(2), lines.next_line()).await {
        collected.push(line);
    }
    collected.join("\n")
}

fn parse_session_id(line: &str) -> Option<String> {
    let (_, rest) = line.split_once("SessionId:")?;
    let id = rest.trim().trim_end_matches('.');
    (!id.is_empty()).then(|| id.to_string())
}

fn watch_forward(
    mut child: Child,
    pid: u32,
    tx: mpsc::UnboundedSender<LoopEvent>,
    forwards: &mut ForwardProcesses,
) {
    let (kill_tx, kill_rx) = oneshot::channel::<()>();
    forwards.insert(pid, kill_tx);
    tokio::spawn(async move {
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = kill_rx => None,
        };
        let result = match exited {
            Some(status) => status.map_err(|error| format!("wait failed: {error}")),
            None => {
                let _ = child.kill().await;
                Err("terminated".to_string())
            }
        };
        let _ = tx.send(LoopEvent::SessionExited { pid, result });
    });
}

async fn terminate_session(gateway: &EcsGateway, forwards: &mut ForwardProcesses, session: &Session) {
    match timeout(PROVIDER_TIMEOUT, gateway.terminate_session(&session.id)).await {
        Ok(Ok(())) => info!(session = %session.id, "port forward terminated"),
        Ok(Err(error)) => warn!(session = %session.id, "terminate-session failed: {}", compact_error(&error)),
        Err(_) => warn!(session = %session.id, "terminate-session timed out"),
    }
    if let Some(kill) = session.pid.and_then(|pid| forwards.remove(&pid)) {
        let _ = kill.send(());
    }
}

/// Port forwards are torn down however the loop ended.
async fn finish_run(
    run_result: Result<()>,
    app: &mut App,
    gateway: &EcsGateway,
    forwards: &mut ForwardProcesses,
) -> Result<()> {
    if let Err(error) = &run_result {
        warn!("event loop failed: {}", compact_error(error));
    }
    shutdown_sessions(app, gateway, forwards).await;
    run_result
}

async fn shutdown_sessions(app: &mut App, gateway: &EcsGateway, forwards: &mut ForwardProcesses) {
    let sessions = app.take_all_sessions();
    if !sessions.is_empty() {
        info!(count = sessions.len(), "terminating port forwards before exit");
    }
    for session in &sessions {
        terminate_session(gateway, forwards, session).await;
    }
    for (_, kill) in forwards.drain() {
        let _ = kill.send(());
    }
}

fn spawn_error(error: io::Error, label: &str) -> anyhow::Error {
    if error.kind() == ErrorKind::NotFound {
        let program = label.split_whitespace().next().unwrap_or(label);
        anyhow!("{program} not found in PATH; install it to use {label}")
    } else {
        anyhow!(error).context(format!("failed to start {label}"))
    }
}

fn compact_error(error: &anyhow::Error) -> String {
    error
        .chain()
        .take(3)
        .enumerate()
        .map(|(index, cause)| {
            if index == 0 {
                cause.to_string()
            } else {
                format!("caused by: {cause}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{ForwardProcesses, compact_error, finish_run, parse_session_id, spawn_error};
    use crate::app::{App, EngineConfig};
    use crate::aws::EcsGateway;
    use crate::session::Session;
    use anyhow::{Context, anyhow};
    use std::io;
    use tokio::sync::oneshot;

    #[test]
    fn session_id_is_read_from_the_start_banner() {
        assert_eq!(
            parse_session_id("Starting session with SessionId: dev-0a1b2c3d4e"),
            Some("dev-0a1b2c3d4e".to_string())
        );
        assert_eq!(
            parse_session_id("Port 8080 opened for sessionId dev-0a1b2c3d4e."),
            None
        );
        assert_eq!(parse_session_id("SessionId:   "), None);
    }

    #[test]
    fn compact_error_keeps_three_chain_entries() {
        let error = Err::<(), _>(anyhow!("root"))
            .context("middle")
            .context("outer")
            .context("top")
            .expect_err("error");
        assert_eq!(
            compact_error(&error),
            "top\ncaused by: outer\ncaused by: middle"
        );
    }

    #[test]
    fn missing_binary_mentions_the_program() {
        let error = spawn_error(
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
            "aws ssm start-session",
        );
        assert!(error.to_string().starts_with("aws not found in PATH"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_loop_still_tears_down_port_forwards() {
        let mut app = App::new(EngineConfig::default());
        app.register_session(Session {
            id: "dev-0a1b2c3d4e".to_string(),
            local_port: 8080,
            remote_port: 80,
            container_id: "prod.c1".to_string(),
            pid: Some(4242),
        });
        let (kill_tx, kill_rx) = oneshot::channel();
        let (orphan_tx, orphan_rx) = oneshot::channel();
        let mut forwards = ForwardProcesses::new();
        forwards.insert(4242, kill_tx);
        forwards.insert(4343, orphan_tx);
        let gateway = EcsGateway::new(Some("ecsnav-missing-profile".to_string()), None);

        let result = finish_run(
            Err(anyhow!("terminal draw failed")),
            &mut app,
            &gateway,
            &mut forwards,
        )
        .await;

        let error = result.expect_err("loop error is kept");
        assert_eq!(error.to_string(), "terminal draw failed");
        assert!(app.sessions().is_empty());
        assert!(forwards.is_empty());
        assert_eq!(kill_rx.await, Ok(()));
        assert_eq!(orphan_rx.await, Ok(()));
    }
}
