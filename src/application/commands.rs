use crate::application::bootstrap::bootstrap_workspace;
use crate::application::scheduler::{self, PacingPolicy};
use crate::domain::models::{DaySelector, FixedBlock, Priority, ScheduledActivity, Task};
use crate::infrastructure::clock::{Clock, SystemClock};
use crate::infrastructure::config::read_policies;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::ids::{CounterIdGenerator, IdGenerator};
use crate::infrastructure::repository::{
    BacklogRepository, LoadedBacklog, SqliteBacklogRepository,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct PlannerState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    repository: Arc<dyn BacklogRepository>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl PlannerState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Self::with_ports(
            workspace_root,
            Arc::new(SqliteBacklogRepository::new(bootstrap.database_path)),
            Arc::new(SystemClock),
            Arc::new(CounterIdGenerator::default()),
        )
    }

    pub fn with_ports(
        workspace_root: PathBuf,
        repository: Arc<dyn BacklogRepository>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, InfraError> {
        bootstrap_workspace(&workspace_root)?;
        Ok(Self {
            config_dir: workspace_root.join("config"),
            logs_dir: workspace_root.join("logs"),
            repository,
            clock,
            ids,
            runtime: Mutex::new(RuntimeState::default()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_warn(&self, command: &str, message: &str) {
        self.append_log("warn", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": self.clock.now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn load_backlog(&self, command: &str) -> Result<LoadedBacklog, InfraError> {
        let loaded = self.repository.load()?;
        if loaded.recovered {
            self.log_warn(
                command,
                "stored backlog was malformed; reset to empty collections",
            );
        }
        Ok(loaded)
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    timer: Option<ActiveTimer>,
}

#[derive(Debug, Clone)]
struct ActiveTimer {
    task_id: String,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerStateResponse {
    pub task_id: Option<String>,
    pub started_at: Option<String>,
    pub running: bool,
}

pub fn create_fixed_block_impl(
    state: &PlannerState,
    day: String,
    label: String,
    start: String,
    end: String,
) -> Result<FixedBlock, InfraError> {
    let Some(day) = DaySelector::parse(&day) else {
        return Err(InfraError::InvalidInput(format!(
            "unsupported day selector: {}",
            day.trim()
        )));
    };

    let block = FixedBlock {
        id: state.ids.next_id("blk"),
        day,
        label: label.trim().to_string(),
        start: start.trim().to_string(),
        end: end.trim().to_string(),
    };
    block.validate().map_err(InfraError::InvalidInput)?;

    let mut backlog = state.load_backlog("create_fixed_block")?;
    backlog.fixed_blocks.push(block.clone());
    state
        .repository
        .save(&backlog.tasks, &backlog.fixed_blocks)?;

    state.log_info(
        "create_fixed_block",
        &format!("created fixed_block_id={}", block.id),
    );
    Ok(block)
}

pub fn list_fixed_blocks_impl(state: &PlannerState) -> Result<Vec<FixedBlock>, InfraError> {
    let mut blocks = state.load_backlog("list_fixed_blocks")?.fixed_blocks;
    blocks.sort_by(|left, right| {
        left.start
            .cmp(&right.start)
            .then_with(|| left.label.cmp(&right.label))
    });
    Ok(blocks)
}

pub fn delete_fixed_block_impl(
    state: &PlannerState,
    block_id: String,
) -> Result<bool, InfraError> {
    let block_id = block_id.trim();
    if block_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "block_id must not be empty".to_string(),
        ));
    }

    let mut backlog = state.load_backlog("delete_fixed_block")?;
    let before = backlog.fixed_blocks.len();
    backlog.fixed_blocks.retain(|block| block.id != block_id);
    if backlog.fixed_blocks.len() == before {
        return Ok(false);
    }
    state
        .repository
        .save(&backlog.tasks, &backlog.fixed_blocks)?;

    state.log_info(
        "delete_fixed_block",
        &format!("deleted fixed_block_id={block_id}"),
    );
    Ok(true)
}

pub fn create_task_impl(
    state: &PlannerState,
    name: String,
    description: Option<String>,
    priority: String,
    deadline: String,
    estimated_minutes: u32,
    category: Option<String>,
) -> Result<Task, InfraError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InfraError::InvalidInput(
            "name must not be empty".to_string(),
        ));
    }
    let Some(priority) = Priority::parse(&priority) else {
        return Err(InfraError::InvalidInput(format!(
            "unsupported priority: {}",
            priority.trim()
        )));
    };
    let deadline = parse_datetime_input(&deadline, "deadline")?;
    if estimated_minutes == 0 {
        return Err(InfraError::InvalidInput(
            "estimated_minutes must be > 0".to_string(),
        ));
    }
    if deadline <= state.clock.now() {
        return Err(InfraError::InvalidInput(
            "deadline must be in the future".to_string(),
        ));
    }

    let task = Task {
        id: state.ids.next_id("tsk"),
        name: name.to_string(),
        description: normalized_optional(description),
        priority,
        deadline,
        estimated_minutes,
        category: normalized_optional(category),
        completed: false,
        remaining_minutes: estimated_minutes,
        last_scheduled_on: None,
    };
    task.validate().map_err(InfraError::InvalidInput)?;

    let mut backlog = state.load_backlog("create_task")?;
    backlog.tasks.push(task.clone());
    state
        .repository
        .save(&backlog.tasks, &backlog.fixed_blocks)?;

    state.log_info("create_task", &format!("created task_id={}", task.id));
    Ok(task)
}

pub fn list_tasks_impl(state: &PlannerState) -> Result<Vec<Task>, InfraError> {
    let mut tasks = state.load_backlog("list_tasks")?.tasks;
    tasks.sort_by(|left, right| {
        left.priority
            .rank()
            .cmp(&right.priority.rank())
            .then(left.deadline.cmp(&right.deadline))
    });
    Ok(tasks)
}

pub fn update_task_impl(
    state: &PlannerState,
    task_id: String,
    name: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    deadline: Option<String>,
    estimated_minutes: Option<u32>,
    category: Option<String>,
) -> Result<Task, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "task_id must not be empty".to_string(),
        ));
    }

    let mut backlog = state.load_backlog("update_task")?;
    let Some(task) = backlog.tasks.iter_mut().find(|task| task.id == task_id) else {
        return Err(InfraError::InvalidInput(format!(
            "task not found: {task_id}"
        )));
    };

    if let Some(name) = name {
        let name = name.trim();
        if name.is_empty() {
            return Err(InfraError::InvalidInput(
                "name must not be empty".to_string(),
            ));
        }
        task.name = name.to_string();
    }
    if let Some(description) = description {
        task.description = normalized_optional(Some(description));
    }
    if let Some(priority) = priority {
        let Some(parsed) = Priority::parse(&priority) else {
            return Err(InfraError::InvalidInput(format!(
                "unsupported priority: {}",
                priority.trim()
            )));
        };
        task.priority = parsed;
    }
    if let Some(deadline) = deadline {
        task.deadline = parse_datetime_input(&deadline, "deadline")?;
    }
    if let Some(estimated) = estimated_minutes {
        if estimated == 0 {
            return Err(InfraError::InvalidInput(
                "estimated_minutes must be > 0".to_string(),
            ));
        }
        task.estimated_minutes = estimated;
        task.remaining_minutes = task.remaining_minutes.min(estimated);
    }
    if let Some(category) = category {
        task.category = normalized_optional(Some(category));
    }
    task.validate().map_err(InfraError::InvalidInput)?;

    let updated = task.clone();
    state
        .repository
        .save(&backlog.tasks, &backlog.fixed_blocks)?;
    state.log_info("update_task", &format!("updated task_id={task_id}"));
    Ok(updated)
}

pub fn complete_task_impl(state: &PlannerState, task_id: String) -> Result<Task, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "task_id must not be empty".to_string(),
        ));
    }

    let mut backlog = state.load_backlog("complete_task")?;
    let Some(task) = backlog.tasks.iter_mut().find(|task| task.id == task_id) else {
        return Err(InfraError::InvalidInput(format!(
            "task not found: {task_id}"
        )));
    };

    task.remaining_minutes = 0;
    task.completed = true;
    let updated = task.clone();
    state
        .repository
        .save(&backlog.tasks, &backlog.fixed_blocks)?;

    state.log_info("complete_task", &format!("completed task_id={task_id}"));
    Ok(updated)
}

pub fn delete_task_impl(state: &PlannerState, task_id: String) -> Result<bool, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "task_id must not be empty".to_string(),
        ));
    }

    let mut backlog = state.load_backlog("delete_task")?;
    let before = backlog.tasks.len();
    backlog.tasks.retain(|task| task.id != task_id);
    if backlog.tasks.len() == before {
        return Ok(false);
    }
    state
        .repository
        .save(&backlog.tasks, &backlog.fixed_blocks)?;

    let mut runtime = lock_runtime(state)?;
    if runtime
        .timer
        .as_ref()
        .is_some_and(|timer| timer.task_id == task_id)
    {
        runtime.timer = None;
    }
    drop(runtime);

    state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    Ok(true)
}

// Loads the backlog, synthesizes the day's timeline and writes the consumed
// remaining-minutes back through the repository. Persisting the mutation is
// part of the contract, not an optimization.
pub fn generate_schedule_impl(
    state: &PlannerState,
    date: String,
    now: Option<String>,
) -> Result<Vec<ScheduledActivity>, InfraError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|error| InfraError::InvalidInput(format!("date must be YYYY-MM-DD: {error}")))?;
    let now = match now {
        Some(raw) => parse_datetime_input(&raw, "now")?,
        None => state.clock.now(),
    };

    let mut backlog = state.load_backlog("generate_schedule")?;
    let policy = load_pacing_policy(state.config_dir());
    let activities = scheduler::generate_daily_schedule(
        date,
        now,
        &mut backlog.tasks,
        &backlog.fixed_blocks,
        &policy,
        state.ids.as_ref(),
    );
    state
        .repository
        .save(&backlog.tasks, &backlog.fixed_blocks)?;

    state.log_info(
        "generate_schedule",
        &format!("generated {} activities for {date}", activities.len()),
    );
    Ok(activities)
}

pub fn start_timer_impl(
    state: &PlannerState,
    task_id: String,
) -> Result<TimerStateResponse, InfraError> {
    let task_id = task_id.trim();
    if task_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "task_id must not be empty".to_string(),
        ));
    }

    let backlog = state.load_backlog("start_timer")?;
    let Some(task) = backlog.tasks.iter().find(|task| task.id == task_id) else {
        return Err(InfraError::InvalidInput(format!(
            "task not found: {task_id}"
        )));
    };
    if !task.is_pending() {
        return Err(InfraError::InvalidInput(format!(
            "task has no remaining work: {task_id}"
        )));
    }

    let mut runtime = lock_runtime(state)?;
    if runtime.timer.is_some() {
        return Err(InfraError::InvalidInput(
            "timer is already running".to_string(),
        ));
    }
    runtime.timer = Some(ActiveTimer {
        task_id: task_id.to_string(),
        started_at: state.clock.now(),
    });
    let response = to_timer_state_response(&runtime.timer);
    drop(runtime);

    state.log_info("start_timer", &format!("started timer task_id={task_id}"));
    Ok(response)
}

// Applies the elapsed wall-clock minutes to the task's remaining duration
// through the same progress rule the pacer uses.
pub fn stop_timer_impl(state: &PlannerState) -> Result<Task, InfraError> {
    let timer = {
        let mut runtime = lock_runtime(state)?;
        runtime.timer.take()
    };
    let Some(timer) = timer else {
        return Err(InfraError::InvalidInput("timer is not running".to_string()));
    };

    let elapsed = (state.clock.now() - timer.started_at).num_minutes().max(0);
    let elapsed_minutes = u32::try_from(elapsed).unwrap_or(u32::MAX);

    let mut backlog = state.load_backlog("stop_timer")?;
    let Some(task) = backlog
        .tasks
        .iter_mut()
        .find(|task| task.id == timer.task_id)
    else {
        return Err(InfraError::InvalidInput(format!(
            "task not found: {}",
            timer.task_id
        )));
    };
    task.record_progress(elapsed_minutes);
    let updated = task.clone();
    state
        .repository
        .save(&backlog.tasks, &backlog.fixed_blocks)?;

    state.log_info(
        "stop_timer",
        &format!(
            "stopped timer task_id={} elapsed_minutes={elapsed_minutes}",
            timer.task_id
        ),
    );
    Ok(updated)
}

pub fn get_timer_state_impl(state: &PlannerState) -> Result<TimerStateResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(to_timer_state_response(&runtime.timer))
}

fn lock_runtime(state: &PlannerState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidInput(format!("runtime lock poisoned: {error}")))
}

fn to_timer_state_response(timer: &Option<ActiveTimer>) -> TimerStateResponse {
    TimerStateResponse {
        task_id: timer.as_ref().map(|timer| timer.task_id.clone()),
        started_at: timer
            .as_ref()
            .map(|timer| timer.started_at.to_rfc3339()),
        running: timer.is_some(),
    }
}

fn normalized_optional(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn parse_datetime_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight")));
    }
    Err(InfraError::InvalidInput(format!(
        "{field_name} must be RFC3339 or YYYY-MM-DD"
    )))
}

fn load_pacing_policy(config_dir: &Path) -> PacingPolicy {
    let mut policy = PacingPolicy::default();
    let Ok(parsed) = read_policies(config_dir) else {
        return policy;
    };

    if let Some(pacing) = parsed.get("pacing") {
        if let Some(value) = pacing
            .get("minChunkMinutes")
            .and_then(serde_json::Value::as_u64)
        {
            policy.min_chunk_minutes = value.max(1) as u32;
        }
        if let Some(value) = pacing
            .get("chunkCeilingMinutes")
            .and_then(serde_json::Value::as_u64)
        {
            policy.chunk_ceiling_minutes = (value as u32).max(policy.min_chunk_minutes);
        }
        if let Some(value) = pacing
            .get("breakMinutes")
            .and_then(serde_json::Value::as_u64)
        {
            policy.break_minutes = value as u32;
        }
        if let Some(value) = pacing
            .get("bufferDays")
            .and_then(serde_json::Value::as_u64)
        {
            policy.buffer_days = value as u32;
        }
    }
    if let Some(revision) = parsed.get("revision") {
        if let Some(value) = revision
            .get("blockMinutes")
            .and_then(serde_json::Value::as_u64)
        {
            policy.revision_block_minutes = value.max(1) as u32;
        }
    }

    policy
}
