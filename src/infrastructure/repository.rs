use crate::domain::models::{DaySelector, FixedBlock, Priority, Task};
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedBacklog {
    pub tasks: Vec<Task>,
    pub fixed_blocks: Vec<FixedBlock>,
    // True when malformed stored content forced a reset to empty
    // collections; the caller logs the warning.
    pub recovered: bool,
}

pub trait BacklogRepository: Send + Sync {
    fn load(&self) -> Result<LoadedBacklog, InfraError>;
    fn save(&self, tasks: &[Task], fixed_blocks: &[FixedBlock]) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteBacklogRepository {
    db_path: PathBuf,
}

type TaskRow = (
    String,
    String,
    Option<String>,
    String,
    String,
    i64,
    Option<String>,
    i64,
    i64,
    Option<String>,
);

type FixedBlockRow = (String, String, String, String, String);

impl SqliteBacklogRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }

    fn load_task_rows(connection: &Connection) -> Result<Vec<TaskRow>, InfraError> {
        let mut statement = connection.prepare(
            "SELECT id, name, description, priority, deadline, estimated_minutes,
                    category, completed, remaining_minutes, last_scheduled_on
             FROM tasks ORDER BY id",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn load_fixed_block_rows(connection: &Connection) -> Result<Vec<FixedBlockRow>, InfraError> {
        let mut statement = connection.prepare(
            "SELECT id, day, label, start_time, end_time FROM fixed_blocks ORDER BY id",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn task_from_row(row: TaskRow) -> Option<Task> {
    let (
        id,
        name,
        description,
        priority_raw,
        deadline_raw,
        estimated_raw,
        category,
        completed_raw,
        remaining_raw,
        last_scheduled_raw,
    ) = row;

    let priority = Priority::parse(&priority_raw)?;
    let deadline = DateTime::parse_from_rfc3339(&deadline_raw)
        .ok()?
        .with_timezone(&Utc);
    let estimated_minutes = u32::try_from(estimated_raw).ok()?;
    let remaining_minutes = u32::try_from(remaining_raw).ok()?;
    let last_scheduled_on = match last_scheduled_raw {
        Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()?),
        None => None,
    };

    let task = Task {
        id,
        name,
        description,
        priority,
        deadline,
        estimated_minutes,
        category,
        completed: completed_raw != 0,
        remaining_minutes,
        last_scheduled_on,
    };
    task.validate().ok()?;
    Some(task)
}

fn fixed_block_from_row(row: FixedBlockRow) -> Option<FixedBlock> {
    let (id, day_raw, label, start, end) = row;
    let block = FixedBlock {
        id,
        day: DaySelector::parse(&day_raw)?,
        label,
        start,
        end,
    };
    block.validate().ok()?;
    Some(block)
}

impl BacklogRepository for SqliteBacklogRepository {
    fn load(&self) -> Result<LoadedBacklog, InfraError> {
        let connection = self.connect()?;
        let task_rows = Self::load_task_rows(&connection)?;
        let block_rows = Self::load_fixed_block_rows(&connection)?;

        let mut tasks = Vec::with_capacity(task_rows.len());
        for row in task_rows {
            let Some(task) = task_from_row(row) else {
                return Ok(LoadedBacklog {
                    recovered: true,
                    ..LoadedBacklog::default()
                });
            };
            tasks.push(task);
        }

        let mut fixed_blocks = Vec::with_capacity(block_rows.len());
        for row in block_rows {
            let Some(block) = fixed_block_from_row(row) else {
                return Ok(LoadedBacklog {
                    recovered: true,
                    ..LoadedBacklog::default()
                });
            };
            fixed_blocks.push(block);
        }

        Ok(LoadedBacklog {
            tasks,
            fixed_blocks,
            recovered: false,
        })
    }

    fn save(&self, tasks: &[Task], fixed_blocks: &[FixedBlock]) -> Result<(), InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;

        transaction.execute("DELETE FROM tasks", [])?;
        transaction.execute("DELETE FROM fixed_blocks", [])?;

        for task in tasks {
            transaction.execute(
                "INSERT INTO tasks (id, name, description, priority, deadline,
                                    estimated_minutes, category, completed,
                                    remaining_minutes, last_scheduled_on)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    task.id,
                    task.name,
                    task.description,
                    task.priority.as_str(),
                    task.deadline.to_rfc3339(),
                    task.estimated_minutes,
                    task.category,
                    task.completed as i64,
                    task.remaining_minutes,
                    task.last_scheduled_on.map(|date| date.to_string()),
                ],
            )?;
        }
        for block in fixed_blocks {
            transaction.execute(
                "INSERT INTO fixed_blocks (id, day, label, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    block.id,
                    block.day.as_str(),
                    block.label,
                    block.start,
                    block.end,
                ],
            )?;
        }

        transaction.commit()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBacklogRepository {
    state: Mutex<(Vec<Task>, Vec<FixedBlock>)>,
}

impl BacklogRepository for InMemoryBacklogRepository {
    fn load(&self) -> Result<LoadedBacklog, InfraError> {
        let state = self.state.lock().map_err(|error| {
            InfraError::InvalidInput(format!("backlog lock poisoned: {error}"))
        })?;
        Ok(LoadedBacklog {
            tasks: state.0.clone(),
            fixed_blocks: state.1.clone(),
            recovered: false,
        })
    }

    fn save(&self, tasks: &[Task], fixed_blocks: &[FixedBlock]) -> Result<(), InfraError> {
        let mut state = self.state.lock().map_err(|error| {
            InfraError::InvalidInput(format!("backlog lock poisoned: {error}"))
        })?;
        *state = (tasks.to_vec(), fixed_blocks.to_vec());
        Ok(())
    }
}
