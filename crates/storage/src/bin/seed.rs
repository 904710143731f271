use std::fmt;

use progress_core::model::{Program, ProgramId, Task, TaskId};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    program_id: ProgramId,
    title: String,
    tasks: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidProgramId { raw: String },
    InvalidTasks { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidProgramId { raw } => write!(f, "invalid --program-id value: {raw}"),
            ArgsError::InvalidTasks { raw } => write!(f, "invalid --tasks value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PROGRESS_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut program_id = std::env::var("PROGRESS_PROGRAM_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| ProgramId::new(1), ProgramId::new);
        let mut title =
            std::env::var("PROGRESS_PROGRAM_TITLE").unwrap_or_else(|_| "Data Analytics".into());
        let mut tasks = std::env::var("PROGRESS_TASKS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--program-id" => {
                    let value = require_value(&mut args, "--program-id")?;
                    program_id = value
                        .parse::<u64>()
                        .map(ProgramId::new)
                        .map_err(|_| ArgsError::InvalidProgramId { raw: value })?;
                }
                "--title" => {
                    title = require_value(&mut args, "--title")?;
                }
                "--tasks" => {
                    let value = require_value(&mut args, "--tasks")?;
                    tasks = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidTasks { raw: value })?;
                }
                other => return Err(ArgsError::UnknownArg(other.to_string())),
            }
        }

        Ok(Self {
            db_url,
            program_id,
            title,
            tasks,
        })
    }
}

const SAMPLE_TASKS: [&str; 5] = [
    "Explore the dataset",
    "Clean and prepare the data",
    "Build the analysis notebook",
    "Summarize findings for stakeholders",
    "Present your recommendation",
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse()?;

    let storage = Storage::sqlite(&args.db_url).await?;

    let mut tasks = Vec::with_capacity(args.tasks as usize);
    for i in 0..args.tasks {
        let idx = (i as usize) % SAMPLE_TASKS.len();
        tasks.push(Task::new(
            TaskId::new(args.program_id.value() * 100 + u64::from(i) + 1),
            args.program_id,
            i + 1,
            SAMPLE_TASKS[idx],
            None,
        )?);
    }
    let program = Program::new(args.program_id, args.title.clone(), tasks)?;
    storage.programs.upsert_program(&program).await?;

    println!(
        "Seeded program {} ({}) with {} tasks into {}",
        args.program_id.value(),
        args.title,
        args.tasks,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
