use anyhow::{Context, Result};
use gridsync::{EngineConfig, InMemoryStore, ManualClock, Resolution, TableSession};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;

const SEED_COLUMNS: &[&str] = &["Name", "Age", "Email"];
const SEED_ROWS: usize = 3;
const WORDS: &[&str] = &["alpha", "bravo", "charlie", "delta", "echo", "42", "7", "2024-05-01", ""];

struct Config {
    script: Option<String>,
    random: Option<usize>,
    seed: u64,
    engine_config: Option<String>,
    manual: bool,
    output_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            script: None,
            random: None,
            seed: 1,
            engine_config: None,
            manual: false,
            output_file: None,
        }
    }
}

/// One scripted user action. Rows and columns are addressed by position in
/// the table as currently shown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum Action {
    UpdateCell { row: usize, column: usize, value: String },
    AddRow,
    DeleteRow { row: usize },
    AddColumn,
    DeleteColumn { column: usize },
    RenameColumn { column: usize, name: String },
    Select { from: (usize, usize), to: (usize, usize) },
    DeleteSelection,
    Undo,
    Redo,
    Search { term: String },
    ToggleColumn { column: usize },
    /// Moves the clock forward.
    Wait { ms: u64 },
    /// Resolves every outstanding remote call.
    Settle,
}

fn parse_args() -> Result<Config> {
    let args: Vec<String> = env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-script" => {
                i += 1;
                if i >= args.len() {
                    anyhow::bail!("-script requires an argument");
                }
                config.script = Some(args[i].clone());
            }
            "-random" => {
                i += 1;
                if i >= args.len() {
                    anyhow::bail!("-random requires an argument");
                }
                config.random = Some(args[i].parse()?);
            }
            "-seed" => {
                i += 1;
                if i >= args.len() {
                    anyhow::bail!("-seed requires an argument");
                }
                config.seed = args[i].parse()?;
            }
            "-config" => {
                i += 1;
                if i >= args.len() {
                    anyhow::bail!("-config requires an argument");
                }
                config.engine_config = Some(args[i].clone());
            }
            "-manual" => {
                config.manual = true;
            }
            "-o" => {
                i += 1;
                if i >= args.len() {
                    anyhow::bail!("-o requires an argument");
                }
                config.output_file = Some(args[i].clone());
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            _ => {
                anyhow::bail!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    if config.script.is_none() && config.random.is_none() {
        anyhow::bail!("one of -script or -random is required");
    }
    Ok(config)
}

fn print_usage() {
    println!("Usage: gridsync-replay [options]");
    println!();
    println!("Options:");
    println!("  -script <file>   JSON array of actions to replay");
    println!("  -random <n>      Replay <n> random actions");
    println!("  -seed <n>        Seed for -random (default: 1)");
    println!("  -config <file>   Engine config JSON (default: per-user config)");
    println!("  -manual          Resolve remote calls only on \"settle\" actions");
    println!("  -o <file>        Write the result to <file> instead of stdout");
    println!("  -h, --help       Show this help message");
}

fn main() -> Result<()> {
    env_logger::init();
    let config = parse_args()?;

    let engine_config = match &config.engine_config {
        Some(path) => EngineConfig::load(std::path::Path::new(path))?,
        None => EngineConfig::load_default()?,
    };
    let actions = match (&config.script, config.random) {
        (Some(path), _) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read script: {}", path))?;
            serde_json::from_str::<Vec<Action>>(&text).with_context(|| format!("Invalid script: {}", path))?
        }
        (None, Some(count)) => random_actions(count, config.seed),
        (None, None) => Vec::new(),
    };

    let store = InMemoryStore::new();
    let base = store.create_base("Replay");
    store
        .seed_table(&base, SEED_COLUMNS, SEED_ROWS)
        .context("Failed to seed table")?;
    let clock = ManualClock::new();
    let mut session = TableSession::new(
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        engine_config.clone(),
        &base,
    );
    session.open(None);
    session.poll();
    if config.manual {
        store.set_resolution(Resolution::Manual);
    }

    info!("replaying {} actions", actions.len());
    for action in &actions {
        apply(&mut session, &store, &clock, action);
        session.poll();
    }
    settle(&mut session, &store, &clock, engine_config.debounce_ms);

    let grid = session.visible_grid();
    let report = serde_json::json!({
        "actions": actions,
        "columns": session.columns(),
        "rows": session.rows(),
        "grid": grid,
        "calls": store.calls(),
    });
    let text = serde_json::to_string_pretty(&report)?;
    match &config.output_file {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write output: {}", path))?;
            println!("Result written to: {}", path);
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn apply(session: &mut TableSession, store: &InMemoryStore, clock: &ManualClock, action: &Action) {
    let grid = session.visible_grid();
    let row = |i: usize| grid.row_ids.get(i).cloned();
    let column = |i: usize| grid.column_ids.get(i).cloned();

    match action {
        Action::UpdateCell { row: r, column: c, value } => match (row(*r), column(*c)) {
            (Some(row_id), Some(column_id)) => session.update_cell(&row_id, &column_id, value.as_str()),
            _ => warn!("no cell at ({}, {})", r, c),
        },
        Action::AddRow => {
            session.add_row();
        }
        Action::DeleteRow { row: r } => match row(*r) {
            Some(row_id) => {
                session.delete_row(&row_id);
            }
            None => warn!("no row at {}", r),
        },
        Action::AddColumn => {
            session.add_column();
        }
        Action::DeleteColumn { column: c } => match column(*c) {
            Some(column_id) => {
                session.delete_column(&column_id);
            }
            None => warn!("no column at {}", c),
        },
        Action::RenameColumn { column: c, name } => match column(*c) {
            Some(column_id) => {
                session.update_column_name(&column_id, name);
            }
            None => warn!("no column at {}", c),
        },
        Action::Select { from, to } => match (row(from.0), column(from.1), row(to.0), column(to.1)) {
            (Some(r0), Some(c0), Some(r1), Some(c1)) => {
                session.start_selection(&r0, &c0);
                session.update_selection(&r1, &c1);
                session.end_selection();
            }
            _ => warn!("selection {:?}..{:?} is outside the grid", from, to),
        },
        Action::DeleteSelection => {
            session.delete_selected_cells();
        }
        Action::Undo => {
            session.undo();
        }
        Action::Redo => {
            session.redo();
        }
        Action::Search { term } => session.set_search(term),
        Action::ToggleColumn { column: c } => match column(*c) {
            Some(column_id) => {
                session.edit_view(|view, _| view.toggle_column(&column_id));
            }
            None => warn!("no column at {}", c),
        },
        Action::Wait { ms } => clock.advance_ms(*ms),
        Action::Settle => {
            store.resolve_all();
        }
    }
}

/// Sends every pending write and resolves calls until nothing is left.
fn settle(session: &mut TableSession, store: &InMemoryStore, clock: &ManualClock, debounce_ms: u64) {
    clock.advance_ms(debounce_ms);
    session.flush();
    loop {
        let resolved = store.resolve_all();
        let events = session.poll();
        if resolved == 0 && events.is_empty() && store.pending_count() == 0 {
            break;
        }
    }
}

fn random_actions(count: usize, seed: u64) -> Vec<Action> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut actions = Vec::with_capacity(count);
    let mut rows = SEED_ROWS;
    let mut columns = SEED_COLUMNS.len();

    for _ in 0..count {
        let action = match rng.gen_range(0..100) {
            0..=44 => Action::UpdateCell {
                row: rng.gen_range(0..rows.max(1)),
                column: rng.gen_range(0..columns.max(1)),
                value: WORDS[rng.gen_range(0..WORDS.len())].to_string(),
            },
            45..=52 => {
                rows += 1;
                Action::AddRow
            }
            53..=57 if rows > 1 => {
                rows -= 1;
                Action::DeleteRow {
                    row: rng.gen_range(0..rows),
                }
            }
            58..=61 => {
                columns += 1;
                Action::AddColumn
            }
            62..=64 if columns > 1 => {
                columns -= 1;
                Action::DeleteColumn {
                    column: rng.gen_range(0..columns),
                }
            }
            65..=68 => Action::RenameColumn {
                column: rng.gen_range(0..columns),
                name: format!("Field {}", rng.gen_range(1..100)),
            },
            69..=74 => {
                let a = (rng.gen_range(0..rows), rng.gen_range(0..columns));
                let b = (rng.gen_range(0..rows), rng.gen_range(0..columns));
                Action::Select { from: a, to: b }
            }
            75..=78 => Action::DeleteSelection,
            79..=85 => Action::Undo,
            86..=90 => Action::Redo,
            91..=95 => Action::Wait {
                ms: rng.gen_range(50..500),
            },
            _ => Action::Settle,
        };
        actions.push(action);
    }
    actions
}
