use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};

use clap::{Args, Parser, Subcommand};
use glam::{DVec2, DVec3};
use sceneboard::command::Command as EditorCommand;
use sceneboard::config::{ConfigError, EditorConfig};
use sceneboard::engine::{Action, EditorCore};
use sceneboard::input::{PointerEvent, PointerKind};
use sceneboard::shape::{ShapeError, ShapeId};
use serde::{Deserialize, Serialize};


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to {action} {path}: {source}")]
    Io { action: &'static str, path: String, source: io::Error },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("line {line}: invalid step: {source}")]
    Step { line: usize, source: serde_json::Error },
    #[error("line {line}: {source}")]
    Shape { line: usize, source: ShapeError },
    #[error("failed to render summary: {0}")]
    Summary(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "sceneboard-cli", about = "Headless scene editor script runner")]
struct Cli {
    /// JSON editor config; defaults apply when absent.
    #[arg(long, env = "SCENEBOARD_CONFIG", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON-lines script and print the resulting scene.
    Run(RunCommand),
    /// Print the effective config.
    Config,
    /// Print the panel buttons as script-ready command lines.
    Panel,
}

#[derive(Args, Debug)]
struct RunCommand {
    /// Script path, or `-` for stdin.
    #[arg(long, default_value = "-")]
    script: String,
}

/// One line of a script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum Step {
    Command { command: EditorCommand },
    Select { id: Option<ShapeId> },
    Pointer { kind: PointerKind, x: f64, y: f64 },
    Click { x: f64, y: f64 },
    Wheel { delta: f64 },
    Viewport {
        width: f64,
        height: f64,
        #[serde(default = "default_dpr")]
        dpr: f64,
    },
}

fn default_dpr() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
struct ShapeSummary {
    id: ShapeId,
    position: DVec3,
    points: Vec<DVec3>,
}

#[derive(Debug, Serialize)]
struct SceneSummary {
    shapes: Vec<ShapeSummary>,
    selected: Option<ShapeId>,
    custom_draw: bool,
    pending_points: Vec<DVec3>,
    last_click: Option<DVec3>,
    grid_visible: bool,
    axes_visible: bool,
    camera_position: DVec3,
}

impl SceneSummary {
    fn of(core: &EditorCore) -> Self {
        Self {
            shapes: core
                .shapes()
                .iter()
                .map(|s| ShapeSummary { id: s.id(), position: s.position(), points: s.points().to_vec() })
                .collect(),
            selected: core.selected(),
            custom_draw: core.registry.custom_draw_enabled(),
            pending_points: core.registry.pending_points().to_vec(),
            last_click: core.bus.clicks.last().copied(),
            grid_visible: core.registry.grid_visible(),
            axes_visible: core.registry.axes_visible(),
            camera_position: core.camera.position,
        }
    }
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run(run) => run_script(config, &run.script),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Panel => {
            for line in panel_lines()? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct PanelButton<'a> {
    label: &'static str,
    step: &'static str,
    command: &'a EditorCommand,
}

/// One JSON `command` step per panel button, in display order.
fn panel_lines() -> Result<Vec<String>, serde_json::Error> {
    EditorCommand::panel()
        .iter()
        .map(|command| serde_json::to_string(&PanelButton { label: command.label(), step: "command", command }))
        .collect()
}

fn load_config(path: Option<&str>) -> Result<EditorConfig, CliError> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let json = fs::read_to_string(path).map_err(|source| CliError::Io { action: "read config", path: path.to_owned(), source })?;
    Ok(EditorConfig::from_json(&json)?)
}

fn run_script(config: EditorConfig, script: &str) -> Result<(), CliError> {
    let reader: Box<dyn BufRead> = if script == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(script).map_err(|source| CliError::Io { action: "open script", path: script.to_owned(), source })?;
        Box::new(BufReader::new(file))
    };

    let mut core = EditorCore::new(config);
    replay(&mut core, reader, script)?;
    println!("{}", serde_json::to_string_pretty(&SceneSummary::of(&core))?);
    Ok(())
}

/// Apply every step in `reader` to `core`. Blank lines and `#` comments are skipped.
fn replay(core: &mut EditorCore, reader: impl BufRead, source: &str) -> Result<usize, CliError> {
    let mut applied = 0_usize;
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| CliError::Io { action: "read script", path: source.to_owned(), source: e })?;
        let Some(step) = parse_step_line(&line).map_err(|e| CliError::Step { line: line_no, source: e })? else {
            continue;
        };
        let actions = apply(core, step).map_err(|e| CliError::Shape { line: line_no, source: e })?;
        tracing::debug!(line = line_no, ?actions, "step applied");
        applied += 1;
    }
    tracing::info!(steps = applied, shapes = core.shapes().len(), "script complete");
    Ok(applied)
}

fn parse_step_line(line: &str) -> Result<Option<Step>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

fn apply(core: &mut EditorCore, step: Step) -> Result<Vec<Action>, ShapeError> {
    match step {
        Step::Command { command } => core.dispatch(command),
        Step::Select { id } => Ok(core.select(id)),
        Step::Pointer { kind, x, y } => Ok(core.on_pointer(PointerEvent::new(kind, x, y))),
        Step::Click { x, y } => core.on_click(DVec2::new(x, y)),
        Step::Wheel { delta } => Ok(core.on_wheel(delta)),
        Step::Viewport { width, height, dpr } => Ok(core.set_viewport(width, height, dpr)),
    }
}
