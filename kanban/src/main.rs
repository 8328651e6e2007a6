use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use flexi_logger::{Logger, LoggerHandle};
use kanban::{
    Board, BoardSettings, LaneId, ParseOptions, format_board, item_from_title,
    parse_board_from_str, reparse_all_items,
};
use log::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "kanban",
    about = "Markdown kanban board tooling built on the kanban crate",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    /// JSON file with default board settings, used where a board's footer is silent.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse board files and print their structure.
    Parse(ParseArgs),

    /// Re-emit board files in canonical form.
    Format(FormatArgs),

    /// Re-derive every item's metadata with the current settings.
    Reparse(FormatArgs),

    /// Add an item to a lane.
    Add(AddArgs),
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Board files or directories containing board files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Emit JSON instead of a debug representation.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct FormatArgs {
    /// Board files or directories to process.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Overwrite the file instead of printing to stdout.
    #[arg(long)]
    in_place: bool,
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Board file to modify.
    file: PathBuf,
    /// Title of the lane that receives the item.
    #[arg(long)]
    lane: String,
    /// Item text; may contain tags, dates and inline fields.
    #[arg(long)]
    title: String,
    /// Overwrite the file instead of printing to stdout.
    #[arg(long)]
    in_place: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = init_logging(cli.verbose)?;
    let options = load_options(cli.settings.as_deref())?;
    match cli.command {
        Commands::Parse(args) => handle_parse(args, &options),
        Commands::Format(args) => handle_format(args, &options),
        Commands::Reparse(args) => handle_reparse(args, &options),
        Commands::Add(args) => handle_add(args, &options),
    }
}

fn init_logging(verbose: bool) -> Result<LoggerHandle> {
    let level = if verbose { "debug" } else { "warn" };
    let handle = Logger::try_with_env_or_str(level)
        .context("configuring logger")?
        .log_to_stderr()
        .start()
        .context("starting logger")?;
    Ok(handle)
}

fn load_options(settings: Option<&Path>) -> Result<ParseOptions> {
    let mut options = ParseOptions::default();
    if let Some(path) = settings {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading settings {:?}", path))?;
        let global: BoardSettings = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings {:?}", path))?;
        debug!("loaded default settings from {:?}", path);
        options.global = Some(global);
    }
    Ok(options)
}

/// Reads and parses one board. Item-level problems are logged, not fatal.
fn read_board(path: &Path, options: &ParseOptions) -> Result<Board> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let board = parse_board_from_str(Some(path.to_path_buf()), &text, options)
        .with_context(|| format!("parsing {:?}", path))?;
    for error in &board.errors {
        warn!("{}: {error}", path.display());
    }
    Ok(board)
}

fn handle_parse(args: ParseArgs, options: &ParseOptions) -> Result<()> {
    let ParseArgs { inputs, json } = args;
    let expanded = expand_inputs(&inputs)?;
    if expanded.is_empty() {
        anyhow::bail!("no board files found in the provided inputs");
    }

    let mut parsed = Vec::new();
    for path in expanded {
        info!("Parsing {:?}", path);
        parsed.push(read_board(&path, options)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
    } else {
        for (idx, board) in parsed.iter().enumerate() {
            if parsed.len() > 1 {
                println!("== {} ==", board.id());
            }
            println!("{:#?}", board);
            if parsed.len() > 1 && idx + 1 < parsed.len() {
                println!();
            }
        }
    }
    Ok(())
}

fn handle_format(args: FormatArgs, options: &ParseOptions) -> Result<()> {
    rewrite_each(args, options, |board| Ok(board))
}

fn handle_reparse(args: FormatArgs, options: &ParseOptions) -> Result<()> {
    rewrite_each(args, options, |board| {
        let report = reparse_all_items(&board, options);
        for failure in &report.failures {
            warn!(
                "{}: item {} kept as is: {}",
                board.id(),
                failure.item_id.0,
                failure.error
            );
        }
        Ok(report.board)
    })
}

fn handle_add(args: AddArgs, options: &ParseOptions) -> Result<()> {
    let AddArgs {
        file,
        lane,
        title,
        in_place,
    } = args;
    let mut board = read_board(&file, options)?;
    let lane_id = find_lane_by_title(&board, &lane)
        .with_context(|| format!("no lane titled {:?} in {:?}", lane, file))?;
    let item = item_from_title(&title, &options.item_context(&board.settings))?;
    board.insert_item(lane_id, item, options.global.as_ref())?;
    emit(&file, &board, options, in_place, false)
}

fn find_lane_by_title(board: &Board, title: &str) -> Option<LaneId> {
    let mut found = None;
    board.walk_lanes(|lane| {
        if found.is_none() && lane.title == title {
            found = Some(lane.id);
        }
    });
    found
}

/// Parses, transforms and re-emits every input. A file is only written after its
/// replacement text has been produced in full.
fn rewrite_each(
    args: FormatArgs,
    options: &ParseOptions,
    transform: impl Fn(Board) -> Result<Board>,
) -> Result<()> {
    let FormatArgs { inputs, in_place } = args;
    let expanded = expand_inputs(&inputs)?;
    if expanded.is_empty() {
        anyhow::bail!("no board files found in the provided inputs");
    }

    let banner = expanded.len() > 1;
    for (idx, path) in expanded.iter().enumerate() {
        info!("Formatting {:?}", path);
        let board = transform(read_board(path, options)?)?;
        emit(path, &board, options, in_place, banner && idx > 0)?;
    }
    Ok(())
}

fn emit(
    path: &Path,
    board: &Board,
    options: &ParseOptions,
    in_place: bool,
    separate: bool,
) -> Result<()> {
    let formatted = format_board(board, &options.locale)
        .with_context(|| format!("formatting {:?}", path))?;
    if in_place {
        fs::write(path, formatted.as_bytes()).with_context(|| format!("writing {:?}", path))?;
        info!("Wrote {:?}", path);
    } else {
        if separate {
            println!();
        }
        print!("{formatted}");
        if !formatted.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn is_board_file(path: &Path) -> bool {
    path.extension().map(|ext| ext == "md").unwrap_or(false)
}

fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut visited = BTreeSet::new();
    for path in paths {
        let canonical =
            fs::canonicalize(path).with_context(|| format!("resolving path {:?}", path))?;
        let meta = fs::metadata(&canonical)
            .with_context(|| format!("reading metadata for {:?}", canonical))?;
        if meta.is_dir() {
            debug!("Scanning directory {:?}", canonical);
            for file in collect_board_files(&canonical)? {
                if visited.insert(file.clone()) {
                    out.push(file);
                }
            }
        } else if meta.is_file() {
            if !is_board_file(&canonical) {
                anyhow::bail!("{:?} is not a .md file", canonical);
            }
            if visited.insert(canonical.clone()) {
                out.push(canonical);
            }
        }
    }
    Ok(out)
}

fn collect_board_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    visit_dir(dir, &mut out, &mut visited)?;
    out.sort();
    out.dedup();
    Ok(out)
}

fn visit_dir(path: &Path, out: &mut Vec<PathBuf>, visited: &mut HashSet<PathBuf>) -> Result<()> {
    let canonical = fs::canonicalize(path)?;
    if !visited.insert(canonical.clone()) {
        return Ok(());
    }

    let metadata = fs::metadata(&canonical)?;
    if metadata.is_dir() {
        for entry in fs::read_dir(&canonical)? {
            let entry = entry?;
            if entry.file_type()?.is_symlink() {
                continue;
            }
            visit_dir(&entry.path(), out, visited)?;
        }
    } else if metadata.is_file() && is_board_file(&canonical) {
        debug!("Found board file {:?}", canonical);
        out.push(canonical);
    }
    Ok(())
}
