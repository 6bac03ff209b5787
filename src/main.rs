//! Scopeline - Command-line entry point
//!
//! Formats R code, aligns assignments and prints the scope outline and the
//! chunk list of R scripts and R Markdown documents.

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{debug, info};
use scopeline::chunks::{ChunkOptions, ExecutionMode, RunnablePolicy};
use scopeline::config::{get_config_file_path, load_config, save_config_silent, Settings};
use scopeline::document::{Document, TextDocument};
use scopeline::error::{Error, Result};
use scopeline::reformat::{align_assignments, Reformatter};
use scopeline::scope::{status_label, ScopeId, ScopeKind, ScopeTracker, ScopeTree};
use scopeline::token::Flavor;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// Application name constant.
const APP_NAME: &str = "scopeline";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let settings = load_config();
    debug!("Starting {} with {:?}", APP_NAME, settings);

    if let Err(e) = run(&matches, &settings) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cli() -> Command {
    let path = || {
        Arg::new("path")
            .help("R script or R Markdown document")
            .required(true)
            .index(1)
    };
    let write = || {
        Arg::new("write")
            .long("write")
            .short('w')
            .help("Rewrite the file instead of printing the result")
            .action(ArgAction::SetTrue)
    };

    Command::new(APP_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scope tracking, chunk toolbars and reformatting for R documents")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("format")
                .about("Reformat R code")
                .arg(path())
                .arg(write()),
        )
        .subcommand(
            Command::new("align")
                .about("Align runs of assignments")
                .arg(path())
                .arg(write()),
        )
        .subcommand(
            Command::new("scopes")
                .about("Print the scope tree as an outline")
                .arg(path()),
        )
        .subcommand(
            Command::new("chunks")
                .about("List chunks and whether they can be run")
                .arg(path())
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .short('m')
                        .help("Execution mode: inline or console"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Print the settings file location and the effective settings")
                .arg(
                    Arg::new("save")
                        .long("save")
                        .help("Write the effective settings back to the settings file")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn run(matches: &ArgMatches, settings: &Settings) -> Result<()> {
    match matches.subcommand() {
        Some(("format", sub)) => {
            let path = path_arg(sub)?;
            let text = read_file(&path)?;
            let reformatter = Reformatter::new(settings.formatter.clone());
            let output = match Flavor::from_path(&path) {
                Flavor::RScript => reformatter.reformat(&text),
                Flavor::RMarkdown => format_chunks(&text, &reformatter, settings),
            };
            emit(&path, &output, sub.get_flag("write"))
        }
        Some(("align", sub)) => {
            let path = path_arg(sub)?;
            let text = read_file(&path)?;
            emit(&path, &align_assignments(&text), sub.get_flag("write"))
        }
        Some(("scopes", sub)) => {
            let path = path_arg(sub)?;
            let doc = TextDocument::from_text(&read_file(&path)?);
            let tracker = build_scopes(&doc, Flavor::from_path(&path), settings);
            print!("{}", outline(tracker.tree()));
            Ok(())
        }
        Some(("chunks", sub)) => {
            let path = path_arg(sub)?;
            let mode = match sub.get_one::<String>("mode") {
                Some(mode) => mode.parse::<ExecutionMode>().map_err(Error::Application)?,
                None => settings.chunks.mode,
            };
            let policy = RunnablePolicy::new(mode, &settings.chunks.console_engines);
            let doc = TextDocument::from_text(&read_file(&path)?);
            let tracker = build_scopes(&doc, Flavor::RMarkdown, settings);
            print!("{}", chunk_listing(&doc, tracker.tree(), &policy));
            Ok(())
        }
        Some(("config", sub)) => {
            let path = get_config_file_path()?;
            println!("{}", path.display());
            print!("{}", terminated(&serde_json::to_string_pretty(settings)?));
            if sub.get_flag("save") && !save_config_silent(settings) {
                return Err(Error::Application(format!(
                    "could not save settings to {}",
                    path.display()
                )));
            }
            Ok(())
        }
        _ => Err(Error::Application("unknown command".to_string())),
    }
}

fn path_arg(matches: &ArgMatches) -> Result<PathBuf> {
    matches
        .get_one::<String>("path")
        .map(PathBuf::from)
        .ok_or_else(|| Error::Application("missing path".to_string()))
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::read(path, source))
}

/// Print the result, or write it back when `write` is set.
fn emit(path: &Path, output: &str, write: bool) -> Result<()> {
    if !write {
        print!("{}", terminated(output));
        return Ok(());
    }
    fs::write(path, output).map_err(|source| Error::write(path, source))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// `output` with exactly one trailing newline added when it has none.
fn terminated(output: &str) -> Cow<'_, str> {
    if output.is_empty() || output.ends_with('\n') {
        Cow::Borrowed(output)
    } else {
        Cow::Owned(format!("{}\n", output))
    }
}

/// Run a full scope build.
fn build_scopes(doc: &TextDocument, flavor: Flavor, settings: &Settings) -> ScopeTracker {
    let mut tracker = ScopeTracker::new(flavor, &settings.scopes);
    tracker.start(doc);
    tracker.flush(doc);
    tracker
}

/// Reformat the body of every closed R chunk, leaving prose untouched.
fn format_chunks(text: &str, reformatter: &Reformatter, settings: &Settings) -> String {
    let doc = TextDocument::from_text(text);
    let tracker = build_scopes(&doc, Flavor::RMarkdown, settings);
    let mut lines: Vec<String> = doc.lines().to_vec();

    // Bottom up so earlier row numbers stay valid
    let mut bodies: Vec<(usize, usize)> = tracker
        .tree()
        .chunks()
        .filter(|(_, scope)| ChunkOptions::collect(&doc, scope).engine().eq_ignore_ascii_case("r"))
        .filter_map(|(_, scope)| scope.end.map(|end| (scope.preamble.row + 1, end.row)))
        .filter(|(start, end)| start < end)
        .collect();
    bodies.sort_unstable();

    for (start, end) in bodies.into_iter().rev() {
        let body = lines[start..end].join("\n");
        let formatted = reformatter.reformat(&body);
        let formatted = formatted.strip_suffix('\n').unwrap_or(&formatted);
        lines.splice(start..end, formatted.split('\n').map(str::to_string));
    }
    lines.join("\n")
}

/// Indented outline of a scope tree, one scope per line.
fn outline(tree: &ScopeTree) -> String {
    let mut out = String::new();
    for &child in tree.children(tree.root()) {
        outline_scope(tree, child, 0, &mut out);
    }
    out
}

fn outline_scope(tree: &ScopeTree, id: ScopeId, depth: usize, out: &mut String) {
    let scope = tree.scope(id);
    let kind = match &scope.kind {
        ScopeKind::TopLevel => "top",
        ScopeKind::Section { .. } => "section",
        ScopeKind::Chunk { .. } => "chunk",
        ScopeKind::Function { .. } => "function",
        ScopeKind::Brace => "brace",
    };
    let end = scope
        .end
        .map(|end| end.to_string())
        .unwrap_or_else(|| "open".to_string());
    out.push_str(&format!(
        "{}{} {} [{} - {}]\n",
        "  ".repeat(depth),
        kind,
        status_label(tree, id),
        scope.preamble,
        end
    ));
    for &child in tree.children(id) {
        outline_scope(tree, child, depth + 1, out);
    }
}

/// One line per chunk: row, engine, label and runnable status.
fn chunk_listing<D: Document + ?Sized>(doc: &D, tree: &ScopeTree, policy: &RunnablePolicy) -> String {
    let mut out = String::new();
    for (_, scope) in tree.chunks() {
        let options = ChunkOptions::collect(doc, scope);
        let status = if policy.is_runnable(&options) {
            "runnable"
        } else {
            "not runnable"
        };
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\n",
            scope.preamble.row + 1,
            options.engine(),
            options.label.as_deref().unwrap_or("-"),
            status
        ));
    }
    out
}
