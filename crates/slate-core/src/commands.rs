use std::io::{self, BufRead};

use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::calc::{self, Calculator};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::TaskStore;
use crate::filter::TaskFilter;
use crate::render::Renderer;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "edit", "delete", "done", "toggle", "calc", "export", "_commands", "_show",
        "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut TaskStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter,
        args = ?inv.command_args,
        "dispatching command"
    );

    match command {
        "add" => cmd_add(store, &inv.command_args),
        "list" => cmd_list(store, cfg, renderer, inv.filter, &inv.command_args),
        "edit" => cmd_edit(store, &inv.command_args),
        "delete" => cmd_delete(store, &inv.command_args),
        "done" | "toggle" => cmd_toggle(store, &inv.command_args),
        "calc" => cmd_calc(renderer, &inv.command_args),
        "export" => cmd_export(store),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, args))]
fn cmd_add(store: &mut TaskStore, args: &[String]) -> anyhow::Result<()> {
    info!("command add");

    let title = args.join(" ");
    let title = title.trim();
    if title.is_empty() {
        // Empty after trimming never becomes a task; not an error.
        debug!("empty title, nothing to add");
        return Ok(());
    }

    let id = store.add(title, Utc::now())?;
    println!("Created task {id}.");
    Ok(())
}

#[instrument(skip(store, cfg, renderer, filter, args))]
fn cmd_list(
    store: &mut TaskStore,
    cfg: &Config,
    renderer: &mut Renderer,
    filter: Option<TaskFilter>,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command list");

    // Precedence: leading filter term, then command argument (leniently
    // parsed, so anything unrecognized shows everything), then config.
    let filter = filter
        .or_else(|| args.first().map(|token| TaskFilter::parse(token)))
        .unwrap_or_else(|| {
            cfg.get("default.filter")
                .map(|value| TaskFilter::parse(&value))
                .unwrap_or_default()
        });

    debug!(filter = filter.name(), "listing tasks");
    let rows = store.filtered(filter);
    renderer.print_task_table(&rows)?;
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_edit(store: &mut TaskStore, args: &[String]) -> anyhow::Result<()> {
    info!("command edit");

    let (id, rest) = parse_id_arg(args, "edit")?;
    let title = rest.join(" ");
    let title = title.trim();
    if title.is_empty() {
        debug!(id, "empty replacement title, leaving task unchanged");
        println!("Modified 0 task(s).");
        return Ok(());
    }

    let changed = store.edit(id, title)?;
    println!("Modified {} task(s).", u64::from(changed));
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_delete(store: &mut TaskStore, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let (id, _) = parse_id_arg(args, "delete")?;
    let removed = store.delete(id)?;
    println!("Deleted {} task(s).", u64::from(removed));
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_toggle(store: &mut TaskStore, args: &[String]) -> anyhow::Result<()> {
    info!("command toggle");

    let (id, _) = parse_id_arg(args, "toggle")?;
    match store.toggle(id)? {
        Some(true) => println!("Completed task {id}."),
        Some(false) => println!("Reopened task {id}."),
        None => println!("Toggled 0 task(s)."),
    }
    Ok(())
}

/// Feeds characters through the calculator key mapping. With arguments the
/// whole line is evaluated once; without, an interactive loop reads stdin
/// and treats each end-of-line as Enter.
#[instrument(skip(renderer, args))]
fn cmd_calc(renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command calc");

    let mut calculator = Calculator::new();

    if !args.is_empty() {
        for token in args {
            press_chars(&mut calculator, token);
        }
        calculator.compute();
        renderer.print_display(calculator.display())?;
        return Ok(());
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed reading stdin")?;
        let trimmed = line.trim();
        if trimmed == "q" || trimmed == "quit" {
            break;
        }

        press_chars(&mut calculator, &line);
        calculator.compute();
        renderer.print_display(calculator.display())?;
    }

    Ok(())
}

fn press_chars(calculator: &mut Calculator, input: &str) {
    for ch in input.chars() {
        if let Some(key) = calc::map_key(ch) {
            calculator.press(key);
        }
    }
}

#[instrument(skip(store))]
fn cmd_export(store: &mut TaskStore) -> anyhow::Result<()> {
    info!("command export");

    let out = serde_json::to_string(store.tasks())?;
    println!("{out}");
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<(String, String)> = cfg
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    entries.sort();
    for (k, v) in entries {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Implemented commands: add, list, edit, delete, done/toggle, calc, export, help, version"
    );
    Ok(())
}

fn parse_id_arg<'a>(args: &'a [String], command: &str) -> anyhow::Result<(u64, &'a [String])> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("{command} requires a task id"))?;
    let id: u64 = raw
        .parse()
        .with_context(|| format!("invalid task id: {raw}"))?;
    Ok((id, &args[1..]))
}
