//! Report registry and renderers.
//!
//! Reports are registered in a build-time table; each entry names the
//! report, optionally contributes extra command-line options before
//! the final parse, and renders the selected entities to the output
//! sink. The pipeline treats the rendered output as opaque.

use std::collections::HashSet;
use std::io::Write;

use clap::{ArgMatches, Command};

use crate::domain::model::{EntityId, EntityKind, Model, PlaceRef};
use crate::error::{Error, Result};
use crate::services::query::Predicate;

mod dump;
mod email;
mod phone;

/// Everything a renderer gets to work with.
pub struct ReportCtx<'a> {
    pub matches: &'a ArgMatches,
    pub model: &'a Model,
    pub predicate: Option<&'a Predicate>,
    pub local: Option<PlaceRef>,
    pub out: &'a mut dyn Write,
}

pub type RegisterFn = fn(Command) -> Command;
pub type RunFn = fn(&mut ReportCtx<'_>) -> anyhow::Result<()>;

pub struct ReportEntry {
    pub name: &'static str,
    pub about: &'static str,
    /// Adds report-specific options to the command before parsing.
    pub register: Option<RegisterFn>,
    pub run: RunFn,
}

pub const DEFAULT_REPORT: &str = "dump";

/// All report implementations.
pub const REGISTRY: &[ReportEntry] = &[
    ReportEntry {
        name: "dump",
        about: "full listing of the selected entries",
        register: None,
        run: dump::run,
    },
    ReportEntry {
        name: "email",
        about: "email addresses, one per line",
        register: Some(email::register),
        run: email::run,
    },
    ReportEntry {
        name: "phone",
        about: "telephone listing",
        register: None,
        run: phone::run,
    },
];

pub fn find(name: &str) -> Result<&'static ReportEntry> {
    REGISTRY
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| Error::argument(format!("unknown report \"{name}\"")))
}

/// Scan the raw arguments for the report selection flag. This runs
/// before the real parse so the chosen report can register its own
/// options first. Accepts `-r NAME`, `-rNAME`, `--report NAME` and
/// `--report=NAME`; defaults to `dump`.
pub fn requested_name(args: &[String]) -> Result<String> {
    let mut it = args.iter().skip(1);
    while let Some(arg) = it.next() {
        if arg == "-r" || arg == "--report" {
            return it
                .next()
                .cloned()
                .ok_or_else(|| Error::argument("missing report name"));
        }
        if let Some(name) = arg.strip_prefix("--report=") {
            return Ok(name.to_string());
        }
        if !arg.starts_with("--") {
            if let Some(name) = arg.strip_prefix("-r") {
                if !name.is_empty() {
                    return Ok(name.to_string());
                }
            }
        }
    }
    Ok(DEFAULT_REPORT.to_string())
}

/// Entities the report should cover, sorted by name. Without a
/// predicate the report's own default kinds are selected.
fn selected(model: &Model, predicate: Option<&Predicate>, default_kinds: &[EntityKind]) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = (0..model.entities.len())
        .filter(|&i| match predicate {
            Some(p) => p.selects(model, i),
            None => default_kinds.contains(&model.entities[i].kind),
        })
        .collect();
    ids.sort_by_key(|&i| model.entities[i].name.to_lowercase());
    ids
}

/// Drop families with a selected head; the head's own entry covers
/// the household.
fn fold_head_families(model: &Model, ids: &mut Vec<EntityId>) {
    let mut covered = HashSet::new();
    for &id in ids.iter() {
        let entity = &model.entities[id];
        if entity.kind == EntityKind::Person {
            covered.extend(entity.memberships.iter().filter(|m| m.head).map(|m| m.family));
        }
    }
    ids.retain(|id| !covered.contains(id));
}

fn members_of(model: &Model, family: EntityId) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = (0..model.entities.len())
        .filter(|&i| {
            model.entities[i]
                .memberships
                .iter()
                .any(|m| m.family == family)
        })
        .collect();
    ids.sort_by_key(|&i| model.entities[i].name.to_lowercase());
    ids
}

fn workers_of(model: &Model, org: EntityId) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = (0..model.entities.len())
        .filter(|&i| model.entities[i].jobs.iter().any(|j| j.org == org))
        .collect();
    ids.sort_by_key(|&i| model.entities[i].name.to_lowercase());
    ids
}
