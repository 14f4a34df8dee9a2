use std::collections::HashSet;
use std::io::Write;

use clap::{Arg, ArgAction, Command};

use crate::domain::model::{EntityId, EntityKind};

use super::ReportCtx;

pub(super) fn register(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("all")
            .long("all")
            .action(ArgAction::SetTrue)
            .help("Also list addresses reachable through a person's family and employer"),
    )
}

/// One `Name <address>` line per known address. A selected family or
/// organisation brings the addresses of its members or workers along.
pub(super) fn run(ctx: &mut ReportCtx<'_>) -> anyhow::Result<()> {
    let all = ctx.matches.get_flag("all");
    let mut ids = super::selected(
        ctx.model,
        ctx.predicate,
        &[
            EntityKind::Person,
            EntityKind::Family,
            EntityKind::Organisation,
        ],
    );
    super::fold_head_families(ctx.model, &mut ids);

    let mut printed = HashSet::new();
    for id in ids {
        emit(ctx, id, &mut printed)?;
        let entity = &ctx.model.entities[id];
        match entity.kind {
            EntityKind::Family => {
                for member in super::members_of(ctx.model, id) {
                    emit(ctx, member, &mut printed)?;
                }
            }
            EntityKind::Organisation => {
                for worker in super::workers_of(ctx.model, id) {
                    emit(ctx, worker, &mut printed)?;
                }
            }
            EntityKind::Person if all => {
                for membership in &entity.memberships {
                    emit(ctx, membership.family, &mut printed)?;
                }
                for job in &entity.jobs {
                    emit(ctx, job.org, &mut printed)?;
                }
            }
            EntityKind::Person => {}
        }
    }
    Ok(())
}

fn emit(
    ctx: &mut ReportCtx<'_>,
    id: EntityId,
    printed: &mut HashSet<String>,
) -> anyhow::Result<()> {
    let entity = &ctx.model.entities[id];
    for email in &entity.emails {
        let line = format!("{} <{}>", entity.name, email.address);
        if printed.insert(line.clone()) {
            writeln!(ctx.out, "{line}")?;
        }
    }
    Ok(())
}
