use std::io::Write;

use crate::domain::model::{Entity, EntityKind};

use super::ReportCtx;

/// Telephone listing. People and organisations by default; a family
/// whose head is selected folds into the head's entry.
pub(super) fn run(ctx: &mut ReportCtx<'_>) -> anyhow::Result<()> {
    let mut ids = super::selected(
        ctx.model,
        ctx.predicate,
        &[EntityKind::Person, EntityKind::Organisation],
    );
    super::fold_head_families(ctx.model, &mut ids);

    let mut first = true;
    for id in ids {
        let entity = &ctx.model.entities[id];
        if !first {
            writeln!(ctx.out)?;
        }
        first = false;
        writeln!(ctx.out, "{}", entity.name)?;
        numbers(ctx, entity, "  ", None)?;
        match entity.kind {
            EntityKind::Person => {
                // Household and work numbers, qualified by where they
                // come from.
                for membership in &entity.memberships {
                    let family = &ctx.model.entities[membership.family];
                    numbers(ctx, family, "  ", Some(&family.name))?;
                }
                for job in &entity.jobs {
                    let org = &ctx.model.entities[job.org];
                    numbers(ctx, org, "  ", Some(&org.name))?;
                }
            }
            EntityKind::Family => {
                for member in super::members_of(ctx.model, id) {
                    let person = &ctx.model.entities[member];
                    writeln!(ctx.out, "  {}", person.name)?;
                    numbers(ctx, person, "    ", None)?;
                }
            }
            EntityKind::Organisation => {
                for worker in super::workers_of(ctx.model, id) {
                    let person = &ctx.model.entities[worker];
                    writeln!(ctx.out, "  {}", person.name)?;
                    numbers(ctx, person, "    ", None)?;
                }
            }
        }
    }
    Ok(())
}

fn numbers(
    ctx: &mut ReportCtx<'_>,
    entity: &Entity,
    indent: &str,
    qualifier: Option<&str>,
) -> anyhow::Result<()> {
    for phone in &entity.phones {
        let rendered = ctx.model.format_phone(phone, ctx.local);
        match qualifier {
            Some(q) => writeln!(ctx.out, "{indent}{} {rendered} ({q})", phone.kind.tag())?,
            None => writeln!(ctx.out, "{indent}{} {rendered}", phone.kind.tag())?,
        }
    }
    Ok(())
}
