use std::io::Write;

use crate::domain::model::EntityKind;

use super::ReportCtx;

/// Default report: every selected entry with all of its details,
/// indented under the entry name.
pub(super) fn run(ctx: &mut ReportCtx<'_>) -> anyhow::Result<()> {
    let ids = super::selected(
        ctx.model,
        ctx.predicate,
        &[
            EntityKind::Person,
            EntityKind::Family,
            EntityKind::Organisation,
        ],
    );
    let mut first = true;
    for id in ids {
        let entity = &ctx.model.entities[id];
        if !first {
            writeln!(ctx.out)?;
        }
        first = false;
        writeln!(ctx.out, "{}", entity.name)?;
        for alias in &entity.aliases {
            writeln!(ctx.out, "  aka {alias}")?;
        }
        if let Some(place) = entity.place {
            writeln!(ctx.out, "  in {}", ctx.model.describe_place(place))?;
        }
        if !entity.keywords.is_empty() {
            let words: Vec<&str> = entity
                .keywords
                .iter()
                .map(|&k| ctx.model.keywords[k].as_str())
                .collect();
            writeln!(ctx.out, "  key {}", words.join(", "))?;
        }
        for membership in &entity.memberships {
            writeln!(
                ctx.out,
                "  {} {}",
                if membership.head { "head of" } else { "of" },
                ctx.model.entities[membership.family].name
            )?;
        }
        for job in &entity.jobs {
            writeln!(ctx.out, "  works at {}", ctx.model.entities[job.org].name)?;
        }
        for email in &entity.emails {
            writeln!(ctx.out, "  email {}", email.address)?;
        }
        for phone in &entity.phones {
            writeln!(
                ctx.out,
                "  {} {}",
                phone.kind.tag(),
                ctx.model.format_phone(phone, ctx.local)
            )?;
        }
    }
    Ok(())
}
