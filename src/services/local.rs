use std::env;

use crate::domain::model::{Model, PlaceRef};
use crate::error::{Error, Result};

/// Optional fallback for the reference place when no `--local` option
/// is given.
pub const LOCAL_VAR: &str = "SIX_LOCAL";

/// Resolve the reference place, if any. An explicit option value wins
/// over the environment; a bad explicit value is the user's argument
/// error, a bad environment value is an environment error.
pub fn resolve(explicit: Option<&str>, model: &Model) -> Result<Option<PlaceRef>> {
    if let Some(name) = explicit {
        let place = model
            .lookup_place(name)
            .map_err(|e| Error::argument(format!("--local: {e}")))?;
        return Ok(Some(place));
    }
    match env::var(LOCAL_VAR) {
        Ok(name) if !name.is_empty() => {
            let place = model
                .lookup_place(&name)
                .map_err(|e| Error::environment(LOCAL_VAR, e.to_string()))?;
            Ok(Some(place))
        }
        _ => Ok(None),
    }
}
