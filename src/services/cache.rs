use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, warn};

use crate::domain::builder::ModelBuilder;
use crate::domain::model::Model;
use crate::error::{Error, Result};
use crate::source;

/// Fixed prefix prepended to the source's base name; the cache always
/// sits in the source's own directory.
pub const CACHE_PREFIX: &str = ".cache-";

/// Cache location for a source path. Pure function of the path.
pub fn cache_path(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{CACHE_PREFIX}{name}"))
}

/// Why a cached model could not be reused. Every reason funnels into
/// the same rebuild branch; none is ever surfaced to the user.
#[derive(Debug)]
enum CacheMiss {
    Absent,
    Stale,
    Unreadable(io::Error),
    Corrupt(serde_json::Error),
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMiss::Absent => write!(f, "absent"),
            CacheMiss::Stale => write!(f, "older than source"),
            CacheMiss::Unreadable(e) => write!(f, "unreadable: {e}"),
            CacheMiss::Corrupt(e) => write!(f, "corrupt: {e}"),
        }
    }
}

/// Produce a valid Model for the source as cheaply as correctness
/// allows: reuse the cached snapshot when it is at least as new as the
/// source, otherwise recompile and persist. Callers cannot tell the
/// two paths apart except through side effects.
pub fn obtain_model(source_path: &Path, force: bool) -> Result<Model> {
    let cache = cache_path(source_path);
    if !force {
        match load_from_cache(source_path, &cache) {
            Ok(model) => {
                debug!("using cached model {}", cache.display());
                return Ok(model);
            }
            Err(miss @ (CacheMiss::Absent | CacheMiss::Stale)) => {
                debug!("cache {}: {miss}", cache.display());
            }
            Err(miss) => {
                warn!("cache {}: {miss}", cache.display());
            }
        }
    }

    let model = build_model(source_path)?;

    // Remove any previous snapshot before writing so a crash mid-write
    // can only lose the cache, never leave a stale file that looks
    // fresh.
    match fs::remove_file(&cache) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let bytes = model
        .to_bytes()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&cache, bytes)?;
    Ok(model)
}

/// Reuse is valid only while the source is no newer than the cache;
/// equal timestamps still count as fresh.
fn load_from_cache(source: &Path, cache: &Path) -> std::result::Result<Model, CacheMiss> {
    let cache_mtime = match modified(cache) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheMiss::Absent),
        Err(e) => return Err(CacheMiss::Unreadable(e)),
    };
    let source_mtime = modified(source).map_err(CacheMiss::Unreadable)?;
    if source_mtime > cache_mtime {
        return Err(CacheMiss::Stale);
    }
    let bytes = fs::read(cache).map_err(CacheMiss::Unreadable)?;
    Model::from_bytes(&bytes).map_err(CacheMiss::Corrupt)
}

fn modified(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

fn build_model(path: &Path) -> Result<Model> {
    let mut builder = ModelBuilder::new();
    build_with(&mut builder, path)?;
    Ok(builder.into_model())
}

/// Compile the source into `builder`, running the builder's teardown
/// on every exit path.
pub(crate) fn build_with(builder: &mut ModelBuilder, path: &Path) -> Result<()> {
    let outcome = compile(builder, path);
    builder.finalise();
    outcome
}

fn compile(builder: &mut ModelBuilder, path: &Path) -> Result<()> {
    let lines = source::lines(path).map_err(|e| Error::source_input(path, e.to_string()))?;
    for block in source::blocks(source::remove_comments(lines)) {
        builder
            .parse_block(&block)
            .map_err(|e| Error::source_input(path, e.to_string()))?;
    }
    builder
        .finish_parsing()
        .map_err(|e| Error::source_input(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    const SOURCE: &str = "\
%country AU cc=61 ap=0 Australia
%area 8 South Australia

person Jo Bloggs
in South Australia
email jo@example.com
";

    fn write_source(dir: &Path) -> PathBuf {
        let path = dir.join("book.six");
        fs::write(&path, SOURCE).unwrap();
        path
    }

    #[test]
    fn cache_path_is_a_prefixed_sibling() {
        let p = cache_path(Path::new("/data/book.six"));
        assert_eq!(p, Path::new("/data/.cache-book.six"));
    }

    #[test]
    fn rebuild_persists_and_fresh_cache_is_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let source = write_source(tmp.path());
        let cache = cache_path(&source);

        let model = obtain_model(&source, false).unwrap();
        assert_eq!(model.entities.len(), 1);
        assert!(cache.is_file());

        // Break the source, then refresh the cache's timestamp: a
        // reuse must not touch the builder, so the run still succeeds.
        thread::sleep(Duration::from_millis(30));
        fs::write(&source, "widget Nonsense\n").unwrap();
        thread::sleep(Duration::from_millis(30));
        let bytes = fs::read(&cache).unwrap();
        fs::write(&cache, bytes).unwrap();

        let model = obtain_model(&source, false).unwrap();
        assert_eq!(model.entities.len(), 1);

        // Force must bypass the fresh cache and hit the broken source.
        let err = obtain_model(&source, true).unwrap_err();
        assert!(err.to_string().contains("unknown entry type"));
    }

    #[test]
    fn stale_cache_triggers_rebuild() {
        let tmp = tempfile::tempdir().unwrap();
        let source = write_source(tmp.path());
        obtain_model(&source, false).unwrap();

        thread::sleep(Duration::from_millis(30));
        fs::write(&source, format!("{SOURCE}\nperson Sam Bloggs\n")).unwrap();

        let model = obtain_model(&source, false).unwrap();
        assert_eq!(model.entities.len(), 2);
    }

    #[test]
    fn corrupt_cache_falls_back_to_rebuild() {
        let tmp = tempfile::tempdir().unwrap();
        let source = write_source(tmp.path());
        let cache = cache_path(&source);

        obtain_model(&source, false).unwrap();
        thread::sleep(Duration::from_millis(30));
        fs::write(&cache, b"not json at all").unwrap();

        let model = obtain_model(&source, false).unwrap();
        assert_eq!(model.entities.len(), 1);
        // The snapshot was rewritten with a valid model.
        let restored = Model::from_bytes(&fs::read(&cache).unwrap()).unwrap();
        assert_eq!(restored.entities.len(), 1);
    }

    #[test]
    fn truncated_cache_is_treated_as_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let source = write_source(tmp.path());
        let cache = cache_path(&source);

        obtain_model(&source, false).unwrap();
        thread::sleep(Duration::from_millis(30));
        let mut bytes = fs::read(&cache).unwrap();
        bytes.truncate(bytes.len() / 2);
        fs::write(&cache, bytes).unwrap();

        assert!(obtain_model(&source, false).is_ok());
    }

    #[test]
    fn teardown_runs_even_when_feeding_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("book.six");
        fs::write(&source, "person Jo\n\nwidget Nonsense\n").unwrap();

        let mut builder = ModelBuilder::new();
        let outcome = build_with(&mut builder, &source);
        assert!(outcome.is_err());
        assert!(builder.finalised());
    }

    #[test]
    fn missing_source_is_a_source_input_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.six");
        let err = obtain_model(&missing, false).unwrap_err();
        assert!(matches!(err, Error::SourceInput { .. }));
        assert!(err.to_string().contains("nope.six"));
    }
}
