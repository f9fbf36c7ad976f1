//! Loader session: symbol index, cache and host hook behind one lookup.

use crate::{CoreError, HookChain, LoaderConfig};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use symdex_indexer::storage::LoadOutcome;
use symdex_indexer::{
    CacheStore, IndexContext, IndexStats, IndexerError, Session, SymbolIndex, SymbolScanner,
};
use tracing::{debug, info, warn};

/// One process's view of a symbol index.
///
/// The cache is read on first use. Unsaved changes are written back by
/// [`Loader::flush`] or, failing that, when the loader is dropped.
pub struct Loader {
    config: LoaderConfig,
    ctx: IndexContext,
    index: SymbolIndex,
    session: Session,
    store: Option<CacheStore>,
    loaded: bool,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        let sources = config.sources();
        let store = config
            .cache_dir
            .as_ref()
            .map(|dir| CacheStore::new(dir, &sources));

        let mut ctx = IndexContext::new(sources, SymbolScanner::new(config.report_parse_errors));
        ctx.auto_rebuild = config.auto_rebuild;

        Self {
            config,
            ctx,
            index: SymbolIndex::new(),
            session: Session::new(),
            store,
            loaded: false,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Path of the cache artifact, if a cache directory is configured
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.store.as_ref().map(CacheStore::cache_path)
    }

    fn store(&self) -> Result<&CacheStore, IndexerError> {
        self.store.as_ref().ok_or_else(no_cache_dir)
    }

    /// Read the cache, building and persisting it if nobody has yet.
    fn ensure_loaded(&mut self) -> Result<(), CoreError> {
        if self.loaded {
            return Ok(());
        }

        let store = self.store.as_ref().ok_or_else(no_cache_dir)?;
        let ctx = &self.ctx;
        let session = &mut self.session;
        let mut built = None;

        let (snapshot, outcome) = store.load_or_build(|| {
            let mut fresh = SymbolIndex::new();
            fresh.rebuild(ctx, session)?;
            let snapshot = fresh.snapshot();
            built = Some(fresh);
            Ok(snapshot)
        })?;

        self.index = match built {
            Some(index) => index,
            None => SymbolIndex::from_snapshot(snapshot),
        };
        if outcome == LoadOutcome::Built {
            self.session.mark_clean();
        }
        self.loaded = true;

        info!(
            outcome = ?outcome,
            symbols = self.index.symbols().len(),
            "Symbol cache ready"
        );
        Ok(())
    }

    /// Locate the file defining `name`.
    pub fn resolve(&mut self, name: &str) -> Result<Option<PathBuf>, CoreError> {
        self.ensure_loaded()?;
        let file = self.index.resolve(name, &self.ctx, &mut self.session)?;
        debug!(symbol = name, file = ?file, "Resolved");
        Ok(file)
    }

    /// Symbol name -> defining file, for everything indexed.
    pub fn indexed_symbols(&mut self) -> Result<BTreeMap<String, PathBuf>, CoreError> {
        self.ensure_loaded()?;
        Ok(self.index.indexed_symbols())
    }

    /// Drop all state, rescan every source and persist the result.
    pub fn rebuild(&mut self) -> Result<(), CoreError> {
        self.index.rebuild_clean(&self.ctx, &mut self.session)?;
        self.loaded = true;
        if self.store.is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Rescan every source unless this session already did.
    ///
    /// Returns whether a rescan happened.
    pub fn refresh(&mut self) -> Result<bool, CoreError> {
        self.ensure_loaded()?;
        if !self.index.refresh(&self.ctx, &mut self.session)? {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Persist pending changes, if any.
    pub fn flush(&mut self) -> Result<(), CoreError> {
        if !self.session.is_dirty() || self.store.is_none() {
            return Ok(());
        }
        self.save()
    }

    fn save(&mut self) -> Result<(), CoreError> {
        self.store()?.save(&self.index.snapshot())?;
        self.session.mark_clean();
        Ok(())
    }

    /// Resolve the base name of every existing standalone file.
    ///
    /// Returns the files found, in configuration order.
    pub fn preload_files(&mut self) -> Result<Vec<PathBuf>, CoreError> {
        let stems: Vec<String> = self
            .config
            .files
            .iter()
            .filter(|f| f.exists())
            .filter_map(|f| f.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();

        let mut loaded = Vec::new();
        for stem in stems {
            if let Some(file) = self.resolve(&stem)? {
                loaded.push(file);
            }
        }
        Ok(loaded)
    }

    /// Plug a shared loader into a host hook chain.
    ///
    /// Standalone files are handed to `execute` right away; afterwards the
    /// hook resolves every requested name and hands its file to `execute`.
    pub fn register<E>(
        loader: &Rc<RefCell<Loader>>,
        chain: &mut HookChain,
        prepend: bool,
        execute: E,
    ) -> Result<(), CoreError>
    where
        E: Fn(&Path) -> Result<(), CoreError> + 'static,
    {
        let preloaded = loader.borrow_mut().preload_files()?;
        for file in &preloaded {
            execute(file)?;
        }

        let loader = Rc::clone(loader);
        chain.register(
            move |name| {
                // The borrow ends before `execute`, which may re-enter the chain.
                let file = loader.borrow_mut().resolve(name)?;
                match file {
                    Some(file) => execute(&file),
                    None => Ok(()),
                }
            },
            prepend,
        );
        Ok(())
    }
}

fn no_cache_dir() -> IndexerError {
    IndexerError::Config("Set path to cache directory using set_cache_dir()".to_string())
}

impl Drop for Loader {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "Failed to persist symbol cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _temp: TempDir,
        root: PathBuf,
        cache: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = tempdir().unwrap();
        let base = fs::canonicalize(temp.path()).unwrap();
        let root = base.join("src");
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("a/Foo.php"), "<?php class Foo {}").unwrap();
        fs::write(root.join("Bar.php"), "<?php class Bar {}").unwrap();
        Fixture {
            _temp: temp,
            root,
            cache: base.join("cache"),
        }
    }

    fn config(f: &Fixture) -> LoaderConfig {
        LoaderConfig::default()
            .add_directory([&f.root])
            .set_cache_dir(&f.cache)
            .unwrap()
    }

    #[test]
    fn test_missing_cache_dir_is_config_error() {
        let f = fixture();
        let mut loader = Loader::new(LoaderConfig::default().add_directory([&f.root]));
        let err = loader.resolve("Foo").unwrap_err();
        assert!(matches!(err, CoreError::Indexer(IndexerError::Config(_))));
    }

    #[test]
    fn test_cold_start_builds_and_persists() {
        let f = fixture();
        let mut loader = Loader::new(config(&f));

        assert_eq!(loader.resolve("Foo").unwrap(), Some(f.root.join("a/Foo.php")));
        assert!(loader.cache_path().unwrap().exists());
        assert!(loader.session().is_refreshed());
        assert!(!loader.session().is_dirty());
        assert_eq!(loader.stats().walks, 1);
    }

    #[test]
    fn test_warm_start_skips_walk() {
        let f = fixture();
        drop(Loader::new(config(&f)).indexed_symbols().unwrap());

        let mut loader = Loader::new(config(&f));
        assert_eq!(loader.resolve("Bar").unwrap(), Some(f.root.join("Bar.php")));
        assert_eq!(loader.stats().walks, 0);
        assert!(!loader.session().is_refreshed());
    }

    #[test]
    fn test_refresh_runs_once() {
        let f = fixture();
        let mut loader = Loader::new(config(&f));
        // Cold start already walked.
        assert!(!loader.refresh().unwrap());

        let mut warm = Loader::new(config(&f));
        assert!(warm.refresh().unwrap());
        assert!(!warm.refresh().unwrap());
        assert_eq!(warm.stats().walks, 1);
    }

    #[test]
    fn test_rebuild_clears_miss_counters() {
        let f = fixture();
        let mut loader = Loader::new(config(&f));
        assert_eq!(loader.resolve("Nope").unwrap(), None);
        assert_eq!(loader.index.miss_count("Nope"), 1);

        loader.rebuild().unwrap();
        assert_eq!(loader.index.miss_count("Nope"), 0);
        assert_eq!(loader.indexed_symbols().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_rebuild_keeps_loaded_index() {
        let f = fixture();
        let mut loader = Loader::new(config(&f));
        loader.resolve("Ghost").unwrap();
        assert!(loader.session().is_dirty());

        fs::write(f.root.join("Dup.php"), "<?php class Bar {}").unwrap();
        assert!(loader.rebuild().is_err());
        assert_eq!(loader.index.miss_count("Ghost"), 1);
        assert_eq!(loader.resolve("Foo").unwrap(), Some(f.root.join("a/Foo.php")));
        drop(loader);

        fs::remove_file(f.root.join("Dup.php")).unwrap();
        let mut reloaded = Loader::new(config(&f));
        reloaded.ensure_loaded().unwrap();
        assert_eq!(reloaded.index.symbols().len(), 2);
        assert_eq!(reloaded.index.miss_count("Ghost"), 1);
    }

    #[test]
    fn test_drop_flushes_dirty_session() {
        let f = fixture();
        {
            let mut loader = Loader::new(config(&f));
            loader.resolve("Ghost").unwrap();
            assert!(loader.session().is_dirty());
        }

        let mut reloaded = Loader::new(config(&f));
        reloaded.ensure_loaded().unwrap();
        assert_eq!(reloaded.index.miss_count("Ghost"), 1);
    }

    #[test]
    fn test_rebuild_without_cache_dir_stays_in_memory() {
        let f = fixture();
        let mut loader = Loader::new(LoaderConfig::default().add_directory([&f.root]));
        loader.rebuild().unwrap();
        assert_eq!(loader.resolve("Foo").unwrap(), Some(f.root.join("a/Foo.php")));
        assert!(loader.flush().is_ok());
    }

    #[test]
    fn test_register_preloads_and_resolves() {
        let f = fixture();
        let boot = f.root.parent().unwrap().join("bootstrap.php");
        fs::write(&boot, "<?php function boot() {}").unwrap();

        let loader = Rc::new(RefCell::new(Loader::new(
            config(&f).add_files([&boot, &f.root.join("absent.php")]),
        )));
        let executed: Rc<RefCell<Vec<PathBuf>>> = Rc::default();
        let mut chain = HookChain::new();

        let sink = Rc::clone(&executed);
        Loader::register(&loader, &mut chain, false, move |file| {
            sink.borrow_mut().push(file.to_path_buf());
            Ok(())
        })
        .unwrap();
        assert_eq!(*executed.borrow(), vec![boot.clone()]);

        let seen = Rc::clone(&executed);
        let expected = f.root.join("a/Foo.php");
        assert!(chain
            .dispatch("Foo", |_| seen.borrow().contains(&expected))
            .unwrap());
        assert!(!chain.dispatch("Missing", |_| false).unwrap());
    }
}
