//! Resolution of roots and masks into per-directory search plans.

use super::pattern::Matcher;
use super::record::{normalize_slashes, EntryKind, FileRecord};
use crate::IndexerError;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// One compiled mask active under a base directory.
#[derive(Debug)]
pub struct Search {
    pub matcher: Matcher,
    pub mode: EntryKind,
    pub recursive: bool,
}

/// Base directories in discovery order, each with the searches rooted there.
#[derive(Debug, Default)]
pub struct SearchPlan {
    pub dirs: Vec<(PathBuf, Vec<Rc<Search>>)>,
}

impl SearchPlan {
    fn add(&mut self, dir: PathBuf, search: Rc<Search>) {
        match self.dirs.iter_mut().find(|(d, _)| *d == dir) {
            Some((_, searches)) => searches.push(search),
            None => self.dirs.push((dir, vec![search])),
        }
    }
}

/// Build a plan for `masks` (already validated) against `roots`.
///
/// Each root carries its own recursion suffix (`/**` or empty). Fails before
/// any traversal when a base directory is missing or a glob expands to
/// nothing.
pub fn build_plan(
    masks: &[(String, EntryKind)],
    roots: &[String],
) -> Result<SearchPlan, IndexerError> {
    let mut plan = SearchPlan::default();
    let mut dir_cache: Vec<(String, Vec<PathBuf>)> = Vec::new();

    for (mask, mode) in masks {
        let mut splits = Vec::new();

        if is_absolute(mask) {
            if let Some(root) = roots.first() {
                return Err(IndexerError::Config(format!(
                    "You cannot combine the absolute path in the mask '{}' and the directory to search '{}'.",
                    mask, root
                )));
            }
            splits.push(split_recursive_part(mask));
        } else if roots.is_empty() {
            splits.push(split_recursive_part(&format!("./{}", mask)));
        } else {
            for root in roots {
                splits.push(split_recursive_part(&format!("{}/{}", root, mask)));
            }
        }

        for (base, rest, recursive) in splits {
            let base = trim_base(&base);
            let dirs = match dir_cache.iter().find(|(b, _)| *b == base) {
                Some((_, dirs)) => dirs.clone(),
                None => {
                    let dirs = expand_base(&base)?;
                    dir_cache.push((base.clone(), dirs.clone()));
                    dirs
                }
            };

            let search = Rc::new(Search {
                matcher: Matcher::compile(&rest)?,
                mode: *mode,
                recursive,
            });
            debug!(base = %base, mask = %rest, recursive, dirs = dirs.len(), "Planned search");

            for dir in dirs {
                plan.add(dir, Rc::clone(&search));
            }
        }
    }

    Ok(plan)
}

/// Whether `path` is absolute: `/x`, `\x`, `C:/x`, `C:\x` or `scheme://x`.
pub fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    if matches!(bytes.first(), Some(b'/' | b'\\')) {
        return true;
    }
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'/' | b'\\')
    {
        return true;
    }
    match path.find("://") {
        Some(pos) if pos > 0 => {
            let scheme = &path[..pos];
            scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        }
        _ => false,
    }
}

/// Split a combined path at its first `**` segment.
///
/// Returns `(fixed prefix, remainder, recursive)`. The prefix is the part
/// handed to directory globbing, the remainder becomes the mask matched
/// against relative paths during traversal.
pub fn split_recursive_part(path: &str) -> (String, String, bool) {
    let path = normalize_slashes(path);
    let (dir, name) = match path.rfind('/') {
        Some(pos) => path.split_at(pos + 1),
        None => ("", path.as_str()),
    };

    let mut offset = 0;
    for segment in dir.split_inclusive('/') {
        if segment == "**/" {
            let prefix = &dir[..offset];
            let rest = &dir[offset + segment.len()..];
            return (prefix.to_string(), format!("{}{}", rest, name), true);
        }
        offset += segment.len();
    }

    (dir.to_string(), name.to_string(), false)
}

fn trim_base(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() {
        if base.starts_with('/') {
            "/".to_string()
        } else {
            ".".to_string()
        }
    } else if trimmed.len() == 2 && trimmed.ends_with(':') {
        // Keep the separator of a bare drive root.
        format!("{}/", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Resolve a base (possibly containing glob characters) into directories.
fn expand_base(base: &str) -> Result<Vec<PathBuf>, IndexerError> {
    let missing = || IndexerError::Config(format!("Directory '{}' does not exist.", base));

    if !base.contains(['*', '?', '[']) {
        let dir = PathBuf::from(base);
        return if dir.is_dir() { Ok(vec![dir]) } else { Err(missing()) };
    }

    let options = glob::MatchOptions {
        case_sensitive: !cfg!(windows),
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let dirs: Vec<PathBuf> = glob::glob_with(base, options)
        .map_err(|e| IndexerError::Config(format!("Invalid directory pattern '{}': {}", base, e)))?
        .filter_map(Result::ok)
        .filter(|p| p.is_dir())
        .collect();

    if dirs.is_empty() {
        Err(missing())
    } else {
        Ok(dirs)
    }
}

/// Escape glob metacharacters in a literal root directory.
pub fn escape_root(root: &str) -> String {
    glob::Pattern::escape(root)
}

/// How an exclusion mask's trailing suffix scopes what it excludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcludeScope {
    /// `dir/**`: the whole subtree
    Subtree,
    /// `dir/*`: only this level, never leaves
    Level,
    /// `dir/`: directories only
    DirsOnly,
    /// no suffix: files and directories alike
    Any,
}

/// A compiled exclusion mask.
#[derive(Debug)]
pub struct ExcludeMask {
    matcher: Matcher,
    scope: ExcludeScope,
}

impl ExcludeMask {
    pub fn parse(mask: &str) -> Result<Self, IndexerError> {
        let normalized = normalize_slashes(mask);
        let body = normalized.strip_prefix('/').unwrap_or(&normalized);
        let body = body.strip_prefix("**/").unwrap_or(body);

        let (pattern, scope) = if let Some(p) = body.strip_suffix("/**") {
            (p, ExcludeScope::Subtree)
        } else if let Some(p) = body.strip_suffix("/*") {
            (p, ExcludeScope::Level)
        } else if let Some(p) = body.strip_suffix('/') {
            (p, ExcludeScope::DirsOnly)
        } else {
            (body, ExcludeScope::Any)
        };

        if pattern.is_empty() {
            return Err(IndexerError::Config(format!("Invalid mask '{}'", mask)));
        }

        Ok(Self {
            matcher: Matcher::compile(pattern)?,
            scope,
        })
    }

    /// Whether the mask also filters matched entries, not only descent.
    pub fn applies_to_leaves(&self) -> bool {
        matches!(self.scope, ExcludeScope::Subtree | ExcludeScope::Any)
    }

    /// `true` when `record` passes (is not excluded).
    pub fn accepts(&self, record: &FileRecord) -> bool {
        let type_in_scope = self.scope == ExcludeScope::Any || record.is_dir();
        !(type_in_scope && self.matcher.is_match(&record.relative_pathname()))
    }
}

/// Normalise a user-supplied root: trim trailing separators, reject empty.
pub(crate) fn clean_root(path: &Path) -> Result<String, IndexerError> {
    let raw = path.to_string_lossy();
    if raw.is_empty() {
        return Err(IndexerError::Config(format!("Invalid directory '{}'", raw)));
    }
    let trimmed = raw.trim_end_matches(['/', '\\']);
    Ok(if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_split_without_recursion() {
        assert_eq!(
            split_recursive_part("src/*.php"),
            ("src/".to_string(), "*.php".to_string(), false)
        );
        assert_eq!(
            split_recursive_part("Foo.php"),
            ("".to_string(), "Foo.php".to_string(), false)
        );
    }

    #[test]
    fn test_split_at_first_double_star() {
        assert_eq!(
            split_recursive_part("/root/**/lib/*.php"),
            ("/root/".to_string(), "lib/*.php".to_string(), true)
        );
        assert_eq!(
            split_recursive_part("a/**/b/**/c.php"),
            ("a/".to_string(), "b/**/c.php".to_string(), true)
        );
        assert_eq!(
            split_recursive_part("**/x.php"),
            ("".to_string(), "x.php".to_string(), true)
        );
    }

    #[test]
    fn test_split_ignores_partial_double_star() {
        assert_eq!(
            split_recursive_part("a**/b.php"),
            ("a**/".to_string(), "b.php".to_string(), false)
        );
    }

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("/usr/lib"));
        assert!(is_absolute("C:\\code"));
        assert!(is_absolute("c:/code"));
        assert!(is_absolute("phar://archive/x"));
        assert!(!is_absolute("src/lib"));
        assert!(!is_absolute("*.php"));
        assert!(!is_absolute("./x"));
    }

    #[test]
    fn test_absolute_mask_with_root_is_config_error() {
        let masks = vec![("/abs/*.php".to_string(), EntryKind::File)];
        let err = build_plan(&masks, &["src/**".to_string()]).unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }

    #[test]
    fn test_missing_base_is_config_error() {
        let temp_dir = tempdir().unwrap();
        let root = format!("{}/nope/**", temp_dir.path().display());
        let masks = vec![("*.php".to_string(), EntryKind::File)];
        let err = build_plan(&masks, &[root]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_empty_glob_is_config_error() {
        let temp_dir = tempdir().unwrap();
        let root = format!("{}/x*/**", temp_dir.path().display());
        let masks = vec![("*.php".to_string(), EntryKind::File)];
        assert!(build_plan(&masks, &[root]).is_err());
    }

    #[test]
    fn test_glob_base_expands_to_directories_only() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("pkg-a/src")).unwrap();
        fs::create_dir_all(temp_dir.path().join("pkg-b/src")).unwrap();
        fs::write(temp_dir.path().join("pkg-c"), "").unwrap();

        let root = escape_root(&temp_dir.path().to_string_lossy());
        let masks = vec![("pkg-*/src/*.php".to_string(), EntryKind::File)];
        let plan = build_plan(&masks, &[root]).unwrap();

        assert_eq!(plan.dirs.len(), 2);
        assert!(plan.dirs.iter().all(|(_, s)| s.len() == 1 && !s[0].recursive));
    }

    #[test]
    fn test_masks_sharing_base_are_merged() {
        let temp_dir = tempdir().unwrap();
        let root = format!("{}/**", escape_root(&temp_dir.path().to_string_lossy()));
        let masks = vec![
            ("*.php".to_string(), EntryKind::File),
            ("*.inc".to_string(), EntryKind::File),
            ("lib".to_string(), EntryKind::Dir),
        ];
        let plan = build_plan(&masks, &[root]).unwrap();

        assert_eq!(plan.dirs.len(), 1);
        assert_eq!(plan.dirs[0].1.len(), 3);
        assert!(plan.dirs[0].1.iter().all(|s| s.recursive));
    }

    #[test]
    fn test_escape_root_keeps_brackets_literal() {
        let temp_dir = tempdir().unwrap();
        let odd = temp_dir.path().join("we[ir]d");
        fs::create_dir_all(&odd).unwrap();

        let root = format!("{}/**", escape_root(&odd.to_string_lossy()));
        let masks = vec![("*".to_string(), EntryKind::File)];
        let plan = build_plan(&masks, &[root]).unwrap();
        assert_eq!(plan.dirs[0].0, odd);
    }

    fn record(rel: &str, kind: EntryKind) -> FileRecord {
        let path = PathBuf::from(rel);
        FileRecord {
            relative_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            path,
            kind,
            mtime: 0,
        }
    }

    #[test]
    fn test_exclude_subtree() {
        let mask = ExcludeMask::parse("vendor/**").unwrap();
        assert!(mask.applies_to_leaves());
        assert!(!mask.accepts(&record("vendor", EntryKind::Dir)));
        assert!(!mask.accepts(&record("lib/vendor", EntryKind::Dir)));
        assert!(mask.accepts(&record("vendor", EntryKind::File)));
        assert!(mask.accepts(&record("src", EntryKind::Dir)));
    }

    #[test]
    fn test_exclude_level_and_dirs_only_skip_leaves() {
        let level = ExcludeMask::parse("build/*").unwrap();
        assert!(!level.applies_to_leaves());
        assert!(!level.accepts(&record("build", EntryKind::Dir)));

        let dirs = ExcludeMask::parse("cache/").unwrap();
        assert!(!dirs.applies_to_leaves());
        assert!(!dirs.accepts(&record("cache", EntryKind::Dir)));
        assert!(dirs.accepts(&record("cache", EntryKind::File)));
    }

    #[test]
    fn test_exclude_without_suffix_hits_files_and_dirs() {
        let mask = ExcludeMask::parse(".*").unwrap();
        assert!(mask.applies_to_leaves());
        assert!(!mask.accepts(&record(".git", EntryKind::Dir)));
        assert!(!mask.accepts(&record("src/.hidden.php", EntryKind::File)));
        assert!(mask.accepts(&record("src/Foo.php", EntryKind::File)));
    }

    #[test]
    fn test_exclude_leading_slash_and_double_star_are_stripped() {
        let mask = ExcludeMask::parse("/**/tmp").unwrap();
        assert!(!mask.accepts(&record("a/tmp", EntryKind::File)));
    }

    #[test]
    fn test_exclude_empty_pattern_is_invalid() {
        assert!(ExcludeMask::parse("").is_err());
        assert!(ExcludeMask::parse("/").is_err());
        assert!(ExcludeMask::parse("**/").is_err());
    }
}
