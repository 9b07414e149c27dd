use crate::errors::LoadError;
use crate::model::FILE_SCHEME;
use globset::GlobBuilder;
use std::path::{Component, Path, PathBuf};

/// How a string in a reference position should be treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'a> {
    /// `file://<path>`; holds the path part.
    File(&'a str),
    /// `<scheme>://...` with a scheme other than `file`.
    Unsupported { scheme: &'a str },
    /// Anything else; inline text where the position allows it.
    Inline(&'a str),
}

impl<'a> Reference<'a> {
    pub fn parse(s: &'a str) -> Self {
        let trimmed = s.trim();
        if let Some(rest) = trimmed.strip_prefix(FILE_SCHEME) {
            return Reference::File(rest);
        }
        if let Some((scheme, _)) = trimmed.split_once("://") {
            let looks_like_scheme = !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if looks_like_scheme && !trimmed.contains(char::is_whitespace) {
                return Reference::Unsupported { scheme };
            }
        }
        Reference::Inline(s)
    }
}

/// Resolves `file://` paths against the repository root, i.e. the directory
/// holding the root configuration.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base_dir: PathBuf,
}

impl PathResolver {
    pub fn new(config_path: &Path) -> Self {
        let base_dir = match config_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self { base_dir }
    }

    pub fn from_root(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn resolve(&self, rel: &str) -> PathBuf {
        let p = Path::new(rel);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    /// Root-relative, `/`-separated form used in messages and plan output.
    pub fn display(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.base_dir).unwrap_or(path);
        normalize(rel)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// False when the reference climbs out of the repository root (`../`, absolute paths).
    pub fn is_within_root(&self, rel: &str) -> bool {
        let p = Path::new(rel);
        if p.is_absolute() {
            return false;
        }
        let mut depth: i64 = 0;
        for c in p.components() {
            match c {
                Component::ParentDir => depth -= 1,
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) => return false,
            }
            if depth < 0 {
                return false;
            }
        }
        true
    }

    /// Expands a reference path into existing files, glob patterns included.
    /// Matches come back in lexicographic order.
    pub fn expand(&self, rel: &str) -> Result<Vec<PathBuf>, LoadError> {
        let reference = format!("{}{}", FILE_SCHEME, rel);
        if !is_glob(rel) {
            let path = self.resolve(rel);
            return if path.is_file() {
                Ok(vec![path])
            } else {
                Err(LoadError::NotFound { reference })
            };
        }

        let glob = GlobBuilder::new(rel)
            .literal_separator(true)
            .build()
            .map_err(|e| LoadError::Shape {
                path: rel.to_string(),
                detail: format!("invalid glob: {}", e),
            })?
            .compile_matcher();

        // Walk only below the non-glob prefix of the pattern.
        let prefix: PathBuf = Path::new(rel)
            .components()
            .take_while(|c| !is_glob(&c.as_os_str().to_string_lossy()))
            .collect();
        let mut found = Vec::new();
        walk_files(&self.resolve(&prefix.to_string_lossy()), &mut found);

        let mut matches: Vec<PathBuf> = found
            .into_iter()
            .filter(|p| {
                let rel_path = p.strip_prefix(&self.base_dir).unwrap_or(p);
                glob.is_match(rel_path)
            })
            .collect();
        matches.sort();

        if matches.is_empty() {
            return Err(LoadError::EmptyGlob { reference });
        }
        Ok(matches)
    }
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Collects regular files below `dir`. Symlinked directories are not followed.
fn walk_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(ft) = entry.file_type() else { continue };
        let path = entry.path();
        if ft.is_dir() {
            walk_files(&path, out);
        } else if ft.is_file() || (ft.is_symlink() && path.is_file()) {
            out.push(path);
        }
    }
}

/// Lexical normalization: drops `.` and folds `dir/..`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
