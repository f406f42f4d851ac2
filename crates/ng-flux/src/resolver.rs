//! Flux-file discovery and staging.
//!
//! Expands user wildcard patterns against a colon-separated search path,
//! then applies a randomized size/count-capped selection for the flux
//! modes that want it. A remote back-end stages files into a scratch
//! directory that is cleaned per policy on teardown.

use ng_core::{Error, Result};
use rand::rngs::StdRng;
use rand::Rng;
use std::path::{Path, PathBuf};

/// One resolved flux file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxFileEntry {
    /// Local path.
    pub path: PathBuf,
    /// File size in bytes.
    pub bytes: u64,
}

/// How files get from their matched location to the local list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyMethod {
    /// Use matched paths in place.
    Direct,
    /// Fetch through a [`FluxFetcher`] using the named scheme.
    Scheme(String),
}

impl CopyMethod {
    /// Parse the `FluxCopyMethod` configuration value.
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("direct") {
            CopyMethod::Direct
        } else {
            CopyMethod::Scheme(t.to_string())
        }
    }
}

/// Teardown policy for staged scratch copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// Remove every staged file.
    Always,
    /// Leave staged files behind.
    Never,
    /// Remove staged files only when the scratch area starts with this
    /// prefix.
    Prefix(String),
}

impl Cleanup {
    /// Parse the `FluxCleanup` configuration value.
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        if t.eq_ignore_ascii_case("always") {
            Cleanup::Always
        } else if t.eq_ignore_ascii_case("never") {
            Cleanup::Never
        } else {
            Cleanup::Prefix(t.to_string())
        }
    }
}

/// Remote listing/fetching back-end used when the copy method is not
/// `Direct`.
pub trait FluxFetcher {
    /// List `(remote path, size in bytes)` pairs matching a pattern.
    fn list(&self, pattern: &str) -> Result<Vec<(String, u64)>>;

    /// Fetch one remote file to a local destination.
    fn fetch(&self, remote: &str, dest: &Path) -> Result<()>;
}

/// A fetcher that "stages" from a local source tree, used for tests and
/// for file systems mounted read-only.
pub struct CopyFetcher;

impl FluxFetcher for CopyFetcher {
    fn list(&self, pattern: &str) -> Result<Vec<(String, u64)>> {
        let mut out = Vec::new();
        let paths = glob::glob(pattern)
            .map_err(|e| Error::Config(format!("bad flux pattern '{pattern}': {e}")))?;
        for entry in paths {
            let path = entry.map_err(|e| Error::Resource(format!("glob walk failed: {e}")))?;
            if let Ok(meta) = std::fs::metadata(&path) {
                if meta.is_file() {
                    out.push((path.to_string_lossy().into_owned(), meta.len()));
                }
            }
        }
        Ok(out)
    }

    fn fetch(&self, remote: &str, dest: &Path) -> Result<()> {
        std::fs::copy(remote, dest)?;
        Ok(())
    }
}

/// Resolver configuration, filled from the driver's flat key/value map.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Colon-separated directory search path. `$VAR` and `~` are expanded.
    pub search_paths: String,
    /// Shell-style wildcard patterns.
    pub patterns: Vec<String>,
    /// Size cap in MB over the accepted set; 0 disables the cap.
    pub max_mb: u64,
    /// Maximum number of accepted files; 0 disables the cap.
    pub max_files: usize,
    /// Copy method.
    pub copy_method: CopyMethod,
    /// Scratch cleanup policy.
    pub cleanup: Cleanup,
    /// Scratch directory for staged copies.
    pub scratch_dir: PathBuf,
}

/// The resolved, capped flux-file list plus staging bookkeeping.
#[derive(Debug)]
pub struct ResolvedFlux {
    /// Accepted files, in selection order.
    pub files: Vec<FluxFileEntry>,
    /// Scratch directory holding staged copies, if staging was used.
    pub scratch: Option<PathBuf>,
    cleanup: Cleanup,
}

impl ResolvedFlux {
    /// Paths of the accepted files.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Cumulative size of the accepted files in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    /// Remove staged copies per the cleanup policy.
    pub fn teardown(&mut self) {
        let Some(scratch) = self.scratch.take() else { return };
        let remove = match &self.cleanup {
            Cleanup::Always => true,
            Cleanup::Never => false,
            Cleanup::Prefix(prefix) => scratch.to_string_lossy().starts_with(prefix.as_str()),
        };
        if !remove {
            return;
        }
        for f in &self.files {
            if f.path.starts_with(&scratch) {
                if let Err(e) = std::fs::remove_file(&f.path) {
                    tracing::warn!(path = %f.path.display(), "failed to remove staged flux file: {e}");
                }
            }
        }
        let _ = std::fs::remove_dir(&scratch);
    }
}

/// Expand `~` and `$VAR` references in a search-path element.
fn expand_path_element(elem: &str) -> String {
    let mut s = String::with_capacity(elem.len());
    let mut chars = elem.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '~' if s.is_empty() => {
                s.push_str(&std::env::var("HOME").unwrap_or_else(|_| "~".into()));
            }
            '$' => {
                let mut name = String::new();
                if chars.peek() == Some(&'{') {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        name.push(c);
                    }
                } else {
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                match std::env::var(&name) {
                    Ok(v) => s.push_str(&v),
                    Err(_) => {
                        s.push('$');
                        s.push_str(&name);
                    }
                }
            }
            _ => s.push(c),
        }
    }
    s
}

/// Split and expand a colon-separated search path.
pub fn expand_search_paths(search: &str) -> Vec<PathBuf> {
    search
        .split(':')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| PathBuf::from(expand_path_element(p)))
        .collect()
}

/// Randomized, size/count-capped selection.
///
/// Each candidate gets a uniform key; candidates are visited in key order
/// and accepted while the running byte total stays within `max_mb` and the
/// count stays within `max_files`. The first visited candidate is always
/// accepted, so a single oversized match still yields a usable list.
pub fn select_randomized(
    mut candidates: Vec<FluxFileEntry>,
    max_mb: u64,
    max_files: usize,
    rng: &mut StdRng,
) -> Vec<FluxFileEntry> {
    let mut keyed: Vec<(f64, FluxFileEntry)> =
        candidates.drain(..).map(|f| (rng.gen::<f64>(), f)).collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let byte_cap = if max_mb == 0 { u64::MAX } else { max_mb.saturating_mul(1 << 20) };
    let count_cap = if max_files == 0 { usize::MAX } else { max_files };

    let mut accepted = Vec::new();
    let mut total: u64 = 0;
    for (_, f) in keyed {
        if accepted.is_empty() {
            total = total.saturating_add(f.bytes);
            accepted.push(f);
            continue;
        }
        if accepted.len() >= count_cap || total.saturating_add(f.bytes) > byte_cap {
            continue;
        }
        total += f.bytes;
        accepted.push(f);
    }
    accepted
}

fn glob_one(dir: &Path, pattern: &str) -> Result<Vec<FluxFileEntry>> {
    let full = dir.join(pattern);
    let full_str = full.to_string_lossy().into_owned();
    let mut out = Vec::new();
    let paths = glob::glob(&full_str)
        .map_err(|e| Error::Config(format!("bad flux pattern '{full_str}': {e}")))?;
    for entry in paths {
        let path = entry.map_err(|e| Error::Resource(format!("glob walk failed: {e}")))?;
        let meta = std::fs::metadata(&path)?;
        if meta.is_file() {
            out.push(FluxFileEntry { path, bytes: meta.len() });
        }
    }
    Ok(out)
}

/// Flux-file resolver.
pub struct FluxFileResolver {
    cfg: ResolverConfig,
}

impl FluxFileResolver {
    /// New resolver over the given configuration.
    pub fn new(cfg: ResolverConfig) -> Self {
        Self { cfg }
    }

    /// Union of the glob expansions of every (search dir × pattern) pair.
    ///
    /// Match order is directory-major then pattern-major, which is the
    /// order the ordered (histogram/atmospheric) modes preserve.
    fn expand_local(&self, patterns: &[String]) -> Result<Vec<FluxFileEntry>> {
        let dirs = expand_search_paths(&self.cfg.search_paths);
        let mut out: Vec<FluxFileEntry> = Vec::new();
        for dir in &dirs {
            for pat in patterns {
                for f in glob_one(dir, pat)? {
                    if !out.iter().any(|e| e.path == f.path) {
                        out.push(f);
                    }
                }
            }
        }
        // Absolute patterns bypass the search path.
        for pat in patterns {
            if Path::new(pat).is_absolute() {
                for f in glob_one(Path::new("/"), pat.trim_start_matches('/'))? {
                    if !out.iter().any(|e| e.path == f.path) {
                        out.push(f);
                    }
                }
            }
        }
        Ok(out)
    }

    fn expand_remote(
        &self,
        fetcher: &dyn FluxFetcher,
        patterns: &[String],
    ) -> Result<Vec<FluxFileEntry>> {
        let dirs = expand_search_paths(&self.cfg.search_paths);
        let mut out: Vec<FluxFileEntry> = Vec::new();
        for dir in &dirs {
            for pat in patterns {
                let full = dir.join(pat).to_string_lossy().into_owned();
                for (remote, bytes) in fetcher.list(&full)? {
                    let entry = FluxFileEntry { path: PathBuf::from(remote), bytes };
                    if !out.iter().any(|e| e.path == entry.path) {
                        out.push(entry);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Resolve with randomized selection and caps (tree-family and dk2nu
    /// modes). Fails with [`Error::Resource`] on an empty match set.
    pub fn resolve_randomized(
        &self,
        rng: &mut StdRng,
        fetcher: Option<&dyn FluxFetcher>,
    ) -> Result<ResolvedFlux> {
        // Duplicate patterns would double a file's selection odds.
        let mut patterns: Vec<String> = Vec::new();
        for p in &self.cfg.patterns {
            if !patterns.contains(p) {
                patterns.push(p.clone());
            }
        }

        let matched = match (&self.cfg.copy_method, fetcher) {
            (CopyMethod::Direct, _) => self.expand_local(&patterns)?,
            (CopyMethod::Scheme(_), Some(f)) => self.expand_remote(f, &patterns)?,
            (CopyMethod::Scheme(s), None) => {
                return Err(Error::Config(format!(
                    "flux copy scheme '{s}' requested but no fetcher is available"
                )))
            }
        };
        if matched.is_empty() {
            return Err(Error::Resource(format!(
                "no flux files match patterns {:?} on search path '{}'",
                patterns, self.cfg.search_paths
            )));
        }

        let accepted = select_randomized(matched, self.cfg.max_mb, self.cfg.max_files, rng);
        tracing::info!(
            n_files = accepted.len(),
            total_bytes = accepted.iter().map(|f| f.bytes).sum::<u64>(),
            "flux file selection complete"
        );

        match (&self.cfg.copy_method, fetcher) {
            (CopyMethod::Direct, _) => {
                Ok(ResolvedFlux { files: accepted, scratch: None, cleanup: Cleanup::Never })
            }
            (CopyMethod::Scheme(_), Some(f)) => self.stage(accepted, f),
            _ => unreachable!("checked above"),
        }
    }

    /// Resolve preserving match order with no caps (histogram and
    /// atmospheric modes). An empty match set only warns.
    pub fn resolve_ordered(&self) -> Result<ResolvedFlux> {
        let matched = self.expand_local(&self.cfg.patterns)?;
        if matched.is_empty() {
            tracing::warn!(
                patterns = ?self.cfg.patterns,
                "no flux files matched; continuing with an empty list"
            );
        }
        Ok(ResolvedFlux { files: matched, scratch: None, cleanup: Cleanup::Never })
    }

    fn stage(&self, accepted: Vec<FluxFileEntry>, fetcher: &dyn FluxFetcher) -> Result<ResolvedFlux> {
        let scratch = self.cfg.scratch_dir.clone();
        std::fs::create_dir_all(&scratch)?;
        let mut staged = Vec::with_capacity(accepted.len());
        for f in accepted {
            let name = f
                .path
                .file_name()
                .ok_or_else(|| Error::Resource(format!("unusable remote path {:?}", f.path)))?;
            let dest = scratch.join(name);
            fetcher.fetch(&f.path.to_string_lossy(), &dest)?;
            staged.push(FluxFileEntry { path: dest, bytes: f.bytes });
        }
        tracing::info!(n_files = staged.len(), scratch = %scratch.display(), "flux files staged");
        Ok(ResolvedFlux { files: staged, scratch: Some(scratch), cleanup: self.cfg.cleanup.clone() })
    }
}
