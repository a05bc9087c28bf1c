//! Dynamic library resolution
//!
//! Finds a shared library by name using platform naming conventions and search
//! paths, then loads it with `libloading`.

use libloading::Library;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Library loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// Library file not found in search paths
    #[error("could not find library '{0}'")]
    LibraryNotFound(String),
    /// Required symbol not exported by the library
    #[error("symbol '{symbol}' not found in library '{library}'")]
    SymbolNotFound { library: String, symbol: String },
    /// The dynamic loader rejected the file
    #[error("failed to load library: {0}")]
    LoadFailed(String),
}

/// Resolves library names to files and loads them
///
/// # Safety
///
/// Loading a dynamic library runs its initialization code inside this process.
/// Only load libraries you trust.
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    /// Directories searched in order
    search_paths: Vec<PathBuf>,
}

impl LibraryResolver {
    /// Create a resolver with the platform search list
    pub fn new() -> Self {
        Self {
            search_paths: Self::default_search_paths(),
        }
    }

    /// Platform search list
    ///
    /// Current directory first, then the dynamic loader's environment variable,
    /// then the standard system directories:
    /// - Linux: LD_LIBRARY_PATH, /usr/local/lib, multiarch dirs, /usr/lib, /lib (+ lib64)
    /// - macOS: DYLD_LIBRARY_PATH, /usr/local/lib, /opt/homebrew/lib, /usr/lib
    /// - Windows: PATH, System32
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd);
        }

        let env_var = if cfg!(target_os = "windows") {
            "PATH"
        } else if cfg!(target_os = "macos") {
            "DYLD_LIBRARY_PATH"
        } else {
            "LD_LIBRARY_PATH"
        };
        if let Some(value) = env::var_os(env_var) {
            paths.extend(env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()));
        }

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/usr/local/lib"));
            // Debian/Ubuntu multiarch layout
            let triple = format!("{}-linux-gnu", env::consts::ARCH);
            paths.push(Path::new("/usr/lib").join(&triple));
            paths.push(Path::new("/lib").join(&triple));
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/lib"));

            if cfg!(target_pointer_width = "64") {
                paths.push(PathBuf::from("/usr/lib64"));
                paths.push(PathBuf::from("/lib64"));
            }
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/opt/homebrew/lib"));
            paths.push(PathBuf::from("/usr/lib"));
        }

        #[cfg(target_os = "windows")]
        {
            paths.push(PathBuf::from("C:\\Windows\\System32"));
            if let Ok(system_root) = env::var("SystemRoot") {
                paths.push(PathBuf::from(format!("{}\\System32", system_root)));
            }
        }

        paths
    }

    /// Candidate file names for a library name, in priority order
    ///
    /// - Linux: lib{name}.so, {name}.so
    /// - macOS: lib{name}.dylib, lib{name}.so, {name}.dylib, {name}.so
    /// - Windows: {name}.dll, lib{name}.dll
    fn candidate_names(name: &str) -> Vec<String> {
        let extensions: &[&str] = if cfg!(target_os = "windows") {
            &["dll"]
        } else if cfg!(target_os = "macos") {
            &["dylib", "so"]
        } else {
            &["so"]
        };

        let prefixes: &[&str] = if cfg!(target_os = "windows") {
            &["", "lib"]
        } else {
            &["lib", ""]
        };

        prefixes
            .iter()
            .flat_map(|prefix| {
                extensions
                    .iter()
                    .map(move |ext| format!("{}{}.{}", prefix, name, ext))
            })
            .collect()
    }

    /// Resolve a library name (or path) to an existing file
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.candidates(name).into_iter().next()
    }

    /// Every existing file `name` may refer to, in priority order
    ///
    /// Per directory: the name itself if it has an extension, the platform
    /// candidate names, then versioned sonames (`lib{name}.so.N`) newest first.
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let path = Path::new(name);
        if path.components().count() > 1 {
            return path.is_file().then(|| path.to_path_buf()).into_iter().collect();
        }

        let mut names = Self::candidate_names(name);
        if path.extension().is_some() {
            names.insert(0, name.to_string());
        }

        let mut found = Vec::new();
        for dir in &self.search_paths {
            found.extend(names.iter().map(|file| dir.join(file)).filter(|p| p.is_file()));
            found.extend(Self::versioned_sonames(dir, name));
        }
        found.dedup();
        found
    }

    /// `lib{name}.so.<version>` files in `dir`, highest version first
    #[cfg(all(unix, not(target_os = "macos")))]
    fn versioned_sonames(dir: &Path, name: &str) -> Vec<PathBuf> {
        let prefix = format!("lib{}.so.", name);
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut sonames: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_name().to_str().is_some_and(|file| {
                    file.strip_prefix(&prefix).is_some_and(|version| {
                        !version.is_empty()
                            && version.chars().all(|c| c.is_ascii_digit() || c == '.')
                    })
                })
            })
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        sonames.sort_by(|a, b| b.cmp(a));
        sonames
    }

    #[cfg(not(all(unix, not(target_os = "macos"))))]
    fn versioned_sonames(_dir: &Path, _name: &str) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Resolve and load a library
    ///
    /// Candidate files are tried in order; a file the loader rejects (e.g. a
    /// linker script named `libm.so`) does not stop the search. When no file
    /// loads, the name is handed to the dynamic loader so its own rules (ld.so
    /// cache, RUNPATH, ...) apply. Fails with [`LoadError::LibraryNotFound`]
    /// when nothing matched at all.
    pub fn load(&self, name: &str) -> Result<Library, LoadError> {
        let mut rejected = None;
        for path in self.candidates(name) {
            // SAFETY: loading runs the library's initializers; callers opt in by naming it.
            match unsafe { Library::new(&path) } {
                Ok(library) => {
                    tracing::debug!(library = name, path = %path.display(), "loaded library");
                    return Ok(library);
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "loader rejected candidate");
                    rejected.get_or_insert_with(|| e.to_string());
                }
            }
        }

        if let Some(library) = Self::load_from_system(name) {
            return Ok(library);
        }

        Err(match rejected {
            Some(reason) => LoadError::LoadFailed(reason),
            None => LoadError::LibraryNotFound(name.to_string()),
        })
    }

    /// Let the dynamic loader search by itself
    fn load_from_system(name: &str) -> Option<Library> {
        let path = Path::new(name);
        if path.components().count() > 1 {
            return None;
        }

        let mut names = vec![libloading::library_filename(name)];
        if path.extension().is_some() {
            names.insert(0, name.into());
        }
        names.into_iter().find_map(|file| {
            // SAFETY: as above.
            let library = unsafe { Library::new(&file) }.ok()?;
            tracing::debug!(library = name, file = ?file, "loaded library through the system loader");
            Some(library)
        })
    }

    /// Add a search path ahead of all others
    pub fn add_search_path(&mut self, path: PathBuf) {
        self.search_paths.insert(0, path);
    }

    /// Directories searched, in order
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for LibraryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for LibraryResolver {
    /// Resolver searching the given directories before the platform list
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut search_paths: Vec<PathBuf> = iter.into_iter().map(Into::into).collect();
        search_paths.extend(Self::default_search_paths());
        Self { search_paths }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_search_paths_not_empty() {
        let paths = LibraryResolver::default_search_paths();
        assert!(!paths.is_empty());

        if let Ok(cwd) = env::current_dir() {
            assert_eq!(paths[0], cwd);
        }
    }

    #[test]
    fn test_platform_specific_paths() {
        let paths = LibraryResolver::default_search_paths();

        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            assert!(paths.iter().any(|p| p == Path::new("/usr/lib")));
        }

        #[cfg(target_os = "windows")]
        {
            assert!(paths
                .iter()
                .any(|p| p.to_string_lossy().contains("System32")));
        }
    }

    #[test]
    fn test_candidate_names_prefer_lib_prefix_on_unix() {
        let names = LibraryResolver::candidate_names("clingolpx");

        #[cfg(target_os = "linux")]
        assert_eq!(names, vec!["libclingolpx.so", "clingolpx.so"]);

        #[cfg(target_os = "windows")]
        assert_eq!(names, vec!["clingolpx.dll", "libclingolpx.dll"]);

        assert!(!names.is_empty());
    }

    #[test]
    fn test_library_not_found() {
        let resolver = LibraryResolver::new();
        let result = resolver.load("nonexistent_library_xyz");
        assert_eq!(
            result.err(),
            Some(LoadError::LibraryNotFound(
                "nonexistent_library_xyz".to_string()
            ))
        );
    }

    #[test]
    fn test_resolve_in_custom_search_path() {
        let dir = TempDir::new().unwrap();
        let file = dir
            .path()
            .join(&LibraryResolver::candidate_names("fakelpx")[0]);
        fs::write(&file, b"not really a library").unwrap();

        let mut resolver = LibraryResolver::new();
        assert_eq!(resolver.resolve("fakelpx"), None);

        resolver.add_search_path(dir.path().to_path_buf());
        assert_eq!(resolver.resolve("fakelpx"), Some(file.clone()));

        // Explicit paths are used as given
        assert_eq!(resolver.resolve(file.to_str().unwrap()), Some(file));
    }

    #[test]
    fn test_loading_garbage_reports_load_failure() {
        let dir = TempDir::new().unwrap();
        let file = dir
            .path()
            .join(&LibraryResolver::candidate_names("garbage")[0]);
        fs::write(&file, b"\x00\x01 definitely not an object file").unwrap();

        let resolver: LibraryResolver = [dir.path()].into_iter().collect();
        assert!(matches!(
            resolver.load("garbage"),
            Err(LoadError::LoadFailed(_))
        ));
    }

    #[test]
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn test_load_system_library_by_short_name() {
        // libm lives in the multiarch dir on Debian; `libm.so` may be a linker script
        let resolver = LibraryResolver::new();
        assert!(resolver.load("m").is_ok());
        assert!(resolver.load("libm.so.6").is_ok());
    }

    #[test]
    #[cfg(all(unix, not(target_os = "macos")))]
    fn test_versioned_soname_is_a_candidate() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("libfakelpx.so.1"), b"old").unwrap();
        fs::write(dir.path().join("libfakelpx.so.2"), b"new").unwrap();
        fs::write(dir.path().join("libfakelpx.so.2.bak"), b"ignored").unwrap();

        let resolver: LibraryResolver = [dir.path()].into_iter().collect();
        assert_eq!(
            resolver.candidates("fakelpx"),
            vec![
                dir.path().join("libfakelpx.so.2"),
                dir.path().join("libfakelpx.so.1"),
            ]
        );
    }

    #[test]
    fn test_rejected_candidates_report_load_failure() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join(&LibraryResolver::candidate_names("scriptlpx")[0]);
        fs::write(&file, b"GROUP ( /lib/libscriptlpx.so.1 )").unwrap();

        let resolver: LibraryResolver = [dir.path()].into_iter().collect();
        assert!(matches!(resolver.load("scriptlpx"), Err(LoadError::LoadFailed(_))));
    }

    #[test]
    fn test_add_custom_search_path() {
        let mut resolver = LibraryResolver::new();
        let custom_path = PathBuf::from("/custom/path");
        resolver.add_search_path(custom_path.clone());

        assert_eq!(resolver.search_paths()[0], custom_path);
    }
}
