//! Validation program discovery and the C build service.

use crate::config::HarnessConfig;
use crate::orchestrator::{BuildMode, ValidationBinary, ValidationBuilder, ValidationProgram};
use frs_error::{FrsError, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Preprocessor symbol that compiles out destructive setup.
pub const NO_CREATION_DEFINE: &str = "NO_CREATION";

/// `<prefix>*.c` files in `dir`, sorted by name.
pub fn discover_programs(dir: &Path, prefix: &str) -> Result<Vec<ValidationProgram>> {
    let mut programs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension() != Some(OsStr::new("c")) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(OsStr::to_str) else {
            continue;
        };
        if stem.starts_with(prefix) {
            programs.push(ValidationProgram {
                name: stem.to_owned(),
                source: path.clone(),
            });
        }
    }
    programs.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(dir = %dir.display(), found = programs.len(), "validation programs discovered");
    Ok(programs)
}

/// Filesystem implementation sources: every `.c` under `root`, skipping the
/// `excludes` paths, hidden directories and files that define their own
/// `main`.
pub fn collect_sources(root: &Path, excludes: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let excludes: Vec<PathBuf> = excludes
        .iter()
        .filter_map(|path| fs::canonicalize(path).ok())
        .collect();
    let mut sources = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if is_excluded(&path, &excludes) {
                debug!(path = %path.display(), "excluded from build sources");
                continue;
            }
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if entry.file_type()?.is_dir() {
                if !hidden {
                    pending.push(path);
                }
            } else if path.extension() == Some(OsStr::new("c")) {
                let text = fs::read(&path)?;
                if defines_entry_point(&String::from_utf8_lossy(&text)) {
                    debug!(path = %path.display(), "skipping source with its own main");
                } else {
                    sources.push(path);
                }
            }
        }
    }
    sources.sort();
    Ok(sources)
}

fn is_excluded(path: &Path, excludes: &[PathBuf]) -> bool {
    match fs::canonicalize(path) {
        Ok(canonical) => excludes.contains(&canonical),
        Err(_) => false,
    }
}

/// True when some line of `source` opens a `main` definition.
fn defines_entry_point(source: &str) -> bool {
    for line in source.lines() {
        let line = line.trim_start();
        for head in ["int main", "void main"] {
            if let Some(rest) = line.strip_prefix(head) {
                if rest.trim_start().starts_with('(') {
                    return true;
                }
            }
        }
    }
    false
}

/// Compiles validation programs with a C compiler against the filesystem
/// sources and a fixed image path.
#[derive(Debug, Clone)]
pub struct CcBuilder {
    compiler: String,
    flags: Vec<String>,
    include_dirs: Vec<PathBuf>,
    sources: Vec<PathBuf>,
    image: PathBuf,
    out_dir: PathBuf,
}

impl CcBuilder {
    #[must_use]
    pub fn new(compiler: &str, image: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            compiler: compiler.to_owned(),
            flags: Vec::new(),
            include_dirs: Vec::new(),
            sources: Vec::new(),
            image: image.into(),
            out_dir: out_dir.into(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let paths = &config.paths;
        let mut excludes = vec![paths.tests_folder.clone()];
        excludes.extend(paths.formatter.iter().cloned());
        for path in &config.build.exclude {
            excludes.push(paths.root_folder.join(path));
        }
        let sources = collect_sources(&paths.root_folder, &excludes)?;
        Ok(Self::new(
            &config.build.compiler,
            std::path::absolute(&paths.image)?,
            &paths.build_dir,
        )
        .with_flags(config.build.flags.clone())
        .with_include_dir(&paths.root_folder)
        .with_sources(sources))
    }

    #[must_use]
    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.sources = sources;
        self
    }

    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    #[must_use]
    pub fn output_path(&self, program: &ValidationProgram) -> PathBuf {
        self.out_dir.join(&program.name)
    }

    /// Compiler arguments for one program.
    #[must_use]
    pub fn arguments(&self, program: &ValidationProgram, mode: BuildMode) -> Vec<String> {
        let mut args = self.flags.clone();
        for dir in &self.include_dirs {
            args.push(format!("-I{}", dir.display()));
        }
        args.push(format!("-DIMAGE_PATH=\"{}\"", self.image.display()));
        if !mode.allows_creation() {
            args.push(format!("-D{NO_CREATION_DEFINE}"));
        }
        args.push(program.source.display().to_string());
        args.extend(self.sources.iter().map(|src| src.display().to_string()));
        args.push("-o".to_owned());
        args.push(self.output_path(program).display().to_string());
        args
    }
}

impl ValidationBuilder for CcBuilder {
    fn build(&mut self, program: &ValidationProgram, mode: BuildMode) -> Result<ValidationBinary> {
        let build_error = |detail: String| FrsError::Build {
            program: program.name.clone(),
            detail,
        };
        if let Err(error) = fs::create_dir_all(&self.out_dir) {
            let detail = format!("create {}: {error}", self.out_dir.display());
            return Err(build_error(detail));
        }

        let args = self.arguments(program, mode);
        debug!(compiler = %self.compiler, ?args, "compiling");
        let output = Command::new(&self.compiler)
            .args(&args)
            .output()
            .map_err(|error| build_error(format!("cannot run {}: {error}", self.compiler)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(build_error(format!(
                "{} exited with {}: {}",
                self.compiler,
                output.status,
                stderr.trim()
            )));
        }

        Ok(ValidationBinary {
            name: program.name.clone(),
            path: self.output_path(program),
            mode,
        })
    }
}
