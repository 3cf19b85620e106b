//! Fresh image creation through the external formatter tool.

use crate::config::FormatterConfig;
use frs_error::{FrsError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

pub const FORMATTER_BINARY: &str = "formatter";
pub const FILESYSTEM_NAME: &str = "nifat32";

/// Builds the formatter with `make`, formats an image, and moves it into
/// place.
#[derive(Debug, Clone)]
pub struct FormatterImage {
    dir: PathBuf,
    options: FormatterConfig,
    clean: bool,
    make: String,
}

impl FormatterImage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, options: FormatterConfig) -> Self {
        Self {
            dir: dir.into(),
            options,
            clean: false,
            make: "make".to_owned(),
        }
    }

    /// Remove the formatter binary once the image exists.
    #[must_use]
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    #[must_use]
    pub fn with_make(mut self, make: &str) -> Self {
        make.clone_into(&mut self.make);
        self
    }

    /// Formatter arguments producing `output_name` in the formatter directory.
    #[must_use]
    pub fn arguments(&self, output_name: &str) -> Vec<String> {
        let o = &self.options;
        vec![
            "-o".to_owned(),
            output_name.to_owned(),
            "-s".to_owned(),
            FILESYSTEM_NAME.to_owned(),
            "--volume-size".to_owned(),
            o.image_size_mb.to_string(),
            "--spc".to_owned(),
            o.sectors_per_cluster.to_string(),
            "--fc".to_owned(),
            o.fat_count.to_string(),
            "--bsbc".to_owned(),
            o.bootsector_count.to_string(),
            "--jc".to_owned(),
            o.journal_count.to_string(),
        ]
    }

    /// Produce a new image at `destination`.
    pub fn build(&self, destination: &Path) -> Result<PathBuf> {
        let output_name = destination
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                FrsError::InvalidConfig(format!(
                    "image path {} has no file name",
                    destination.display()
                ))
            })?;

        info!(dir = %self.dir.display(), "building formatter");
        run_tool(Command::new(&self.make).current_dir(&self.dir), "make")?;

        let formatter = std::path::absolute(self.dir.join(FORMATTER_BINARY))?;
        let args = self.arguments(output_name);
        info!(?args, "formatting image");
        run_tool(
            Command::new(&formatter).args(&args).current_dir(&self.dir),
            FORMATTER_BINARY,
        )?;

        if self.clean {
            debug!(path = %formatter.display(), "removing formatter binary");
            fs::remove_file(&formatter)?;
        }

        let produced = self.dir.join(output_name);
        move_file(&produced, destination)?;
        info!(image = %destination.display(), "image ready");
        Ok(destination.to_path_buf())
    }
}

fn run_tool(command: &mut Command, program: &str) -> Result<()> {
    let build_error = |detail: String| FrsError::Build {
        program: program.to_owned(),
        detail,
    };
    let output = command
        .output()
        .map_err(|error| build_error(format!("cannot run: {error}")))?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(build_error(format!(
            "exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

/// Rename, falling back to copy and remove across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}
