//! Per-job workspace management
//!
//! Every job owns one directory tree keyed by its id:
//!
//! ```text
//! <jobs_root>/<job_id>/
//!     input_video.mp4
//!     <stage>/input/     artifacts handed to the stage tool
//!     <stage>/output/    artifacts the stage tool produced
//!     results/           final downloadable artifacts
//! ```
//!
//! Stage tools receive their input/output directories explicitly, so two
//! concurrent jobs never share a staging directory and need no cross-job
//! lock.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use vidiolingua_common::Result;

/// Stable name the uploaded media is stored under
pub const UPLOAD_FILE_NAME: &str = "input_video.mp4";

/// Name of the final artifact directory
pub const RESULTS_DIR_NAME: &str = "results";

/// Remove everything inside `dir`. A missing directory is treated as
/// already empty.
pub fn reset(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Copy every regular file (non-recursive) from `src` into `dst`,
/// preserving names. Creates `dst`; a missing `src` copies nothing.
/// Returns the number of files copied.
pub fn forward(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst)?;
    if !src.exists() {
        return Ok(0);
    }
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
            copied += 1;
        }
    }
    debug!(src = %src.display(), dst = %dst.display(), copied, "forwarded artifacts");
    Ok(copied)
}

/// Handle to one job's exclusively-owned directory tree
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    /// Create the workspace root for a job (parents included)
    pub fn create(jobs_root: &Path, job_id: &str) -> Result<Self> {
        let root = jobs_root.join(job_id);
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Wrap an existing workspace root
    #[must_use]
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the uploaded media is saved at
    #[must_use]
    pub fn upload_path(&self) -> PathBuf {
        self.root.join(UPLOAD_FILE_NAME)
    }

    /// Input directory for a stage
    #[must_use]
    pub fn stage_input(&self, stage: &str) -> PathBuf {
        self.root.join(stage).join("input")
    }

    /// Output directory for a stage
    #[must_use]
    pub fn stage_output(&self, stage: &str) -> PathBuf {
        self.root.join(stage).join("output")
    }

    /// Directory the final artifacts are served from
    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR_NAME)
    }

    /// Ensure a stage's input/output pair exists and holds nothing stale
    /// from a prior run. Returns `(input, output)`.
    pub fn prepare_stage(&self, stage: &str) -> Result<(PathBuf, PathBuf)> {
        let input = self.stage_input(stage);
        let output = self.stage_output(stage);
        fs::create_dir_all(&input)?;
        fs::create_dir_all(&output)?;
        reset(&input)?;
        reset(&output)?;
        Ok((input, output))
    }
}
