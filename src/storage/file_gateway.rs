//! Session file gateway: the single owner of the on-disk session layout.
//!
//! ```text
//! {sessions_root}/{session_id}/
//!     session.json
//!     standards-bundle.md
//!     plan.md
//!     iteration-{n}/
//!         planning-prompt.md    planning-response.md
//!         generation-prompt.md  generation-response.md
//!         review-prompt.md      review-response.md
//!         revision-prompt.md    revision-response.md
//!         code/<relative path>
//! ```
//!
//! Callers work with `(iteration, phase)` semantics; raw paths stay here.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{EngineError, Result};
use crate::models::WorkflowPhase;
use crate::validation::{validate_artifact_path, validate_within_root};

pub const SESSION_FILE: &str = "session.json";
pub const STANDARDS_BUNDLE_FILE: &str = "standards-bundle.md";
pub const PLAN_FILE: &str = "plan.md";

/// Prompt and response filenames for a content-producing phase.
pub fn phase_files(phase: WorkflowPhase) -> Option<(&'static str, &'static str)> {
    match phase {
        WorkflowPhase::Plan => Some(("planning-prompt.md", "planning-response.md")),
        WorkflowPhase::Generate => Some(("generation-prompt.md", "generation-response.md")),
        WorkflowPhase::Review => Some(("review-prompt.md", "review-response.md")),
        WorkflowPhase::Revise => Some(("revision-prompt.md", "revision-response.md")),
        _ => None,
    }
}

fn require_phase_files(phase: WorkflowPhase) -> Result<(&'static str, &'static str)> {
    phase_files(phase).ok_or(EngineError::Unsupported("file access for a sentinel phase"))
}

#[derive(Debug, Clone)]
pub struct SessionFileGateway {
    session_dir: PathBuf,
}

impl SessionFileGateway {
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: session_dir.into(),
        }
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn ensure_session_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.session_dir)?;
        Ok(&self.session_dir)
    }

    pub fn iteration_dir(&self, iteration: u32) -> PathBuf {
        self.session_dir.join(format!("iteration-{iteration}"))
    }

    pub fn ensure_iteration_dir(&self, iteration: u32) -> Result<PathBuf> {
        let dir = self.iteration_dir(iteration);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn code_dir(&self, iteration: u32) -> PathBuf {
        self.iteration_dir(iteration).join("code")
    }

    // ------------------------------------------------------------------
    // Prompt and response files
    // ------------------------------------------------------------------

    pub fn prompt_path(&self, iteration: u32, phase: WorkflowPhase) -> Result<PathBuf> {
        let (prompt, _) = require_phase_files(phase)?;
        Ok(self.iteration_dir(iteration).join(prompt))
    }

    pub fn response_path(&self, iteration: u32, phase: WorkflowPhase) -> Result<PathBuf> {
        let (_, response) = require_phase_files(phase)?;
        Ok(self.iteration_dir(iteration).join(response))
    }

    pub fn prompt_exists(&self, iteration: u32, phase: WorkflowPhase) -> bool {
        self.prompt_path(iteration, phase)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    pub fn response_exists(&self, iteration: u32, phase: WorkflowPhase) -> bool {
        self.response_path(iteration, phase)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    pub fn read_prompt(&self, iteration: u32, phase: WorkflowPhase) -> Result<String> {
        let path = self.prompt_path(iteration, phase)?;
        read_required(&path)
    }

    pub fn read_response(&self, iteration: u32, phase: WorkflowPhase) -> Result<String> {
        let path = self.response_path(iteration, phase)?;
        read_required(&path)
    }

    pub fn write_prompt(
        &self,
        iteration: u32,
        phase: WorkflowPhase,
        content: &str,
    ) -> Result<PathBuf> {
        self.ensure_iteration_dir(iteration)?;
        let path = self.prompt_path(iteration, phase)?;
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn write_response(
        &self,
        iteration: u32,
        phase: WorkflowPhase,
        content: &str,
    ) -> Result<PathBuf> {
        self.ensure_iteration_dir(iteration)?;
        let path = self.response_path(iteration, phase)?;
        fs::write(&path, content)?;
        Ok(path)
    }

    // ------------------------------------------------------------------
    // Code files
    // ------------------------------------------------------------------

    /// Validate `relative_path` and write it under `iteration-{n}/code/`.
    ///
    /// Returns the normalized relative path and the absolute path written.
    pub fn write_code_file(
        &self,
        iteration: u32,
        relative_path: &str,
        content: &str,
    ) -> Result<(String, PathBuf)> {
        let normalized = validate_artifact_path(relative_path)?;
        let code_dir = self.code_dir(iteration);
        let target = validate_within_root(&code_dir.join(&normalized), &code_dir)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;
        Ok((normalized, target))
    }

    /// All code files for an iteration, keyed by path relative to `code/`.
    pub fn read_code_files(&self, iteration: u32) -> Result<BTreeMap<String, String>> {
        let code_dir = self.code_dir(iteration);
        let mut files = BTreeMap::new();
        if code_dir.exists() {
            collect_files(&code_dir, &code_dir, &mut files)?;
        }
        Ok(files)
    }

    // ------------------------------------------------------------------
    // Session-level files
    // ------------------------------------------------------------------

    pub fn plan_path(&self) -> PathBuf {
        self.session_dir.join(PLAN_FILE)
    }

    pub fn plan_exists(&self) -> bool {
        self.plan_path().exists()
    }

    pub fn read_plan(&self) -> Result<String> {
        read_required(&self.plan_path())
    }

    pub fn standards_bundle_path(&self) -> PathBuf {
        self.session_dir.join(STANDARDS_BUNDLE_FILE)
    }

    pub fn write_standards_bundle(&self, content: &str) -> Result<PathBuf> {
        self.ensure_session_dir()?;
        let path = self.standards_bundle_path();
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Read a file if it exists; missing files are not an error here.
    pub fn read_optional(&self, path: &Path) -> Result<Option<String>> {
        if path.exists() {
            Ok(Some(fs::read_to_string(path)?))
        } else {
            Ok(None)
        }
    }
}

fn read_required(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(EngineError::MissingFile(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

fn collect_files(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .map_err(|_| EngineError::PathEscape {
                    path: path.clone(),
                    root: root.to_path_buf(),
                })?
                .to_string_lossy()
                .replace('\\', "/");
            out.insert(relative, fs::read_to_string(&path)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn gateway() -> (tempfile::TempDir, SessionFileGateway) {
        let dir = tempdir().unwrap();
        let gateway = SessionFileGateway::new(dir.path().join("session-1"));
        (dir, gateway)
    }

    #[test]
    fn test_prompt_round_trip() {
        let (_dir, gateway) = gateway();
        assert!(!gateway.prompt_exists(1, WorkflowPhase::Plan));

        gateway
            .write_prompt(1, WorkflowPhase::Plan, "plan the work")
            .unwrap();
        assert!(gateway.prompt_exists(1, WorkflowPhase::Plan));
        assert_eq!(
            gateway.read_prompt(1, WorkflowPhase::Plan).unwrap(),
            "plan the work"
        );
    }

    #[test]
    fn test_phase_file_names() {
        let (_dir, gateway) = gateway();
        let path = gateway.response_path(2, WorkflowPhase::Revise).unwrap();
        assert!(path.ends_with("iteration-2/revision-response.md"));
    }

    #[test]
    fn test_read_missing_response_is_missing_file() {
        let (_dir, gateway) = gateway();
        assert!(matches!(
            gateway.read_response(1, WorkflowPhase::Review),
            Err(EngineError::MissingFile(_))
        ));
    }

    #[test]
    fn test_sentinel_phase_has_no_files() {
        let (_dir, gateway) = gateway();
        assert!(gateway.prompt_path(1, WorkflowPhase::Complete).is_err());
    }

    #[test]
    fn test_write_code_file_nested() {
        let (_dir, gateway) = gateway();
        let (normalized, path) = gateway
            .write_code_file(1, "domain/Tier.java", "class Tier {}")
            .unwrap();
        assert_eq!(normalized, "domain/Tier.java");
        assert!(path.ends_with("iteration-1/code/domain/Tier.java"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "class Tier {}");
    }

    #[test]
    fn test_write_code_file_rejects_escape() {
        let (_dir, gateway) = gateway();
        assert!(gateway.write_code_file(1, "../evil.java", "x").is_err());
        assert!(gateway.write_code_file(1, "/abs.java", "x").is_err());
    }

    #[test]
    fn test_read_code_files_recursive() {
        let (_dir, gateway) = gateway();
        gateway.write_code_file(1, "A.java", "a").unwrap();
        gateway.write_code_file(1, "sub/B.java", "b").unwrap();

        let files = gateway.read_code_files(1).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files["A.java"], "a");
        assert_eq!(files["sub/B.java"], "b");
    }

    #[test]
    fn test_read_code_files_missing_dir_is_empty() {
        let (_dir, gateway) = gateway();
        assert!(gateway.read_code_files(3).unwrap().is_empty());
    }
}
