//! Model export through an external exporter command.
//!
//! The exporter receives the request as `--key=value` arguments after its own
//! arguments. A zero exit is not trusted on its own: the artifact must exist
//! afterwards and is fingerprinted with blake3 (directories are walked in
//! file-name order, hashing each relative path and its contents).

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{
    ExternalTool, Format, JitType, NavResult, NavigatorError, ProcessOptions, run_checked,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub exported_model_path: PathBuf,
    pub target_format: Format,
    #[serde(default)]
    pub target_jit_type: Option<JitType>,
    #[serde(default)]
    pub batch_dim: Option<usize>,
    #[serde(default)]
    pub target_device: Option<String>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

impl ExportRequest {
    pub fn new(exported_model_path: impl Into<PathBuf>, target_format: Format) -> Self {
        Self {
            exported_model_path: exported_model_path.into(),
            target_format,
            target_jit_type: None,
            batch_dim: None,
            target_device: None,
            workdir: None,
        }
    }

    /// Output path; a relative path is taken from the workdir (current
    /// directory when unset).
    pub fn resolved_path(&self) -> PathBuf {
        if self.exported_model_path.is_absolute() {
            return self.exported_model_path.clone();
        }
        self.workdir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(&self.exported_model_path)
    }

    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--exported-model-path={}", self.resolved_path().display()),
            format!("--target-format={}", self.target_format),
        ];
        if let Some(jit) = self.target_jit_type {
            args.push(format!("--target-jit-type={}", jit.as_str()));
        }
        if let Some(dim) = self.batch_dim {
            args.push(format!("--batch-dim={dim}"));
        }
        if let Some(device) = &self.target_device {
            args.push(format!("--target-device={device}"));
        }
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStatus {
    pub path: PathBuf,
    pub format: Format,
    pub size_bytes: u64,
    pub blake3: String,
}

pub struct ExternalExporter {
    tool: ExternalTool,
    options: ProcessOptions,
}

impl ExternalExporter {
    pub fn new(tool: ExternalTool, options: ProcessOptions) -> Self {
        Self { tool, options }
    }

    /// Builds an exporter from a command line (`program arg...`).
    pub fn from_command(command: &[String], options: ProcessOptions) -> NavResult<Self> {
        let (program, rest) = command.split_first().ok_or_else(|| {
            NavigatorError::InvalidArgument("exporter command must not be empty".to_string())
        })?;
        let tool = ExternalTool::new(program.as_str()).with_prefix_args(rest.iter().cloned());
        Ok(Self::new(tool, options))
    }

    pub fn export(&self, request: &ExportRequest) -> NavResult<ExportStatus> {
        // The exporter runs from the workdir, so it is handed absolute paths.
        let path = std::path::absolute(request.resolved_path())?;
        let workdir = request
            .workdir
            .as_deref()
            .map(std::path::absolute)
            .transpose()?;
        let request = ExportRequest {
            exported_model_path: path.clone(),
            workdir: workdir.clone(),
            ..request.clone()
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = ProcessOptions {
            cwd: self.options.cwd.clone().or(workdir),
            ..self.options.clone()
        };
        let output = run_checked(&self.tool, &request.to_cli_args(), &options)?;
        tracing::debug!(command = %output.command_line(), elapsed_ms = output.elapsed_ms, "exporter finished");

        if !path.exists() {
            return Err(NavigatorError::Export(format!(
                "`{}` exited successfully but produced no artifact at {}",
                output.command_line(),
                path.display()
            )));
        }
        let (size_bytes, blake3) = fingerprint(&path)?;
        tracing::info!(path = %path.display(), format = %request.target_format, size_bytes, "model exported");
        Ok(ExportStatus {
            path,
            format: request.target_format,
            size_bytes,
            blake3,
        })
    }
}

/// Total size and blake3 digest of a file or directory tree.
pub fn fingerprint(path: &Path) -> NavResult<(u64, String)> {
    if path.is_file() {
        let bytes = std::fs::read(path)?;
        return Ok((bytes.len() as u64, blake3::hash(&bytes).to_hex().to_string()));
    }

    let mut hasher = blake3::Hasher::new();
    let mut size = 0u64;
    for entry in WalkDir::new(path).sort_by_file_name().follow_links(false) {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            NavigatorError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(msg)),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(path).unwrap_or(entry.path());
        let bytes = std::fs::read(entry.path())?;
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(&bytes);
        size += bytes.len() as u64;
    }
    Ok((size, hasher.finalize().to_hex().to_string()))
}
