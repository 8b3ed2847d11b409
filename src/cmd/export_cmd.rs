//! `navigator export ... -- <exporter command>`.

use clap::Args;

use std::path::PathBuf;

use crate::{
    Config, ExportRequest, ExternalExporter, Format, JitType, NavResult, ProcessOptions,
};

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    #[arg(long)]
    pub exported_model_path: PathBuf,
    #[arg(long, value_enum)]
    pub target_format: Format,
    #[arg(long, value_enum)]
    pub target_jit_type: Option<JitType>,
    #[arg(long)]
    pub batch_dim: Option<usize>,
    #[arg(long)]
    pub target_device: Option<String>,
    #[arg(long)]
    pub workdir: Option<PathBuf>,
    /// Exporter program and its own arguments.
    #[arg(last = true, required = true, value_name = "EXPORTER")]
    pub command: Vec<String>,
}

impl ExportArgs {
    /// The request with an absolute workdir (`--workdir`, else the config's).
    pub fn request(&self, config: &Config) -> NavResult<ExportRequest> {
        let workdir = self.workdir.as_ref().unwrap_or(&config.workdir);
        Ok(ExportRequest {
            exported_model_path: self.exported_model_path.clone(),
            target_format: self.target_format,
            target_jit_type: self.target_jit_type,
            batch_dim: self.batch_dim,
            target_device: self.target_device.clone(),
            workdir: Some(std::path::absolute(workdir)?),
        })
    }
}

pub fn export_command(config: &Config, args: &ExportArgs) -> NavResult<serde_json::Value> {
    let request = args.request(config)?;
    let exporter = ExternalExporter::from_command(
        &args.command,
        ProcessOptions::new(None, config.process_timeout()),
    )?;
    let status = exporter.export(&request)?;
    Ok(serde_json::to_value(status)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_workdir_from_config() {
        let args = ExportArgs {
            exported_model_path: PathBuf::from("model.onnx"),
            target_format: Format::Onnx,
            target_jit_type: None,
            batch_dim: Some(0),
            target_device: None,
            workdir: None,
            command: vec!["exporter".to_string()],
        };
        let config = Config {
            workdir: PathBuf::from("/srv/navigator"),
            ..Config::default()
        };
        let request = args.request(&config).expect("request");
        assert_eq!(request.resolved_path(), PathBuf::from("/srv/navigator/model.onnx"));

        let config = Config {
            workdir: PathBuf::from("models"),
            ..Config::default()
        };
        let request = args.request(&config).expect("request");
        let cwd = std::env::current_dir().expect("cwd");
        assert_eq!(request.workdir, Some(cwd.join("models")));
    }

    #[cfg(unix)]
    #[test]
    fn export_command_reports_artifact() {
        let workdir = std::env::temp_dir().join(format!("navigator-export-cmd-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&workdir).expect("mkdir");
        let args = ExportArgs {
            exported_model_path: PathBuf::from("model.pt"),
            target_format: Format::Torchscript,
            target_jit_type: Some(JitType::Script),
            batch_dim: None,
            target_device: None,
            workdir: Some(workdir.clone()),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "printf pt > \"${1#--exported-model-path=}\"".to_string(),
                "exporter".to_string(),
            ],
        };
        let out = export_command(&Config::default(), &args).expect("export");
        assert_eq!(out["format"], serde_json::json!("torchscript"));
        assert_eq!(out["size_bytes"], serde_json::json!(2));
    }
}
