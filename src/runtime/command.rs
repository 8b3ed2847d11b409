//! Runner that spawns an external command per inference.

use crate::{ExternalTool, NavResult, ProcessOptions, Runner, run_checked};

const BATCH_SIZE_PLACEHOLDER: &str = "{batch_size}";

pub struct CommandRunner {
    name: String,
    tool: ExternalTool,
    args: Vec<String>,
    options: ProcessOptions,
}

impl CommandRunner {
    pub fn new(tool: ExternalTool, args: Vec<String>, options: ProcessOptions) -> Self {
        let name = tool
            .program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "command".to_string());
        Self {
            name,
            tool,
            args,
            options,
        }
    }

    pub fn render_args(&self, batch_size: usize) -> Vec<String> {
        let batch = batch_size.to_string();
        self.args
            .iter()
            .map(|a| a.replace(BATCH_SIZE_PLACEHOLDER, &batch))
            .collect()
    }
}

impl Runner for CommandRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&mut self, batch_size: usize) -> NavResult<()> {
        run_checked(&self.tool, &self.render_args(batch_size), &self.options)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_placeholder_is_substituted() {
        let runner = CommandRunner::new(
            ExternalTool::new("/usr/bin/python3"),
            vec!["infer.py".to_string(), "--batch-size={batch_size}".to_string()],
            ProcessOptions::default(),
        );
        assert_eq!(runner.name(), "python3");
        assert_eq!(runner.render_args(8), vec!["infer.py", "--batch-size=8"]);
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_fails_the_inference() {
        let mut runner = CommandRunner::new(
            ExternalTool::new("sh"),
            vec!["-c".to_string(), "exit {batch_size}".to_string()],
            ProcessOptions::default(),
        );
        runner.infer(0).expect("exit 0");
        let err = runner.infer(4).expect_err("exit 4");
        assert!(matches!(
            err,
            crate::NavigatorError::Process {
                exit_code: Some(4),
                ..
            }
        ));
    }
}
