use std::path::PathBuf;
use std::process::{Command, Stdio};

use coreup_core::{CoreError, CoreResult};
use coreup_lifecycle::EngineControl;
use tracing::debug;

use crate::config::EngineCommands;

/// Engine control driven by the `[engine]` commands from the config file.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    commands: EngineCommands,
}

impl CommandEngine {
    pub fn new(commands: EngineCommands) -> Self {
        Self { commands }
    }

    fn run(&self, step: &str, argv: &[String]) -> CoreResult<()> {
        let Some((program, args)) = argv.split_first() else {
            return Err(CoreError::Execution {
                path: PathBuf::from(step),
                message: format!("no engine {step} command configured"),
            });
        };

        debug!(step, program = %program, "running engine command");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| CoreError::Execution {
                path: PathBuf::from(program),
                message: err.to_string(),
            })?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(CoreError::Execution {
            path: PathBuf::from(program),
            message: format!(
                "engine {step} failed: status={} stderr='{}'",
                output.status,
                stderr.trim()
            ),
        })
    }
}

impl EngineControl for CommandEngine {
    fn is_running(&self) -> bool {
        if self.commands.status.is_empty() {
            return false;
        }
        match self.run("status", &self.commands.status) {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "engine reported not running");
                false
            }
        }
    }

    fn restart(&self, pre_swap: Option<&mut dyn FnMut() -> CoreResult<()>>) -> CoreResult<()> {
        self.run("stop", &self.commands.stop)?;
        let swapped = match pre_swap {
            Some(step) => step(),
            None => Ok(()),
        };
        // The engine comes back up even when the swap failed.
        let started = self.run("start", &self.commands.start);
        swapped.and(started)
    }
}
