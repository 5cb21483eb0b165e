// ============================
// crates/panel-lib/src/service.rs
// ============================
//! Proxy service control: config validation and restart.
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

use crate::config::ServiceSettings;
use crate::error::AppError;

/// Runs the configured proxy control commands
#[derive(Debug, Clone)]
pub struct ProxyService {
    validate_command: Vec<String>,
    restart_command: Vec<String>,
}

impl ProxyService {
    pub fn new(settings: &ServiceSettings) -> Self {
        Self {
            validate_command: settings.validate_command.clone(),
            restart_command: settings.restart_command.clone(),
        }
    }

    /// Check the proxy configuration without applying it
    pub async fn validate_config(&self) -> Result<(), AppError> {
        run(&self.validate_command).await
    }

    /// Restart the proxy service
    pub async fn restart(&self) -> Result<(), AppError> {
        run(&self.restart_command).await
    }

    /// Validate, then restart only if validation passed
    pub async fn validate_and_restart(&self) -> Result<(), AppError> {
        self.validate_config().await?;
        self.restart().await?;
        info!("proxy service restarted");
        Ok(())
    }
}

async fn run(command: &[String]) -> Result<(), AppError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| AppError::Command("empty command".to_string()))?;

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| AppError::Command(format!("unable to run `{program}`: {e}")))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    warn!(program = %program, status = %output.status, stderr = %stderr.trim(), "command failed");
    Err(AppError::Command(format!("`{program}` exited with {}", output.status)))
}
