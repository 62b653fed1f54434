//! `logloom config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logloom_core::config::LogloomConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer),
        ConfigAction::Show { section } => execute_show(config_path, section, writer),
    }
}

fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match LogloomConfig::load(config_path) {
        Ok(_) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config =
        LogloomConfig::load_or_default(config_path).map_err(|e| CliError::Config(e.to_string()))?;

    let config_toml = match section.as_deref() {
        None => toml::to_string_pretty(&config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("drain") => toml::to_string_pretty(&config.drain),
        Some("pool") => toml::to_string_pretty(&config.pool),
        Some("detector") => toml::to_string_pretty(&config.detector),
        Some("redactor") => toml::to_string_pretty(&config.redactor),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown config section '{other}' (expected general, drain, pool, detector, redactor)"
            )));
        }
    }
    .map_err(|e| CliError::Command(format!("config serialization failed: {e}")))?;

    let report = ConfigReport {
        source: config_path.display().to_string(),
        section,
        config_toml,
    };
    writer.render(&report)?;

    Ok(())
}

/// Validation result payload.
#[derive(Debug, Serialize)]
struct ConfigValidationReport {
    source: String,
    valid: bool,
    errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.valid {
            writeln!(w, "{}: OK", self.source)?;
        } else {
            writeln!(w, "{}: INVALID", self.source)?;
            for error in &self.errors {
                writeln!(w, "  - {error}")?;
            }
        }
        Ok(())
    }
}

/// Effective configuration payload.
#[derive(Debug, Serialize)]
struct ConfigReport {
    source: String,
    section: Option<String>,
    config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if let Some(section) = &self.section {
            writeln!(w, "# {} [{}]", self.source, section)?;
        } else {
            writeln!(w, "# {}", self.source)?;
        }
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_report_renders_ok() {
        let report = ConfigValidationReport {
            source: "logloom.toml".to_owned(),
            valid: true,
            errors: Vec::new(),
        };
        let mut buf = Vec::new();
        report.render_text(&mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("OK"));
    }

    #[test]
    fn validation_report_lists_errors() {
        let report = ConfigValidationReport {
            source: "logloom.toml".to_owned(),
            valid: false,
            errors: vec!["pool.workers: must be 1-10000".to_owned()],
        };
        let mut buf = Vec::new();
        report.render_text(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("INVALID"));
        assert!(out.contains("pool.workers"));
    }

    #[tokio::test]
    async fn validate_accepts_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[pool]\nworkers = 4\n").unwrap();

        let args = ConfigArgs {
            action: ConfigAction::Validate,
        };
        let writer = OutputWriter::new(crate::cli::OutputFormat::Text);
        execute(args, file.path(), &writer).await.unwrap();
    }

    #[tokio::test]
    async fn validate_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[pool]\nworkers = 0\n").unwrap();

        let args = ConfigArgs {
            action: ConfigAction::Validate,
        };
        let writer = OutputWriter::new(crate::cli::OutputFormat::Text);
        let result = execute(args, file.path(), &writer).await;
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[tokio::test]
    async fn show_rejects_unknown_section() {
        let args = ConfigArgs {
            action: ConfigAction::Show {
                section: Some("bogus".to_owned()),
            },
        };
        let writer = OutputWriter::new(crate::cli::OutputFormat::Text);
        let result = execute(args, Path::new("/nonexistent/logloom.toml"), &writer).await;
        assert!(matches!(result, Err(CliError::Command(_))));
    }
}
