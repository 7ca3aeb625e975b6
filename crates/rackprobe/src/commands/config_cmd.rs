//! Config subcommand handlers.

use rackprobe_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

/// The resolved config with secrets masked.
fn redacted(mut cfg: Config) -> Config {
    if cfg.ssh.password.is_some() {
        cfg.ssh.password = Some(REDACTED.into());
    }
    cfg
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(config::load(global)?);
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(&cfg).map_err(rackprobe_config::ConfigError::from)?
                }
                OutputFormat::Json => output::render_json(&cfg, false)?,
                OutputFormat::JsonCompact => output::render_json(&cfg, true)?,
                OutputFormat::Yaml => output::render_yaml(&cfg)?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::config_file(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            config::save_config_to(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("Wrote default configuration to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(
                &config::config_file(global).display().to_string(),
                global.quiet,
            );
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn password_is_masked() {
        let mut cfg = Config::default();
        cfg.ssh.password = Some("hunter2".into());
        assert_eq!(redacted(cfg).ssh.password.as_deref(), Some(REDACTED));
        assert_eq!(redacted(Config::default()).ssh.password, None);
    }
}
