#![forbid(unsafe_code)]

use crate::Config;
use std::fmt;
use std::time::Duration;

/// Outcome of checking a [`Config`] for operator mistakes.
///
/// Errors make the configuration unusable; warnings are suspicious but
/// runnable. The caller decides whether errors are fatal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "configuration validation report")?;
        writeln!(f, "===============================")?;
        if self.errors.is_empty() && self.warnings.is_empty() {
            return write!(f, "all checks passed");
        }
        if !self.errors.is_empty() {
            writeln!(f, "errors ({}):", self.errors.len())?;
            for error in &self.errors {
                writeln!(f, "  - {error}")?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "warnings ({}):", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "  - {warning}")?;
            }
        }
        Ok(())
    }
}

impl Config {
    /// Check thresholds and intervals for operator mistakes.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let power = &self.power;

        if power.idle_timeout.is_zero() {
            report.error("power.idle_timeout must be greater than zero");
        }
        if power.idle_timeout >= power.light_sleep_timeout {
            report.error(format!(
                "power.light_sleep_timeout ({:?}) must exceed power.idle_timeout ({:?})",
                power.light_sleep_timeout, power.idle_timeout
            ));
        }
        if power.light_sleep_timeout >= power.deep_sleep_timeout {
            report.error(format!(
                "power.deep_sleep_timeout ({:?}) must exceed power.light_sleep_timeout ({:?})",
                power.deep_sleep_timeout, power.light_sleep_timeout
            ));
        }
        if power.presence_poll_interval.is_zero() {
            report.error("power.presence_poll_interval must be greater than zero");
        }
        if power.evaluation_interval.is_zero() {
            report.error("power.evaluation_interval must be greater than zero");
        }

        if !power.presence_poll_interval.is_zero()
            && power.presence_poll_interval < Duration::from_millis(100)
        {
            report.warn(format!(
                "power.presence_poll_interval of {:?} polls the sensor aggressively",
                power.presence_poll_interval
            ));
        }
        if power.evaluation_interval > power.idle_timeout && !power.idle_timeout.is_zero() {
            report.warn(format!(
                "power.evaluation_interval ({:?}) exceeds power.idle_timeout ({:?}); \
                 sleep entry will lag",
                power.evaluation_interval, power.idle_timeout
            ));
        }
        if self.persistence.autosave_interval.is_zero() {
            report.warn(
                "persistence.autosave_interval is zero; state persists only at \
                 transitions and shutdown",
            );
        }
        if self.system.data_dir.is_relative() {
            report.warn(format!(
                "system.data_dir {:?} is relative and resolves against the working directory",
                self.system.data_dir
            ));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Power;

    #[test]
    fn default_config_has_no_errors() {
        let report = Config::default().validate();
        assert!(report.is_ok(), "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn non_increasing_timeouts_are_errors() {
        let mut config = Config::default();
        config.power.light_sleep_timeout = config.power.idle_timeout;
        let report = config.validate();
        assert!(!report.is_ok());
        assert!(report.errors[0].contains("light_sleep_timeout"));
    }

    #[test]
    fn slow_evaluation_is_a_warning_not_an_error() {
        let config = Config {
            power: Power {
                evaluation_interval: Duration::from_secs(10 * 60),
                ..Power::default()
            },
            ..Config::default()
        };
        let report = config.validate();
        assert!(report.is_ok());
        assert!(report.warnings.iter().any(|w| w.contains("sleep entry will lag")));
    }

    #[test]
    fn report_renders_both_sections() {
        let mut config = Config::default();
        config.power.idle_timeout = Duration::ZERO;
        config.persistence.autosave_interval = Duration::ZERO;
        let rendered = config.validate().to_string();
        assert!(rendered.contains("errors ("));
        assert!(rendered.contains("warnings ("));
    }
}
