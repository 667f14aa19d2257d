use crate::error::CompileError;
use crate::expr::Expr;
use crate::template::Template;
use rinc_common::types::Severity;
use serde::Deserialize;

/// A compiled alert: when `when` holds for a metrics document, `message` is
/// rendered against the same document and reported with `severity`.
///
/// Rules deserialize from their configuration form and compile on the way in,
/// so a configuration containing a bad rule fails to load.
///
/// # Examples
///
/// ```
/// use rinc_alert::rule::AlertRule;
///
/// #[derive(serde::Deserialize)]
/// struct Section {
///     alerts: Vec<AlertRule>,
/// }
///
/// let section: Section = toml::from_str(r#"
///     [[alerts]]
///     when = "len(jobs) > 0"
///     message = "{{len .Jobs}} stale jobs"
///     severity = "warning"
/// "#).unwrap();
/// assert_eq!(section.alerts[0].when.source(), "len(jobs) > 0");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "AlertRuleConfig")]
pub struct AlertRule {
    pub message: Template,
    pub severity: Severity,
    pub when: Expr,
}

impl AlertRule {
    pub fn new(when: &str, message: &str, severity: Severity) -> Result<Self, CompileError> {
        Ok(Self {
            message: Template::compile(message)?,
            severity,
            when: Expr::compile(when)?,
        })
    }
}

/// Uncompiled alert as written in configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertRuleConfig {
    #[serde(default)]
    pub message: String,
    pub severity: Severity,
    pub when: String,
}

impl TryFrom<AlertRuleConfig> for AlertRule {
    type Error = CompileError;

    fn try_from(cfg: AlertRuleConfig) -> Result<Self, Self::Error> {
        Self::new(&cfg.when, &cfg.message, cfg.severity)
    }
}
