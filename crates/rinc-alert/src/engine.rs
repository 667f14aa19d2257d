use crate::rule::AlertRule;
use rinc_common::types::FiredAlert;
use serde_json::Value;

/// Evaluates every rule against `context`, in order.
///
/// A rule whose condition fails to evaluate, or whose message fails to
/// render, is logged and skipped; the remaining rules still run. The result
/// keeps the order of `rules` and holds at most one alert per rule.
pub fn evaluate_all(rules: &[AlertRule], context: &Value) -> Vec<FiredAlert> {
    let mut fired = Vec::new();

    for rule in rules {
        match rule.when.evaluate_bool(context) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::error!(expr = %rule.when, error = %e, "evaluating boolean expression");
                continue;
            }
        }

        match rule.message.render(context) {
            Ok(message) => fired.push(FiredAlert {
                message,
                severity: rule.severity,
            }),
            Err(e) => {
                tracing::error!(template = %rule.message, error = %e, "rendering alert message");
            }
        }
    }

    fired
}
