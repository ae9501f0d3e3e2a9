//! Operator capability configuration loaded from environment variables.
//!
//! Authorization itself happens upstream; this module only turns the configured
//! list of operators allowed to cancel cheques into an explicit [`OperatorContext`]
//! that the cancellation workflow receives.

use std::collections::HashSet;

/// Environment variable holding a comma-separated list of operator ids that may cancel cheques
pub const CANCEL_OPERATORS_VAR: &str = "CHEQUE_CANCEL_OPERATORS";

/// Capabilities of the operator performing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorContext {
    /// Operator identifier, recorded on audit fields
    pub operator_id: String,
    /// Whether the operator may cancel cheques
    pub can_cancel: bool,
}

impl OperatorContext {
    /// Operator holding the cancel capability
    #[must_use]
    pub fn with_cancel(operator_id: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
            can_cancel: true,
        }
    }

    /// Operator without any special capability
    #[must_use]
    pub fn restricted(operator_id: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
            can_cancel: false,
        }
    }
}

/// Parses a comma-separated operator list, ignoring blanks and surrounding whitespace.
#[must_use]
pub fn parse_operator_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Gets the operators allowed to cancel cheques from [`CANCEL_OPERATORS_VAR`].
#[must_use]
pub fn get_cancel_operators() -> HashSet<String> {
    std::env::var(CANCEL_OPERATORS_VAR)
        .map(|raw| parse_operator_list(&raw))
        .unwrap_or_default()
}

/// Builds the context for an operator from the configured cancel list.
#[must_use]
pub fn operator_context(operator_id: &str) -> OperatorContext {
    context_for(operator_id, &get_cancel_operators())
}

/// Builds the context for an operator against an explicit cancel list.
#[must_use]
pub fn context_for(operator_id: &str, cancel_operators: &HashSet<String>) -> OperatorContext {
    let operator_id = operator_id.trim();
    OperatorContext {
        operator_id: operator_id.to_string(),
        can_cancel: cancel_operators.contains(operator_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operator_list() {
        let operators = parse_operator_list(" alice, bob ,,carol ");
        assert_eq!(operators.len(), 3);
        assert!(operators.contains("alice"));
        assert!(operators.contains("bob"));
        assert!(operators.contains("carol"));
    }

    #[test]
    fn test_parse_empty_operator_list() {
        assert!(parse_operator_list("").is_empty());
        assert!(parse_operator_list(" , ").is_empty());
    }

    #[test]
    fn test_context_for_grants_cancel_to_listed_operators() {
        let cancel_operators = parse_operator_list("alice,bob");

        let alice = context_for(" alice ", &cancel_operators);
        assert_eq!(alice, OperatorContext::with_cancel("alice"));

        let carol = context_for("carol", &cancel_operators);
        assert_eq!(carol, OperatorContext::restricted("carol"));
    }

    #[test]
    fn test_operator_context_reads_configured_list() {
        let configured = get_cancel_operators();
        let unknown = "operator-not-in-any-list";

        let context = operator_context(unknown);
        assert_eq!(context.operator_id, unknown);
        assert_eq!(context.can_cancel, configured.contains(unknown));
        assert!(!context.can_cancel);
    }

    #[test]
    fn test_constructors_set_capability() {
        assert!(OperatorContext::with_cancel("alice").can_cancel);
        assert!(!OperatorContext::restricted("bob").can_cancel);
    }
}
