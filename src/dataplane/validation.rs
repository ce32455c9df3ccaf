//! Data-address validation rules used by adapter factories.

use crate::domain::DataAddress;

/// A single check against a data address. Rules return the failure detail
/// as a plain string; factories wrap it into a pipeline error.
pub trait ValidationRule: Send + Sync {
    fn apply(&self, address: &DataAddress) -> Result<(), String>;
}

/// Requires a property to be present and non-empty.
pub struct EmptyValueValidationRule {
    key: &'static str,
}

impl EmptyValueValidationRule {
    pub fn new(key: &'static str) -> Self {
        Self { key }
    }
}

impl ValidationRule for EmptyValueValidationRule {
    fn apply(&self, address: &DataAddress) -> Result<(), String> {
        match address.property(self.key) {
            Some(_) => Ok(()),
            None => Err(format!("Missing or empty `{}` property", self.key)),
        }
    }
}

/// Applies a list of rules in order, failing on the first violation.
pub struct CompositeValidationRule {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl CompositeValidationRule {
    pub fn new(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }
}

impl ValidationRule for CompositeValidationRule {
    fn apply(&self, address: &DataAddress) -> Result<(), String> {
        for rule in &self.rules {
            rule.apply(address)?;
        }
        Ok(())
    }
}

/// Wraps a closure as a rule, for adapter-specific checks.
pub struct FnValidationRule<F>(pub F);

impl<F> ValidationRule for FnValidationRule<F>
where
    F: Fn(&DataAddress) -> Result<(), String> + Send + Sync,
{
    fn apply(&self, address: &DataAddress) -> Result<(), String> {
        (self.0)(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_rule_rejects_missing_and_empty() {
        let rule = EmptyValueValidationRule::new("nodeId");
        let missing = DataAddress::new("OpcUa");
        let empty = DataAddress::new("OpcUa").with_property("nodeId", "");
        let present = DataAddress::new("OpcUa").with_property("nodeId", "ns=2;s=x");

        assert!(rule.apply(&missing).unwrap_err().contains("nodeId"));
        assert!(rule.apply(&empty).is_err());
        assert!(rule.apply(&present).is_ok());
    }

    #[test]
    fn composite_fails_on_first_violation() {
        let composite = CompositeValidationRule::new(vec![
            Box::new(EmptyValueValidationRule::new("a")),
            Box::new(EmptyValueValidationRule::new("b")),
        ]);
        let address = DataAddress::new("X").with_property("a", "1");
        assert!(composite.apply(&address).unwrap_err().contains("`b`"));

        let full = address.with_property("b", "2");
        assert!(composite.apply(&full).is_ok());
    }
}
