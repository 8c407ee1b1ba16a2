use std::fmt;

/// A single field-level problem found while checking a device, panel, link or
/// an imported document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `userLinks[2].url`
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {} - {}", self.field_path, self.message)
    }
}

/// Outcome of a validation pass.
///
/// Validation never fails early: every problem is collected so the caller can
/// report all of them at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, field_path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::new(field_path, message));
    }

    /// Append every error of `other`, prefixing its field paths with `prefix`.
    pub fn extend_nested(&mut self, prefix: &str, other: ValidationReport) {
        self.errors.extend(other.errors.into_iter().map(|e| ValidationError {
            field_path: format!("{}.{}", prefix, e.field_path),
            message: e.message,
        }));
    }

    /// Convert into a `Result`, keeping the report as the error value.
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.errors.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Helper for the common "must be a non-empty string" check.
pub(crate) fn require_non_empty(
    report: &mut ValidationReport,
    field_path: &str,
    value: &str,
) {
    if value.trim().is_empty() {
        report.push(field_path, "expected non-empty string");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_paths() {
        let mut inner = ValidationReport::new();
        inner.push("name", "expected non-empty string");

        let mut outer = ValidationReport::new();
        outer.extend_nested("userDevices.climate[0]", inner);

        assert_eq!(outer.errors.len(), 1);
        assert_eq!(outer.errors[0].field_path, "userDevices.climate[0].name");
        assert!(!outer.is_valid());
    }

    #[test]
    fn test_display_joins_lines() {
        let mut report = ValidationReport::new();
        report.push("userLinks", "expected array");
        report.push("userPanelOrder", "expected object");

        insta::assert_snapshot!(report.to_string(), @r"
        Invalid userLinks - expected array
        Invalid userPanelOrder - expected object
        ");
    }

    #[test]
    fn test_blank_string_rejected() {
        let mut report = ValidationReport::new();
        require_non_empty(&mut report, "id", "   ");
        require_non_empty(&mut report, "name", "Lamp");
        assert_eq!(report.errors, vec![ValidationError::new("id", "expected non-empty string")]);
    }
}
