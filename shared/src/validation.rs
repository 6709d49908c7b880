//! # Validation Helpers
//!
//! Small, composable validators shared across the core's domain types, built
//! on the [`validator`](https://docs.rs/validator/) crate's custom-function
//! convention (`fn(&T) -> Result<(), ValidationError>`) so they plug directly
//! into `#[validate(custom(function = "..."))]` on domain structs.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use validator::Validate;
//! use shared::validation::validators;
//!
//! #[derive(Validate)]
//! struct NewAgent {
//!     #[validate(custom(function = "validators::not_blank"))]
//!     id: String,
//! }
//! ```

pub mod validators {
    use validator::ValidationError;

    /// Validates that a string is not blank (empty or whitespace-only).
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("blank"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::validators::*;

    #[test]
    fn test_not_blank_valid() {
        assert!(not_blank("hello").is_ok());
        assert!(not_blank("  hello  ").is_ok());
    }

    #[test]
    fn test_not_blank_invalid() {
        assert!(not_blank("").is_err());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("\t\n").is_err());
    }
}
