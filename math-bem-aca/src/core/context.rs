//! Assembly context shared by all operators of one problem

use crate::core::config::AssemblyOptions;
use crate::core::error::Result;

/// Validated assembly options
///
/// Weak forms are always assembled through a context so invalid option
/// combinations are reported once, before any quadrature runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    options: AssemblyOptions,
}

impl Context {
    /// Create a context; fails when the options do not validate
    pub fn new(options: AssemblyOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// The assembly options
    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AcaOptions, ThreadCount};

    #[test]
    fn test_context_validates() {
        assert!(Context::new(AssemblyOptions::default()).is_ok());
        let bad = AssemblyOptions::default().with_max_thread_count(ThreadCount::Fixed(0));
        assert!(Context::new(bad).is_err());
        let bad = AssemblyOptions::aca(AcaOptions::default().with_eps(-1.0));
        assert!(Context::new(bad).is_err());
        assert_eq!(Context::default().options(), &AssemblyOptions::default());
    }
}
