//! Assembly configuration
//!
//! [`AssemblyOptions`] selects dense or ACA assembly and carries the
//! parallelization, verbosity, quadrature accuracy and storage flags.
//! Every field has a default so partial JSON files are accepted.

use crate::core::error::{AssemblyError, Result};
use crate::core::quadrature::MAX_QUADRATURE_ORDER;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Options of the adaptive cross approximation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcaOptions {
    /// Target relative accuracy of each low-rank block
    pub eps: f64,
    /// Admissibility parameter: blocks with `min(diam) <= eta * dist` are compressed
    pub eta: f64,
    /// Clusters with fewer DOFs than this are leaves; smaller admissible blocks stay dense
    pub minimum_block_size: usize,
    /// Admissible blocks larger than this along either side are subdivided further
    pub maximum_block_size: usize,
    /// Blocks needing a higher rank are stored dense
    pub maximum_rank: usize,
    /// Cluster global DOFs (true) or flat-local DOFs (false)
    pub global_assembly_before_compression: bool,
    /// Merge sibling low-rank blocks after assembly
    pub recompress: bool,
    /// Write the block structure as PostScript
    pub output_postscript: bool,
    /// Target file of the PostScript dump
    pub output_fname: String,
    /// Multiplier on the vanishing-pivot threshold, which is relative to the
    /// largest entry ACA has sampled from the block
    pub scaling: f64,
}

impl Default for AcaOptions {
    fn default() -> Self {
        Self {
            eps: 1e-4,
            eta: 1.2,
            minimum_block_size: 16,
            maximum_block_size: usize::MAX,
            maximum_rank: usize::MAX,
            global_assembly_before_compression: true,
            recompress: false,
            output_postscript: false,
            output_fname: "aca.ps".to_string(),
            scaling: 1.0,
        }
    }
}

impl AcaOptions {
    /// Set the target accuracy
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Set the admissibility parameter
    pub fn with_eta(mut self, eta: f64) -> Self {
        self.eta = eta;
        self
    }

    /// Set the minimum block size
    pub fn with_minimum_block_size(mut self, size: usize) -> Self {
        self.minimum_block_size = size;
        self
    }

    /// Set the maximum block size
    pub fn with_maximum_block_size(mut self, size: usize) -> Self {
        self.maximum_block_size = size;
        self
    }

    /// Set the rank cap
    pub fn with_maximum_rank(mut self, rank: usize) -> Self {
        self.maximum_rank = rank;
        self
    }

    /// Choose global or flat-local clustering
    pub fn with_global_assembly_before_compression(mut self, global: bool) -> Self {
        self.global_assembly_before_compression = global;
        self
    }

    /// Enable or disable recompression
    pub fn with_recompression(mut self, recompress: bool) -> Self {
        self.recompress = recompress;
        self
    }

    /// Request a PostScript dump of the block structure
    pub fn with_postscript<S: Into<String>>(mut self, fname: S) -> Self {
        self.output_postscript = true;
        self.output_fname = fname.into();
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(AssemblyError::InvalidConfiguration(format!(
                "ACA eps must be positive and finite, got {}",
                self.eps
            )));
        }
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return Err(AssemblyError::InvalidConfiguration(format!(
                "ACA eta must be positive and finite, got {}",
                self.eta
            )));
        }
        if self.minimum_block_size == 0 {
            return Err(AssemblyError::InvalidConfiguration(
                "minimum block size must be at least 1".to_string(),
            ));
        }
        if self.maximum_block_size < self.minimum_block_size {
            return Err(AssemblyError::InvalidConfiguration(format!(
                "maximum block size {} is below the minimum block size {}",
                self.maximum_block_size, self.minimum_block_size
            )));
        }
        if self.maximum_rank == 0 {
            return Err(AssemblyError::InvalidConfiguration(
                "maximum rank must be at least 1".to_string(),
            ));
        }
        if !(self.scaling.is_finite() && self.scaling > 0.0) {
            return Err(AssemblyError::InvalidConfiguration(format!(
                "ACA scaling must be positive and finite, got {}",
                self.scaling
            )));
        }
        if self.output_postscript && self.output_fname.is_empty() {
            return Err(AssemblyError::InvalidConfiguration(
                "PostScript output requested without a file name".to_string(),
            ));
        }
        Ok(())
    }
}

/// Dense or hierarchical assembly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyMode {
    /// Assemble every entry
    #[default]
    Dense,
    /// Compress admissible blocks with ACA
    Aca(AcaOptions),
}

/// Upper bound on the number of worker threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadCount {
    /// Let rayon decide
    Auto,
    /// Fixed number of workers, must be positive
    Fixed(usize),
}

/// Parallelization settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelizationOptions {
    /// Size of the worker pool
    pub max_thread_count: ThreadCount,
}

impl Default for ParallelizationOptions {
    fn default() -> Self {
        Self {
            max_thread_count: ThreadCount::Auto,
        }
    }
}

/// How much the assembler reports through `log`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerbosityLevel {
    /// Warnings only
    Low,
    /// Phase summaries at info level
    Default,
    /// Phase summaries plus per-phase details at debug level
    High,
}

impl VerbosityLevel {
    /// Whether phase summaries are logged
    pub fn reports_progress(self) -> bool {
        self >= Self::Default
    }

    /// Whether detailed diagnostics are logged
    pub fn reports_details(self) -> bool {
        self >= Self::High
    }
}

/// Quadrature orders used for element-pair integrals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyOptions {
    /// Gauss points per direction for well-separated pairs
    pub regular_order: usize,
    /// Gauss points per direction in the Sauter-Schwab rules
    pub singular_order: usize,
    /// Extra points for nearly touching pairs
    pub near_field_order_increase: usize,
    /// Fewer points for far pairs
    pub far_field_order_reduction: usize,
}

impl Default for AccuracyOptions {
    fn default() -> Self {
        Self {
            regular_order: 4,
            singular_order: 6,
            near_field_order_increase: 2,
            far_field_order_reduction: 1,
        }
    }
}

impl AccuracyOptions {
    /// Largest regular order that may be requested
    pub fn max_regular_order(&self) -> usize {
        self.regular_order + self.near_field_order_increase
    }

    /// Check that all orders are supported
    pub fn validate(&self) -> Result<()> {
        for order in [self.max_regular_order(), self.singular_order] {
            if order > MAX_QUADRATURE_ORDER {
                return Err(AssemblyError::QuadratureOrderOutOfRange {
                    requested: order,
                    maximum: MAX_QUADRATURE_ORDER,
                });
            }
        }
        if self.regular_order == 0 || self.singular_order == 0 {
            return Err(AssemblyError::QuadratureOrderOutOfRange {
                requested: 0,
                maximum: MAX_QUADRATURE_ORDER,
            });
        }
        Ok(())
    }
}

/// Complete assembly configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    /// Dense or ACA mode
    pub mode: AssemblyMode,
    /// Worker pool settings
    pub parallelization: ParallelizationOptions,
    /// Logging level
    pub verbosity: VerbosityLevel,
    /// Quadrature orders
    pub accuracy: AccuracyOptions,
    /// Precompute and reuse singular element-pair integrals
    pub singular_integral_caching: bool,
    /// Store identity operators as CSR matrices
    pub sparse_storage_of_mass_matrices: bool,
    /// Assemble sums of integral operators on the same spaces as one matrix
    pub joint_assembly: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            mode: AssemblyMode::Dense,
            parallelization: ParallelizationOptions::default(),
            verbosity: VerbosityLevel::Default,
            accuracy: AccuracyOptions::default(),
            singular_integral_caching: true,
            sparse_storage_of_mass_matrices: true,
            joint_assembly: false,
        }
    }
}

impl AssemblyOptions {
    /// Default options in ACA mode
    pub fn aca(aca: AcaOptions) -> Self {
        Self {
            mode: AssemblyMode::Aca(aca),
            ..Self::default()
        }
    }

    /// Assemble every entry
    pub fn switch_to_dense_mode(&mut self) {
        self.mode = AssemblyMode::Dense;
    }

    /// Compress with ACA using the given options
    pub fn switch_to_aca_mode(&mut self, aca: AcaOptions) {
        self.mode = AssemblyMode::Aca(aca);
    }

    /// ACA options when in ACA mode
    pub fn aca_options(&self) -> Option<&AcaOptions> {
        match &self.mode {
            AssemblyMode::Aca(aca) => Some(aca),
            AssemblyMode::Dense => None,
        }
    }

    /// Limit the worker pool
    pub fn set_max_thread_count(&mut self, count: ThreadCount) {
        self.parallelization.max_thread_count = count;
    }

    /// Set the logging level
    pub fn set_verbosity_level(&mut self, level: VerbosityLevel) {
        self.verbosity = level;
    }

    /// Toggle singular-integral caching
    pub fn enable_singular_integral_caching(&mut self, enable: bool) {
        self.singular_integral_caching = enable;
    }

    /// Toggle sparse storage of mass matrices
    pub fn enable_sparse_storage_of_mass_matrices(&mut self, enable: bool) {
        self.sparse_storage_of_mass_matrices = enable;
    }

    /// Toggle joint assembly of operator sums
    pub fn enable_joint_assembly(&mut self, enable: bool) {
        self.joint_assembly = enable;
    }

    /// Builder form of [`Self::set_max_thread_count`]
    pub fn with_max_thread_count(mut self, count: ThreadCount) -> Self {
        self.set_max_thread_count(count);
        self
    }

    /// Builder form of [`Self::set_verbosity_level`]
    pub fn with_verbosity(mut self, level: VerbosityLevel) -> Self {
        self.set_verbosity_level(level);
        self
    }

    /// Builder setter for the quadrature orders
    pub fn with_accuracy(mut self, accuracy: AccuracyOptions) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Reject invalid option values before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.parallelization.max_thread_count == ThreadCount::Fixed(0) {
            return Err(AssemblyError::InvalidConfiguration(
                "thread count must be positive or auto".to_string(),
            ));
        }
        self.accuracy.validate()?;
        if let Some(aca) = self.aca_options() {
            aca.validate()?;
        }
        Ok(())
    }

    /// Load options from a JSON file and validate them
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&contents)?;
        options.validate()?;
        Ok(options)
    }

    /// Write options as pretty-printed JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let aca = AcaOptions::default();
        assert_eq!(aca.eps, 1e-4);
        assert_eq!(aca.eta, 1.2);
        assert_eq!(aca.minimum_block_size, 16);
        assert_eq!(aca.maximum_block_size, usize::MAX);
        assert_eq!(aca.maximum_rank, usize::MAX);
        assert!(aca.global_assembly_before_compression);
        assert!(!aca.recompress);
        assert!(!aca.output_postscript);
        assert_eq!(aca.output_fname, "aca.ps");
        assert_eq!(aca.scaling, 1.0);

        let opts = AssemblyOptions::default();
        assert_eq!(opts.mode, AssemblyMode::Dense);
        assert!(opts.singular_integral_caching);
        assert!(opts.sparse_storage_of_mass_matrices);
        assert!(!opts.joint_assembly);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let opts = AssemblyOptions::default().with_max_thread_count(ThreadCount::Fixed(0));
        assert!(matches!(
            opts.validate(),
            Err(AssemblyError::InvalidConfiguration(_))
        ));
        let opts = AssemblyOptions::default().with_max_thread_count(ThreadCount::Fixed(2));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_invalid_aca_values() {
        for aca in [
            AcaOptions::default().with_eps(0.0),
            AcaOptions::default().with_eta(f64::NAN),
            AcaOptions::default().with_minimum_block_size(0),
            AcaOptions::default().with_maximum_block_size(4),
            AcaOptions::default().with_maximum_rank(0),
        ] {
            assert!(AssemblyOptions::aca(aca).validate().is_err());
        }
    }

    #[test]
    fn test_order_above_maximum() {
        let opts = AssemblyOptions::default().with_accuracy(AccuracyOptions {
            singular_order: MAX_QUADRATURE_ORDER + 1,
            ..AccuracyOptions::default()
        });
        assert!(matches!(
            opts.validate(),
            Err(AssemblyError::QuadratureOrderOutOfRange { .. })
        ));
    }

    #[test]
    fn test_mode_switches() {
        let mut opts = AssemblyOptions::default();
        assert!(opts.aca_options().is_none());
        opts.switch_to_aca_mode(AcaOptions::default().with_eta(2.0));
        assert_eq!(opts.aca_options().map(|aca| aca.eta), Some(2.0));
        opts.switch_to_dense_mode();
        assert_eq!(opts.mode, AssemblyMode::Dense);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{ "mode": { "aca": { "eps": 1e-6 } }, "verbosity": "high" }"#;
        let opts: AssemblyOptions = serde_json::from_str(json).unwrap();
        let aca = opts.aca_options().unwrap();
        assert_eq!(aca.eps, 1e-6);
        assert_eq!(aca.eta, 1.2);
        assert_eq!(opts.verbosity, VerbosityLevel::High);
        assert!(opts.singular_integral_caching);
    }

    #[test]
    fn test_json_file_round_trip() {
        let mut opts = AssemblyOptions::aca(AcaOptions::default().with_maximum_rank(30));
        opts.enable_joint_assembly(true);
        opts.set_max_thread_count(ThreadCount::Fixed(3));
        let path = std::env::temp_dir().join(format!(
            "bem_aca_options_{}.json",
            std::process::id()
        ));
        opts.to_json_file(&path).unwrap();
        let loaded = AssemblyOptions::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, opts);
    }
}
