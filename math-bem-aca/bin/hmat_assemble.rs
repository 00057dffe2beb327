//! Assemble a boundary integral operator as an H-matrix and report compression
//!
//! Usage:
//!   cargo run --release --bin hmat-assemble -- --subdivisions 4 --kernel helmholtz -k 2.0
//!   cargo run --release --bin hmat-assemble -- --config options.json --compare-dense
//!   cargo run --release --bin hmat-assemble -- --help

use anyhow::{Context as _, Result, bail};
use clap::{Parser, ValueEnum};
use math_audio_bem_aca::core::assembly::{
    DofIndexing, EntryEvaluator, assemble_hmatrix, prepare_local_assembler,
};
use math_audio_bem_aca::core::*;
use math_audio_bem_aca::linalg::{ComplexField, relative_frobenius_error};
use num_complex::Complex64;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "hmat-assemble")]
#[command(about = "Assemble a BEM operator on an icosphere with adaptive cross approximation", long_about = None)]
struct Args {
    /// Icosphere refinement level (20 · 4^n elements)
    #[arg(short, long, default_value_t = 3)]
    subdivisions: usize,

    /// Sphere radius
    #[arg(long, default_value_t = 1.0)]
    radius: f64,

    /// Green's function
    #[arg(long, value_enum, default_value_t = KernelChoice::Laplace)]
    kernel: KernelChoice,

    /// Layer potential
    #[arg(long, value_enum, default_value_t = LayerChoice::Single)]
    layer: LayerChoice,

    /// Wave number (Helmholtz) or decay constant (modified Helmholtz)
    #[arg(short = 'k', long, default_value_t = 1.0)]
    wavenumber: f64,

    /// Discrete space used as domain and test space
    #[arg(long, value_enum, default_value_t = SpaceChoice::P0)]
    space: SpaceChoice,

    /// JSON file with assembly options (overrides the ACA flags below)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// ACA target accuracy
    #[arg(long, default_value_t = 1e-4)]
    eps: f64,

    /// Admissibility parameter
    #[arg(long, default_value_t = 1.2)]
    eta: f64,

    /// Minimum block size
    #[arg(long, default_value_t = 16)]
    min_block: usize,

    /// Rank cap for low-rank blocks
    #[arg(long)]
    max_rank: Option<usize>,

    /// Cluster flat-local DOFs instead of global DOFs
    #[arg(long)]
    local: bool,

    /// Merge sibling low-rank blocks after assembly
    #[arg(long)]
    recompress: bool,

    /// Write the block structure to this PostScript file
    #[arg(long)]
    postscript: Option<PathBuf>,

    /// Write compression statistics as JSON
    #[arg(long)]
    stats_json: Option<PathBuf>,

    /// Also assemble densely and report the relative error
    #[arg(long)]
    compare_dense: bool,

    /// Number of worker threads (default: all cores)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KernelChoice {
    /// 1 / (4π r)
    Laplace,
    /// exp(ikr) / (4π r)
    Helmholtz,
    /// exp(-κr) / (4π r)
    ModifiedHelmholtz,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayerChoice {
    /// Single layer
    Single,
    /// Double layer
    Double,
    /// Adjoint double layer
    AdjointDouble,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SpaceChoice {
    /// Piecewise constants
    P0,
    /// Continuous piecewise linears
    P1,
}

fn options_from_args(args: &Args) -> Result<AssemblyOptions> {
    let mut options = match &args.config {
        Some(path) => AssemblyOptions::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let mut aca = AcaOptions::default()
                .with_eps(args.eps)
                .with_eta(args.eta)
                .with_minimum_block_size(args.min_block)
                .with_global_assembly_before_compression(!args.local)
                .with_recompression(args.recompress);
            if let Some(rank) = args.max_rank {
                aca = aca.with_maximum_rank(rank);
            }
            if let Some(path) = &args.postscript {
                aca = aca.with_postscript(path.to_string_lossy());
            }
            AssemblyOptions::aca(aca)
        }
    };
    if let Some(threads) = args.threads {
        options.set_max_thread_count(ThreadCount::Fixed(threads));
    }
    if args.verbose {
        options.set_verbosity_level(VerbosityLevel::High);
    }
    options.validate()?;
    Ok(options)
}

fn run<T: ComplexField>(
    args: &Args,
    options: &AssemblyOptions,
    space: Arc<dyn Space>,
    kernel: Arc<dyn KernelEvaluator>,
) -> Result<()> {
    let Some(aca) = options.aca_options() else {
        bail!("the configuration selects dense mode; nothing to compress");
    };

    let start = Instant::now();
    let assembler = prepare_local_assembler::<T>(space.clone(), space, kernel, options)?;
    let hmatrix = assemble_hmatrix(&assembler, options, aca)?;
    let elapsed = start.elapsed();
    let stats = hmatrix.stats();

    println!("Assembly time: {:.2?}", elapsed);
    println!("{stats}");
    println!("  Leaf blocks:       {}", stats.leaf_count);
    println!("  Low-rank leaves:   {}", stats.low_rank_leaves);
    println!("  Dense leaves:      {}", stats.dense_leaves);
    println!("  Max / mean rank:   {} / {:.2}", stats.max_rank, stats.mean_rank);
    println!("  Compression ratio: {:.4}", stats.compression_ratio);

    if let Some(path) = &args.stats_json {
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Statistics written to {}", path.display());
    }

    if args.compare_dense {
        let indexing = if aca.global_assembly_before_compression {
            DofIndexing::Global
        } else {
            DofIndexing::FlatLocal
        };
        let entries = EntryEvaluator::new(&assembler, indexing);
        let rows: Vec<usize> = (0..indexing.dof_count(assembler.test_space().as_ref())).collect();
        let cols: Vec<usize> = (0..indexing.dof_count(assembler.trial_space().as_ref())).collect();
        let start = Instant::now();
        let dense = entries.evaluate(&rows, &cols)?;
        println!("Dense assembly time: {:.2?}", start.elapsed());
        println!(
            "Relative Frobenius error: {:.3e}",
            relative_frobenius_error(&hmatrix.to_dense(), &dense)
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if args.verbose {
        "debug"
    } else {
        "info"
    }))
    .init();

    log::info!(
        "hmat-assemble {} ({})",
        math_audio_bem_aca::VERSION,
        math_audio_bem_aca::GIT_HASH
    );
    let options = options_from_args(&args)?;
    let grid: Arc<dyn Grid> = Arc::new(icosphere_grid(args.radius, args.subdivisions)?);
    let space: Arc<dyn Space> = match args.space {
        SpaceChoice::P0 => Arc::new(PiecewiseConstantScalarSpace::new(grid)?),
        SpaceChoice::P1 => Arc::new(PiecewiseLinearContinuousScalarSpace::new(grid)?),
    };
    println!(
        "Icosphere: {} elements, {} DOFs ({})",
        space.grid().element_count(),
        space.global_dof_count(),
        space.name()
    );

    let green = match args.kernel {
        KernelChoice::Laplace => GreenFunction::Laplace,
        KernelChoice::Helmholtz => GreenFunction::Helmholtz(args.wavenumber),
        KernelChoice::ModifiedHelmholtz => GreenFunction::ModifiedHelmholtz(args.wavenumber),
    };
    let layer = match args.layer {
        LayerChoice::Single => LayerKind::SingleLayer,
        LayerChoice::Double => LayerKind::DoubleLayer,
        LayerChoice::AdjointDouble => LayerKind::AdjointDoubleLayer,
    };
    let kernel: Arc<dyn KernelEvaluator> = Arc::new(GreenKernel::new(green, layer)?);
    println!("Kernel: {}", kernel.name());

    if kernel.is_real_valued() {
        run::<f64>(&args, &options, space, kernel)
    } else {
        run::<Complex64>(&args, &options, space, kernel)
    }
}
