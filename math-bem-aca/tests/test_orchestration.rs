//! End-to-end behavior of the assembly entry points: configuration errors,
//! degenerate inputs, JSON options, thread pools and diagnostics output.

use approx::assert_relative_eq;
use math_audio_bem_aca::core::assembly::assemble_weak_form;
use math_audio_bem_aca::core::*;
use math_audio_bem_aca::linalg::{LinearOperator, to_dense};
use num_complex::Complex64;
use std::path::PathBuf;
use std::sync::Arc;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("bem_aca_{}_{name}", std::process::id()))
}

fn single_layer() -> Arc<dyn KernelEvaluator> {
    Arc::new(GreenKernel::new(GreenFunction::Laplace, LayerKind::SingleLayer).unwrap())
}

fn cube_p0() -> Arc<dyn Space> {
    let grid: Arc<dyn Grid> = Arc::new(cube_grid(2).unwrap());
    Arc::new(PiecewiseConstantScalarSpace::new(grid).unwrap())
}

fn quiet(options: AssemblyOptions) -> AssemblyOptions {
    options.with_verbosity(VerbosityLevel::Low)
}

#[test]
fn test_single_dof_space() {
    let grid: Arc<dyn Grid> = Arc::new(
        TriangleGrid::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1, 2]],
        )
        .unwrap(),
    );
    let space: Arc<dyn Space> = Arc::new(PiecewiseConstantScalarSpace::new(grid).unwrap());
    assert_eq!(space.global_dof_count(), 1);

    let dense = assemble_weak_form::<f64>(
        space.clone(),
        space.clone(),
        single_layer(),
        &quiet(AssemblyOptions::default()),
    )
    .unwrap();
    let aca = assemble_weak_form::<f64>(
        space.clone(),
        space,
        single_layer(),
        &quiet(AssemblyOptions::aca(AcaOptions::default())),
    )
    .unwrap();

    let (d, a) = (to_dense(dense.as_ref()), to_dense(aca.as_ref()));
    assert_eq!(d.dim(), (1, 1));
    assert!(d[[0, 0]] > 0.0);
    assert_relative_eq!(d[[0, 0]], a[[0, 0]], max_relative = 1e-12);
}

#[test]
fn test_invalid_grids() {
    assert!(matches!(
        TriangleGrid::new(Vec::new(), Vec::new()),
        Err(AssemblyError::EmptyInput(_))
    ));
    assert!(matches!(
        TriangleGrid::new(
            vec![[0.0, 0.0, 0.0], [f64::NAN, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1, 2]],
        ),
        Err(AssemblyError::NonFiniteCoordinate { index: 1 })
    ));
    assert!(matches!(
        TriangleGrid::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            vec![[0, 1, 2]],
        ),
        Err(AssemblyError::InvalidMesh(_))
    ));
}

#[test]
fn test_configuration_errors_surface_before_assembly() {
    let space = cube_p0();

    let zero_threads = AssemblyOptions::default().with_max_thread_count(ThreadCount::Fixed(0));
    let err = assemble_weak_form::<f64>(space.clone(), space.clone(), single_layer(), &zero_threads)
        .err()
        .unwrap();
    assert!(err.is_configuration_error());

    let bad_eps = AssemblyOptions::aca(AcaOptions::default().with_eps(-1.0));
    assert!(Context::new(bad_eps).is_err());

    let too_fine = AssemblyOptions::default().with_accuracy(AccuracyOptions {
        regular_order: 31,
        ..AccuracyOptions::default()
    });
    assert!(matches!(
        assemble_weak_form::<f64>(space.clone(), space.clone(), single_layer(), &too_fine),
        Err(AssemblyError::QuadratureOrderOutOfRange { .. })
    ));

    assert!(matches!(
        helmholtz_3d_single_layer::<f64>(space.clone(), space.clone(), space.clone(), 1.0),
        Err(AssemblyError::UnsupportedConfiguration(_))
    ));
    assert!(helmholtz_3d_single_layer::<Complex64>(space.clone(), space.clone(), space, f64::NAN)
        .is_err());
}

#[test]
fn test_options_from_json() {
    let path = temp_path("options.json");
    std::fs::write(
        &path,
        r#"{
            "mode": { "aca": { "eps": 1e-6, "minimum_block_size": 8 } },
            "verbosity": "low",
            "parallelization": { "max_thread_count": { "fixed": 2 } }
        }"#,
    )
    .unwrap();
    let options = AssemblyOptions::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let aca = options.aca_options().unwrap();
    assert_eq!(aca.eps, 1e-6);
    assert_eq!(aca.minimum_block_size, 8);
    assert_eq!(aca.eta, 1.2);
    assert_eq!(options.parallelization.max_thread_count, ThreadCount::Fixed(2));

    let space = cube_p0();
    let op = laplace_3d_single_layer::<f64>(space.clone(), space.clone(), space).unwrap();
    let weak = op.weak_form(&Context::new(options).unwrap()).unwrap();
    assert_eq!((weak.num_rows(), weak.num_cols()), (48, 48));

    let broken = temp_path("broken.json");
    std::fs::write(&broken, r#"{ "mode": { "aca": { "eps": "small" } } }"#).unwrap();
    let err = AssemblyOptions::from_json_file(&broken).unwrap_err();
    std::fs::remove_file(&broken).ok();
    assert!(matches!(err, AssemblyError::Json(_)));

    assert!(matches!(
        AssemblyOptions::from_json_file(temp_path("missing.json")),
        Err(AssemblyError::Io(_))
    ));
}

#[test]
fn test_fixed_thread_count_gives_identical_matrix() {
    let space = cube_p0();
    let aca = AcaOptions::default().with_minimum_block_size(4).with_eps(1e-8);
    let assemble = |threads| {
        let options = quiet(AssemblyOptions::aca(aca.clone())).with_max_thread_count(threads);
        to_dense(
            assemble_weak_form::<f64>(space.clone(), space.clone(), single_layer(), &options)
                .unwrap()
                .as_ref(),
        )
    };
    let single = assemble(ThreadCount::Fixed(1));
    assert_eq!(single, assemble(ThreadCount::Fixed(3)));
    assert_eq!(single, assemble(ThreadCount::Auto));
}

#[test]
fn test_postscript_output() {
    let path = temp_path("blocks.ps");
    let space = cube_p0();
    let aca = AcaOptions::default()
        .with_minimum_block_size(4)
        .with_postscript(path.to_string_lossy());
    assemble_weak_form::<f64>(space.clone(), space, single_layer(), &quiet(AssemblyOptions::aca(aca)))
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert!(contents.starts_with("%!PS"));
    assert!(contents.contains("showpage"));
}
