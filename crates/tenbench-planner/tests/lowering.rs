//! Lowering against packed fixtures

use anyhow::Result;
use tenbench_planner::{
    lower, Assignment, OutputRaceStrategy, ParallelUnit, PlanError, Schedule, TensorInfo,
};
use tenbench_sparse::{FixtureBuilder, Format, ModeFormat, SparseTensor};

fn fixtures() -> Result<Vec<SparseTensor<i64>>> {
    let a = FixtureBuilder::new("A", vec![40, 30]).entries(50).seed(1).build()?;
    let b = FixtureBuilder::new("B", vec![40, 30])
        .modes(vec![ModeFormat::Dense, ModeFormat::Sparse])
        .entries(50)
        .seed(2)
        .build()?;
    let c = FixtureBuilder::new("C", vec![30]).at(vec![0]).build()?;
    Ok(vec![a, b, c])
}

#[test]
fn test_lower_from_fixtures() -> Result<()> {
    let tensors = fixtures()?;
    let infos: Vec<TensorInfo> = tensors.iter().map(TensorInfo::from).collect();
    let stmt = Assignment::parse("D(i) = A(i,j) * B(i,j) * C(j)")?;

    let plan = lower(&stmt, &infos, &Schedule::new())?;
    assert_eq!(plan.output(), "D");
    assert_eq!(plan.output_shape(), vec![40]);
    assert_eq!(plan.loop_names(), vec!["i", "j"]);
    Ok(())
}

#[test]
fn test_commuted_factors_lower_to_same_loops() -> Result<()> {
    let tensors = fixtures()?;
    let infos: Vec<TensorInfo> = tensors.iter().map(TensorInfo::from).collect();

    let abc = lower(&Assignment::parse("D(i) = A(i,j) * B(i,j) * C(j)")?, &infos, &Schedule::new())?;
    let cab = lower(&Assignment::parse("E(i) = C(j) * A(i,j) * B(i,j)")?, &infos, &Schedule::new())?;
    assert_eq!(abc.loop_names(), cab.loop_names());
    assert_eq!(abc.extents(), cab.extents());
    Ok(())
}

#[test]
fn test_column_major_operand_is_discordant() -> Result<()> {
    let mut a = SparseTensor::<i64>::new(
        "A",
        vec![4, 3],
        Format::sparse(2).with_mode_order(vec![1, 0])?,
    )?;
    a.insert(vec![1, 2], 3)?;
    a.pack()?;
    let x = FixtureBuilder::<i64>::new("x", vec![3]).at(vec![2]).build()?;

    let stmt = Assignment::parse("y(i) = A(i,j) * x(j)")?;
    let infos = [TensorInfo::from(&a), TensorInfo::from(&x)];

    assert!(lower(&stmt, &infos, &Schedule::new())?.operands()[0].needs_repack());
    assert!(!lower(&stmt, &infos, &Schedule::new().reorder(["j", "i"]))?.operands()[0].needs_repack());
    Ok(())
}

#[test]
fn test_parallel_reduction_needs_race_strategy() -> Result<()> {
    let tensors = fixtures()?;
    let infos: Vec<TensorInfo> = tensors.iter().map(TensorInfo::from).collect();
    let stmt = Assignment::parse("S() = A(i,j) * B(i,j)")?;

    let racy = Schedule::new().parallelize("i", ParallelUnit::CpuThread, OutputRaceStrategy::NoRaces);
    assert!(matches!(
        lower(&stmt, &infos, &racy),
        Err(PlanError::InvalidSchedule(_))
    ));

    for strategy in [OutputRaceStrategy::Atomics, OutputRaceStrategy::Temporary] {
        let schedule = Schedule::new().parallelize("i", ParallelUnit::CpuThread, strategy);
        let plan = lower(&stmt, &infos, &schedule)?;
        assert_eq!(plan.parallel().map(|p| p.strategy), Some(strategy));
        assert!(plan.output_shape().is_empty());
    }
    Ok(())
}

#[cfg(feature = "serde")]
#[test]
fn test_schedule_serde() -> Result<()> {
    let schedule = Schedule::new()
        .split("i", "i0", "i1", 16)
        .reorder(["i0", "j", "i1"])
        .parallelize("i0", ParallelUnit::CpuThread, OutputRaceStrategy::Temporary);

    let json = serde_json::to_string(&schedule)?;
    let back: Schedule = serde_json::from_str(&json)?;
    assert_eq!(back, schedule);
    Ok(())
}
