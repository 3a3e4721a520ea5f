use std::env;
use rs_trac_ik::{ChainDescriptor, KinematicsSession, SolveType, SolverConfig};
use rs_trac_ik::utils::{dump_joints, dump_pose, dump_solution, joints_from_degrees};

/// Usage example. Optional arguments: URDF file, base link, tip link.
fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let file = args.get(1).map_or("src/tests/data/dual_arm.urdf", String::as_str);
    let base = args.get(2).map_or("body", String::as_str);
    let tip = args.get(3).map_or("right_tool0", String::as_str);

    let chain = ChainDescriptor::from_urdf_file(file, base, tip)?;
    let config = SolverConfig::new(0.05, 1e-5, SolveType::Speed)?;
    let mut session = KinematicsSession::new(chain, config)?;
    let dof = session.dof()?;
    println!("Chain '{}' -> '{}' has {} joints", base, tip, dof);

    let (lower, upper) = session.joint_limits()?;
    println!("Joint limits, degrees (--- is unbounded):");
    dump_joints(&lower);
    dump_joints(&upper);

    let joints = joints_from_degrees(&vec![20.0; dof]);
    println!("Joints:");
    dump_joints(&joints);
    let (position, rotation) = session.compute_fk(&joints)?;
    println!("Pose:");
    dump_pose(&position, &rotation);

    println!("Solution seeded at zero:");
    let solution = session.solve_ik(&position, &rotation, &vec![0.0; dof])?;
    dump_solution(solution.as_ref());

    for strategy in [SolveType::Distance, SolveType::Manip1, SolveType::Manip2] {
        let config = SolverConfig::new(0.05, 1e-5, strategy)?;
        let mut session = KinematicsSession::new(session.descriptor().clone(), config)?;
        println!("{} strategy:", strategy);
        let solution = session.solve_ik(&position, &rotation, &vec![0.0; dof])?;
        dump_solution(solution.as_ref());
    }

    session.release()?;
    Ok(())
}
