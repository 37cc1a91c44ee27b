use crate::cases;
use crate::error::GridError;
use crate::lu::linear_solver;
use crate::network::{Branch, Bus, BusType, Network};
use crate::options::{Alg, LinSolver, PFOpt, PFOptBuilder};
use crate::pf::runpf;
use crate::standards::Standards;
use rstest::rstest;

fn solve(network: &mut Network, opt: &PFOpt) -> crate::pf::ConvergenceResult {
    let solver = linear_solver(opt.lin_solver);
    runpf(network, opt, solver.as_ref()).unwrap()
}

#[test]
fn newton_converges_on_radial_two_bus() {
    let mut net = cases::radial_two_bus().unwrap();
    let result = solve(&mut net, &PFOpt::default());

    assert!(result.converged);
    assert!(result.iterations <= 20);
    assert!(result.max_mismatch < 1e-6);
    assert_eq!(result.vm[0], 1.0);
    assert!(result.vm[1] < 1.0 && result.vm[1] > 0.9);
    assert!(result.va[1] < 0.0);
}

#[test]
fn solution_is_written_back() {
    let mut net = cases::radial_two_bus().unwrap();
    let result = solve(&mut net, &PFOpt::default());

    let load = net.bus("2").unwrap();
    assert_eq!(load.vm, result.vm[1]);
    assert_eq!(load.va, result.va[1]);
    assert!((load.p_inj + 100.0).abs() < 1e-3);

    let br = net.branch("1-2").unwrap();
    assert!((br.p_from + br.p_to - br.losses).abs() < 1e-9);
    assert!(br.losses > 0.0);
    // unrated branches take the 110 kV default of 300 MVA
    assert_eq!(br.rating, 300.0);
    assert!((br.loading - f64::hypot(br.p_from, br.q_from) / 3.0).abs() < 1e-9);
}

#[rstest]
#[case::gauss_seidel(Alg::GS)]
#[case::fast_decoupled(Alg::FD)]
fn alternative_methods_agree_with_newton(#[case] alg: Alg) {
    let builders: [fn() -> crate::error::Result<Network>; 2] = [cases::radial_two_bus, cases::ring];
    for case in builders {
        let mut reference = case().unwrap();
        let nr = solve(&mut reference, &PFOpt::default());
        assert!(nr.converged);

        let mut net = case().unwrap();
        let opt = PFOptBuilder::default().algorithm(alg).build().unwrap();
        let result = solve(&mut net, &opt);
        assert!(result.converged, "{} did not converge", alg);
        assert_eq!(result.algorithm, alg);

        for i in 0..net.n_buses() {
            assert!((result.vm[i] - nr.vm[i]).abs() < 1e-4);
            assert!((result.va[i] - nr.va[i]).abs() < 1e-4);
        }
    }
}

#[test]
fn gauss_elimination_matches_lu() {
    let mut a = cases::ring().unwrap();
    let mut b = cases::ring().unwrap();
    let lu = solve(&mut a, &PFOpt::default());
    let ge = solve(
        &mut b,
        &PFOptBuilder::default()
            .lin_solver(LinSolver::GE)
            .build()
            .unwrap(),
    );
    assert!(lu.converged && ge.converged);
    for (x, y) in lu.vm.iter().zip(&ge.vm) {
        assert!((x - y).abs() < 1e-9);
    }
}

#[test]
fn sparse_and_dense_solutions_agree() {
    let mut sparse = cases::large(120).unwrap();
    let mut dense = cases::large(120).unwrap().with_sparse_threshold(1000);

    let rs = solve(&mut sparse, &PFOpt::default());
    let rd = solve(&mut dense, &PFOpt::default());
    assert!(rs.converged && rd.converged);
    for (x, y) in rs.vm.iter().zip(&rd.vm) {
        assert!((x - y).abs() < 1e-9);
    }
}

fn with_isolated_load() -> Network {
    let mut net = cases::radial_two_bus().unwrap();
    net.add_bus(Bus::pq("island", 110.0, 20.0, 5.0)).unwrap();
    net
}

#[test]
fn isolated_load_makes_jacobian_singular() {
    let mut net = with_isolated_load();
    let solver = linear_solver(LinSolver::LU);
    let err = runpf(&mut net, &PFOpt::default(), solver.as_ref()).unwrap_err();
    assert_eq!(err, GridError::SingularJacobian { iteration: 1 });
    assert_eq!(net.bus("2").unwrap().vm, 1.0);
}

#[test]
fn gauss_seidel_reports_isolated_bus() {
    let mut net = with_isolated_load();
    let solver = linear_solver(LinSolver::LU);
    let opt = PFOptBuilder::default().algorithm(Alg::GS).build().unwrap();
    let err = runpf(&mut net, &opt, solver.as_ref()).unwrap_err();
    assert_eq!(err, GridError::IsolatedBus("island".to_string()));
}

#[test]
fn structural_errors() {
    let solver = linear_solver(LinSolver::LU);
    let opt = PFOpt::default();

    let mut empty = Network::new(100.0);
    assert_eq!(
        runpf(&mut empty, &opt, solver.as_ref()).unwrap_err(),
        GridError::EmptyNetwork
    );

    let mut no_slack = Network::new(100.0);
    no_slack.add_bus(Bus::pq("a", 110.0, 1.0, 0.0)).unwrap();
    assert_eq!(
        runpf(&mut no_slack, &opt, solver.as_ref()).unwrap_err(),
        GridError::NoSlack
    );

    let mut net = cases::radial_two_bus().unwrap();
    assert_eq!(
        net.add_bus(Bus::pq("2", 110.0, 0.0, 0.0)).unwrap_err(),
        GridError::DuplicateBus("2".to_string())
    );
    assert_eq!(
        net.add_branch(Branch::new("x", "1", "nowhere", 0.0, 0.1, 0.0))
            .unwrap_err(),
        GridError::UnknownBus("nowhere".to_string())
    );
}

#[test]
fn two_slack_islands_cannot_be_joined() {
    let mut net = Network::new(100.0);
    net.add_bus(Bus::slack("a", 110.0, 1.0)).unwrap();
    net.add_bus(Bus::slack("b", 110.0, 1.0)).unwrap();
    let err = net
        .add_branch(Branch::new("ab", "a", "b", 0.01, 0.1, 0.0))
        .unwrap_err();
    assert_eq!(
        err,
        GridError::MultipleSlack {
            element: "ab".to_string()
        }
    );
}

#[test]
fn second_slack_in_an_island_is_refused() {
    let mut net = cases::ring().unwrap();
    assert_eq!(
        net.set_bus_type("B", BusType::Slack),
        Err(GridError::MultipleSlack {
            element: "B".to_string()
        })
    );
    assert_eq!(net.bus("B").unwrap().bus_type, BusType::PV);
    net.set_bus_type("A", BusType::Slack).unwrap();

    // once the ring is cut into two islands, each may have its own slack
    net.set_branch_online("A-B", false).unwrap();
    net.set_branch_online("C-D", false).unwrap();
    net.set_bus_type("B", BusType::Slack).unwrap();
    assert_eq!(net.islands().len(), 2);
}

#[test]
fn bus_bands_follow_network_standards() {
    let mut standards = Standards::default();
    standards.voltage.band_110_300kv = (0.95, 1.05);
    let mut net = Network::new(100.0).with_standards(standards);
    net.add_bus(Bus::pq("a", 110.0, 0.0, 0.0)).unwrap();
    net.add_bus(Bus::pq("b", 110.0, 0.0, 0.0).limits(0.8, 1.2)).unwrap();

    let a = net.bus("a").unwrap();
    assert_eq!((a.vmin, a.vmax), (0.95, 1.05));
    let b = net.bus("b").unwrap();
    assert_eq!((b.vmin, b.vmax), (0.8, 1.2));

    let default = cases::radial_two_bus().unwrap();
    assert_eq!(default.bus("2").unwrap().vmax, 1.118);
}

#[test]
fn overload_beyond_nose_point_does_not_converge() {
    // 500 MW over 0.01+j0.10 p.u. on a 100 MVA base has no solution.
    let mut net = Network::new(100.0);
    net.add_bus(Bus::slack("s", 400.0, 1.05)).unwrap();
    net.add_bus(Bus::pq("l", 400.0, 500.0, 0.0)).unwrap();
    net.add_branch(Branch::new("sl", "s", "l", 0.01, 0.10, 0.0))
        .unwrap();

    let solver = linear_solver(LinSolver::LU);
    match runpf(&mut net, &PFOpt::default(), solver.as_ref()) {
        Ok(result) => assert!(!result.converged),
        Err(err) => assert!(matches!(err, GridError::SingularJacobian { .. })),
    }
    assert_eq!(net.bus("l").unwrap().vm, 1.0);
}
