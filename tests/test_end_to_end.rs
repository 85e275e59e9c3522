use corticore::column_pooler::{ColumnPooler, CpConfig};
use corticore::cortical_column::{CorticalColumn, CorticalColumnConfig, SensoryInput};
use corticore::grid::GridConfig;
use corticore::region::{CorticalRegion, RegionConfig};
use corticore::spatial_pooler::{SpConfig, SpatialPooler};
use corticore::temporal_memory::{TemporalMemory, TmConfig};
use corticore::Sdr;
use rand::rngs::StdRng;
use rand::SeedableRng;
use corticore::utils;

fn random_sdr(size: usize, active: usize, seed: u64) -> Sdr {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut idx: Vec<u32> = (0..size as u32).collect();
    let n = idx.len();
    utils::shuffle(&mut idx, n, &mut rng);
    idx.truncate(active);
    Sdr::new(size, &idx)
}

/// Scenario 1: SP warm-up. Every column eventually fires at least once;
/// the per-step active-column count stays near the target sparsity.
#[test]
fn sp_warmup_eliminates_dead_columns() {
    let cfg = SpConfig {
        input_size: 400,
        column_count: 2048,
        target_sparsity: 0.02,
        boost_strength: 3.0,
        ..Default::default()
    };
    let mut sp = SpatialPooler::new(cfg).unwrap();

    let mut total_active = 0usize;
    for step in 0..2000u64 {
        let input = random_sdr(400, 40, step);
        let out = sp.compute(&input, true).unwrap();
        total_active += out.num_active();
    }
    assert!(sp.active_duty_cycle().iter().all(|&d| d > 0.0));
    let mean_active = total_active as f64 / 2000.0;
    assert!(mean_active >= 20.0 && mean_active <= 80.0);
}

/// Scenario 2: TM sequence learning. A repeating ABCD cycle drives
/// anomaly toward zero on every learned transition; an unseen
/// substitution spikes anomaly back up.
#[test]
fn tm_learns_repeating_sequence_and_flags_novel_substitution() {
    let cfg = TmConfig {
        column_count: 2048,
        ..Default::default()
    };
    let mut tm = TemporalMemory::new(cfg).unwrap();

    let a = random_sdr(2048, 40, 100);
    let b = random_sdr(2048, 40, 200);
    let c = random_sdr(2048, 40, 300);
    let d = random_sdr(2048, 40, 400);
    let x = random_sdr(2048, 40, 999);
    let sequence = [&a, &b, &c, &d];

    for _ in 0..15 {
        for cols in sequence.iter() {
            tm.compute(cols, None, None, true).unwrap();
        }
    }

    let anomaly_b_given_a = tm.compute(&a, None, None, true).unwrap();
    let _ = anomaly_b_given_a;
    let out_b = tm.compute(&b, None, None, true).unwrap();
    assert!(out_b.anomaly < 0.3);

    // Inject an unseen column substitution in place of C.
    tm.compute(&b, None, None, false).unwrap();
    let out_x = tm.compute(&x, None, None, false).unwrap();
    assert!(out_x.anomaly >= 0.5);
}

/// Scenario 3: CP stability across repeated feedforward presentations.
#[test]
fn cp_stabilizes_representation_across_repeats() {
    let cfg = CpConfig {
        cell_count: 4096,
        sdr_size: 40,
        ..Default::default()
    };
    let mut cp = ColumnPooler::new(cfg).unwrap();
    let input = random_sdr(1024, 40, 55);

    cp.compute(&input, &input, None, None, true).unwrap();
    for _ in 0..4 {
        let out = cp.compute(&input, &input, None, None, true).unwrap();
        assert_eq!(out.representation.num_active(), 40);
        assert!(out.overlap_prev >= 36);
    }
}

/// Scenario 4: lateral narrowing pulls two partially-overlapping
/// representations closer together without growing either.
#[test]
fn lateral_narrowing_increases_agreement_between_peers() {
    let cfg = CpConfig {
        cell_count: 2048,
        sdr_size: 40,
        min_narrowed_size: 10,
        ..Default::default()
    };
    let mut cp_a = ColumnPooler::new(cfg.clone()).unwrap();
    let mut cp_b = ColumnPooler::new(cfg).unwrap();

    let shared_growth = random_sdr(512, 40, 7);
    cp_a.compute(&shared_growth, &shared_growth, None, None, true).unwrap();
    cp_b.compute(&shared_growth, &shared_growth, None, None, true).unwrap();

    let before = Sdr::match_score(cp_a.representation(), cp_b.representation()).unwrap();

    let peers_for_a = vec![(1usize, cp_b.representation().clone())];
    let peers_for_b = vec![(0usize, cp_a.representation().clone())];
    let narrowed_a = cp_a.apply_lateral_narrowing(&peers_for_a).unwrap();
    let narrowed_b = cp_b.apply_lateral_narrowing(&peers_for_b).unwrap();

    assert!(narrowed_a.num_active() <= 40);
    assert!(narrowed_b.num_active() <= 40);
    let after = Sdr::match_score(&narrowed_a, &narrowed_b).unwrap();
    assert!(after >= before - 1e-9);
}

/// Scenario 5: grid path-integration round trip returns within a
/// fraction of active bits of the starting location.
#[test]
fn grid_round_trip_returns_near_origin() {
    use corticore::{GridCellModule, GridConfig as GridCfg};
    let cfg = GridCfg {
        module_size: 40,
        scale: 1.0,
        orientation: 0.0,
        sigma_noise: 0.0,
        active_count: 10,
        ..Default::default()
    };
    let mut g = GridCellModule::new(cfg).unwrap();
    let initial = g.current_location();
    g.move_by(3.0, 4.0);
    g.move_by(-3.0, -4.0);
    let current = g.current_location();
    let ov = Sdr::overlap(&current, &initial).unwrap();
    assert!(ov as f64 >= 0.7 * 10.0);
}

fn small_column(seed: u64) -> CorticalColumn {
    let config = CorticalColumnConfig {
        sp: SpConfig {
            input_size: 80,
            column_count: 128,
            potential_radius: 60,
            seed,
            ..Default::default()
        },
        tm: TmConfig {
            column_count: 128,
            cells_per_column: 4,
            activation_threshold: 2,
            min_threshold: 1,
            ..Default::default()
        },
        cp: CpConfig {
            cell_count: 512,
            sdr_size: 32,
            seed,
            ..Default::default()
        },
        grid_modules: vec![GridConfig {
            module_size: 12,
            seed,
            ..Default::default()
        }],
    };
    CorticalColumn::new(config).unwrap()
}

/// Scenario 6: a multi-column region learns an object over several
/// (feature, location) samples, then recognizes the same object from
/// the learned representation after a reset, converging via voting.
#[test]
fn region_converges_on_a_previously_learned_object() {
    let columns: Vec<CorticalColumn> = (0..4).map(small_column).collect();
    let mut region = CorticalRegion::new(RegionConfig::default(), columns, 512);

    let samples: Vec<Vec<SensoryInput>> = (0..5)
        .map(|i| {
            (0..4)
                .map(|_| SensoryInput {
                    feature: random_sdr(80, 10, 1000 + i as u64),
                    dx: i as f64,
                    dy: 0.0,
                })
                .collect()
        })
        .collect();

    let mut last_out = None;
    for sample in &samples {
        last_out = Some(region.process(sample, true).unwrap());
    }
    let learned_consensus = last_out.unwrap().consensus;

    region.reset();

    let mut recognized = None;
    for sample in &samples {
        recognized = Some(region.process(sample, false).unwrap());
    }
    let out = recognized.unwrap();

    assert!(out.iterations <= RegionConfig::default().max_voting_iterations);
    assert_eq!(out.column_outputs.len(), 4);
    assert_eq!(out.consensus.size(), 512);
    assert_eq!(learned_consensus.size(), 512);
}
