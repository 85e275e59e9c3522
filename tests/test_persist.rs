use corticore::cortical_column::{CorticalColumn, CorticalColumnConfig, SensoryInput};
use corticore::persist::{self, ColumnSnapshot, CpState, GridState, SpState, TmState};
use corticore::{CpConfig, GridConfig, Sdr, SpConfig, TmConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn empty_snapshot() -> ColumnSnapshot {
    ColumnSnapshot {
        sp: SpState {
            config: SpConfig {
                input_size: 64,
                column_count: 32,
                ..Default::default()
            },
            proximal: Vec::new(),
            active_duty_cycle: vec![0.0; 32],
            overlap_duty_cycle: vec![0.0; 32],
            boost_factor: vec![1.0; 32],
            rng: StdRng::seed_from_u64(1),
            step: 0,
        },
        tm: TmState {
            config: TmConfig {
                column_count: 32,
                ..Default::default()
            },
            distal: vec![Vec::new(); 32 * 4],
            basal: None,
            apical: None,
            active: Sdr::empty(32 * 4),
            winner: Sdr::empty(32 * 4),
            predictive: Sdr::empty(32 * 4),
            prev_active: Sdr::empty(32 * 4),
            prev_winner: Sdr::empty(32 * 4),
            prev_predictive: Sdr::empty(32 * 4),
            last_basal: None,
            last_apical: None,
            step: 0,
        },
        cp: CpState {
            config: CpConfig {
                cell_count: 128,
                ..Default::default()
            },
            proximal: Vec::new(),
            internal_distal: Vec::new(),
            apical: Vec::new(),
            lateral: vec![Vec::new(); 128],
            active_cells: Sdr::empty(128),
            prev_active_cells: Sdr::empty(128),
            rng: StdRng::seed_from_u64(2),
            step: 0,
        },
        grid_modules: vec![GridState {
            config: GridConfig::default(),
            position: (1.5, -2.5),
            anchors: vec![(Sdr::new(64, &[1, 2, 3]), 0.0, 0.0)],
            rng: StdRng::seed_from_u64(3),
        }],
        prev_l23: Sdr::empty(128),
        pending_apical: None,
        pending_lateral: None,
    }
}

#[test]
fn column_snapshot_round_trips_through_save_and_load() {
    let snapshot = empty_snapshot();
    let bytes = persist::save(&snapshot).unwrap();
    let loaded: ColumnSnapshot = persist::load(&bytes).unwrap();

    assert_eq!(loaded.sp.config.column_count, 32);
    assert_eq!(loaded.sp.active_duty_cycle.len(), 32);
    assert_eq!(loaded.tm.distal.len(), 32 * 4);
    assert_eq!(loaded.cp.lateral.len(), 128);
    assert_eq!(loaded.grid_modules.len(), 1);
    assert_eq!(loaded.grid_modules[0].position, (1.5, -2.5));
}

#[test]
fn truncated_payload_is_rejected() {
    let snapshot = empty_snapshot();
    let mut bytes = persist::save(&snapshot).unwrap();
    bytes.truncate(bytes.len() / 2);
    let result: corticore::error::Result<ColumnSnapshot> = persist::load(&bytes);
    assert!(result.is_err());
}

#[test]
fn flipped_byte_in_payload_fails_checksum() {
    let snapshot = empty_snapshot();
    let mut bytes = persist::save(&snapshot).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x01;
    let result: corticore::error::Result<ColumnSnapshot> = persist::load(&bytes);
    assert!(result.is_err());
}

#[test]
fn garbage_bytes_do_not_pass_as_a_valid_envelope() {
    let bytes = vec![0u8; 16];
    let result: corticore::error::Result<ColumnSnapshot> = persist::load(&bytes);
    assert!(result.is_err());
}

#[test]
fn loading_as_the_wrong_type_fails_rather_than_silently_misreading() {
    let grid = GridState {
        config: GridConfig::default(),
        position: (0.0, 0.0),
        anchors: Vec::new(),
        rng: StdRng::seed_from_u64(4),
    };
    let bytes = persist::save(&grid).unwrap();
    let result: corticore::error::Result<ColumnSnapshot> = persist::load(&bytes);
    assert!(result.is_err());
}

fn trained_column_config() -> CorticalColumnConfig {
    CorticalColumnConfig {
        sp: SpConfig {
            input_size: 100,
            column_count: 64,
            potential_radius: 50,
            ..Default::default()
        },
        tm: TmConfig {
            column_count: 64,
            cells_per_column: 4,
            activation_threshold: 2,
            min_threshold: 1,
            ..Default::default()
        },
        cp: CpConfig {
            cell_count: 256,
            sdr_size: 16,
            ..Default::default()
        },
        grid_modules: vec![GridConfig {
            module_size: 10,
            ..Default::default()
        }],
    }
}

fn inputs() -> Vec<SensoryInput> {
    vec![
        SensoryInput { feature: Sdr::new(100, &[1, 2, 3, 4, 5]), dx: 1.0, dy: 0.5 },
        SensoryInput { feature: Sdr::new(100, &[6, 7, 8, 9, 10]), dx: -0.5, dy: 1.0 },
        SensoryInput { feature: Sdr::new(100, &[1, 2, 3, 4, 5]), dx: 0.2, dy: -0.2 },
    ]
}

/// A column trained through a real sequence, snapshotted and restored
/// mid-stream, must produce identical subsequent outputs to the
/// original continuing uninterrupted — across SP/TM/CP learning,
/// homeostasis, and the RNG streams driving tie-breaks and random fill.
#[test]
fn restored_column_matches_original_bit_for_bit_on_subsequent_compute() {
    let mut original = CorticalColumn::new(trained_column_config()).unwrap();
    for input in inputs() {
        original.compute(&input, true).unwrap();
    }

    let snapshot = original.snapshot();
    let bytes = persist::save(&snapshot).unwrap();
    let loaded: ColumnSnapshot = persist::load(&bytes).unwrap();
    let mut restored = CorticalColumn::restore(loaded).unwrap();

    let followups = inputs();
    for input in &followups {
        let out_original = original.compute(input, true).unwrap();
        let out_restored = restored.compute(input, true).unwrap();

        assert_eq!(out_original.active_columns.active(), out_restored.active_columns.active());
        assert_eq!(out_original.tm_active.active(), out_restored.tm_active.active());
        assert_eq!(out_original.tm_winners.active(), out_restored.tm_winners.active());
        assert_eq!(out_original.tm_predicted.active(), out_restored.tm_predicted.active());
        assert_eq!(out_original.object_sdr.active(), out_restored.object_sdr.active());
        assert!((out_original.anomaly - out_restored.anomaly).abs() < 1e-12);
        assert_eq!(out_original.is_novel, out_restored.is_novel);
    }
}
