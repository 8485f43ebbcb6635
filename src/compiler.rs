// The plan compiler: one canonical implementation of the dual-inducer assay
// (and the single-plate direct gradient) in place of the five drifting
// protocol scripts it replaces. Compilation is a pure function from
// configuration to (CompiledPlan | PlanError); on any failure the partial
// plan is discarded, never handed out.

use crate::allocation::{self, DeckLayout};
use crate::chain::{ChainSpec, plan_chain};
use crate::config::ExperimentConfig;
use crate::dilution::{AchievabilityWarning, DilutionRow, compute_dilutions, unachievable_targets};
use crate::distribute::{
    DistributeSpec, NewTipPolicy, Reagent, plan_distribution, plan_paired_transfer,
    plan_pool_distribution,
};
use crate::error::PlanError;
use crate::operation::{Channel, MixSpec, Operation};
use crate::plan::{Plan, WellLedger};
use crate::source_pool::{SourcePool, SourceWell};
use crate::well::{PLATE_COLUMNS, PLATE_ROWS, Plate, WellRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Working volume for serial dilution transfers.
pub const CHAIN_VOL_UL: f64 = 300.0;
/// Reagent dose placed into each destination well.
pub const DOSE_VOL_UL: f64 = 30.0;
/// Deep-well capacity of a reservoir well.
pub const DILUENT_WELL_CAPACITY_UL: f64 = 2200.0;
/// Cumulative draw per diluent well before the pool rotates.
pub const DILUENT_HIGH_WATER_UL: f64 = 1200.0;
/// Source-plate columns available to the gradient; columns beyond these are
/// reserved for the inducer-B cascades.
pub const GRADIENT_COLUMNS_MAX: usize = 8;

const CHAIN_MIX: MixSpec = MixSpec {
    repetitions: 3,
    volume_ul: 300.0,
};
const GRADIENT_MIX: MixSpec = MixSpec {
    repetitions: 1,
    volume_ul: 10.0,
};
const CELL_MIX: MixSpec = MixSpec {
    repetitions: 3,
    volume_ul: 50.0,
};
const GRADIENT_PLATE_MIX: MixSpec = MixSpec {
    repetitions: 3,
    volume_ul: 80.0,
};

// Reservoir column assignments.
const DILUENT_POOL_COLUMNS: [usize; 4] = [4, 5, 6, 7];
const INDUCER_A_COLUMN: usize = 1;
const INDUCER_B_COLUMN: usize = 2;
const CELL_COLUMN: usize = 3;

// Source-plate column where the first inducer-B cascade lives; one more
// column per additional replicate.
const INDUCER_B_FIRST_COLUMN: usize = 9;

// Destination-plate control columns.
const DEST_DILUENT_COLUMN: usize = 0;
const DEST_A_ONLY_COLUMN: usize = 1;
const DEST_B_ONLY_COLUMN: usize = 2;
const DEST_POSITIVE_COLUMN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPlan {
    /// The frozen input record; the engine reads channel-level settings the
    /// operations do not carry (blow-out rate) from here.
    pub config: ExperimentConfig,
    pub plan: Plan,
    pub dilution_table: Vec<DilutionRow>,
    pub layout: DeckLayout,
    /// Targets whose stock volume exceeds the well. Reported, never clamped;
    /// the operator decides whether to abort or proceed.
    pub achievability: Vec<AchievabilityWarning>,
    pub warnings: Vec<String>,
    pub messages: Vec<String>,
    pub tips_used_multi: usize,
    pub tips_used_single: usize,
}

/// Compiles the dual-inducer assay: source-plate preparation (diluent
/// distribution, inducer-A cascade across the gradient columns, one
/// inducer-B cascade per replicate), then per-destination-plate dosing and
/// the ledger-driven cell fill.
pub fn compile(config: &ExperimentConfig) -> Result<CompiledPlan, PlanError> {
    config.validate()?;
    let gradient_len = config.targets_um.len();
    if gradient_len > GRADIENT_COLUMNS_MAX {
        return Err(PlanError::InvalidConfiguration(format!(
            "at most {GRADIENT_COLUMNS_MAX} target concentrations fit the source plate, got {gradient_len}"
        )));
    }
    let layout = allocation::resolve(config.replicates)?;

    let dilution_table =
        compute_dilutions(config.stock_conc_um, config.total_vol_ul, &config.targets_um);
    let achievability = unachievable_targets(&dilution_table, config.total_vol_ul);
    let mut warnings: Vec<String> = achievability.iter().map(|w| w.to_string()).collect();
    let mut messages = vec![format!(
        "Planning dual-inducer assay: stock '{}', diluent '{}', {} targets, {} replicate(s)",
        config.stock_name,
        config.diluent_name,
        gradient_len,
        config.replicates
    )];

    // The viscosity multiplier scales the cascade and gradient transfers;
    // plain distributions run at the configured rates.
    let slow = config.rate_multiplier();
    let chain_asp_rate = config.asp_rate * slow;
    let chain_disp_rate = config.disp_rate * slow;

    let mut pool = diluent_pool(&config.diluent_name)?;
    let mut segments: Vec<Vec<Operation>> = Vec::new();

    // Source-plate preparation: diluent into every column a cascade will use.
    let mut diluent_columns: Vec<WellRef> = (0..gradient_len)
        .map(|c| WellRef::column_top(Plate::Source, c))
        .collect();
    diluent_columns.extend(
        (0..config.replicates as usize)
            .map(|r| WellRef::column_top(Plate::Source, INDUCER_B_FIRST_COLUMN + r)),
    );
    segments.push(plan_pool_distribution(
        &mut pool,
        &diluent_columns,
        CHAIN_VOL_UL,
        layout.column_channel,
        config.asp_rate,
        config.disp_rate,
    )?);
    messages.push(format!("{} distribution complete", config.diluent_name));

    // Inducer A cascade across the gradient columns, highest concentration
    // at the highest column.
    segments.push(plan_chain(&ChainSpec {
        source: WellRef::column_top(Plate::Reservoir, INDUCER_A_COLUMN),
        wells: (0..gradient_len)
            .rev()
            .map(|c| WellRef::column_top(Plate::Source, c))
            .collect(),
        aspirate_vol_ul: CHAIN_VOL_UL,
        dispense_vol_ul: CHAIN_VOL_UL,
        mix: Some(CHAIN_MIX),
        channel: layout.column_channel,
        aspirate_rate_ul_s: chain_asp_rate,
        dispense_rate_ul_s: chain_disp_rate,
    })?);
    messages.push(format!(
        "{} serial dilution complete",
        Reagent::InducerA
    ));

    // One inducer-B cascade per replicate, each down its own column with its
    // own tip.
    for replicate in 0..config.replicates as usize {
        let column = INDUCER_B_FIRST_COLUMN + replicate;
        segments.push(plan_chain(&ChainSpec {
            source: WellRef::new(Plate::Reservoir, INDUCER_B_COLUMN, 0),
            wells: (0..PLATE_ROWS)
                .rev()
                .map(|row| WellRef::new(Plate::Source, column, row))
                .collect(),
            aspirate_vol_ul: CHAIN_VOL_UL,
            dispense_vol_ul: CHAIN_VOL_UL,
            mix: Some(CHAIN_MIX),
            channel: layout.cascade_channel,
            aspirate_rate_ul_s: chain_asp_rate,
            dispense_rate_ul_s: chain_disp_rate,
        })?);
        messages.push(format!(
            "{} dilution complete for source column {}",
            Reagent::InducerB,
            column + 1
        ));
    }

    // Destination plates: controls, gradients, then cells.
    for plate_index in 0..layout.plate_slots.len() {
        let plate = Plate::Destination(plate_index as u8 + 1);
        let mut plate_segments: Vec<Vec<Operation>> = Vec::new();

        // Diluent-only control column.
        let diluent_source = pool.take(DOSE_VOL_UL)?;
        plate_segments.push(plan_distribution(&DistributeSpec {
            reagent: Reagent::Diluent,
            source: diluent_source,
            targets: vec![WellRef::column_top(plate, DEST_DILUENT_COLUMN)],
            volume_ul: DOSE_VOL_UL,
            new_tip: NewTipPolicy::Once,
            group_size: None,
            mix: None,
            channel: layout.column_channel,
            aspirate_rate_ul_s: config.asp_rate,
            dispense_rate_ul_s: config.disp_rate,
        })?);

        // Inducer A into the A-only column and the positive control. The
        // positive control accumulates both inducers; each reagent keeps its
        // own tip lifetime.
        plate_segments.push(plan_distribution(&DistributeSpec {
            reagent: Reagent::InducerA,
            source: WellRef::column_top(Plate::Reservoir, INDUCER_A_COLUMN),
            targets: vec![
                WellRef::column_top(plate, DEST_A_ONLY_COLUMN),
                WellRef::column_top(plate, DEST_POSITIVE_COLUMN),
            ],
            volume_ul: DOSE_VOL_UL,
            new_tip: NewTipPolicy::Once,
            group_size: None,
            mix: None,
            channel: layout.column_channel,
            aspirate_rate_ul_s: config.asp_rate,
            dispense_rate_ul_s: config.disp_rate,
        })?);

        plate_segments.push(plan_distribution(&DistributeSpec {
            reagent: Reagent::InducerB,
            source: WellRef::column_top(Plate::Reservoir, INDUCER_B_COLUMN),
            targets: vec![
                WellRef::column_top(plate, DEST_B_ONLY_COLUMN),
                WellRef::column_top(plate, DEST_POSITIVE_COLUMN),
            ],
            volume_ul: DOSE_VOL_UL,
            new_tip: NewTipPolicy::Once,
            group_size: None,
            mix: None,
            channel: layout.column_channel,
            aspirate_rate_ul_s: config.asp_rate,
            dispense_rate_ul_s: config.disp_rate,
        })?);
        messages.push(format!(
            "Controls added to {plate} (diluent column 1, {} column 2, {} column 3, positive column 4)",
            Reagent::InducerA,
            Reagent::InducerB
        ));

        // Prepared A gradient: source columns onto the outermost destination
        // columns, highest concentration first.
        let gradient_pairs: Vec<(WellRef, WellRef)> = (0..gradient_len)
            .rev()
            .zip(((PLATE_COLUMNS - gradient_len)..PLATE_COLUMNS).rev())
            .map(|(src, dst)| {
                (
                    WellRef::column_top(Plate::Source, src),
                    WellRef::column_top(plate, dst),
                )
            })
            .collect();
        plate_segments.push(plan_paired_transfer(
            &gradient_pairs,
            DOSE_VOL_UL,
            NewTipPolicy::Once,
            Some(GRADIENT_MIX),
            layout.column_channel,
            chain_asp_rate,
            chain_disp_rate,
        )?);
        messages.push(format!(
            "Prepared {} gradient added to {plate} (columns {}-{})",
            Reagent::InducerA,
            PLATE_COLUMNS - gradient_len + 1,
            PLATE_COLUMNS
        ));

        // Prepared B from this plate's own dilution column, fresh tip per
        // dose so the gradient wells never cross-contaminate.
        let b_source =
            WellRef::column_top(Plate::Source, INDUCER_B_FIRST_COLUMN + plate_index);
        plate_segments.push(plan_distribution(&DistributeSpec {
            reagent: Reagent::InducerB,
            source: b_source,
            targets: ((PLATE_COLUMNS - gradient_len)..PLATE_COLUMNS)
                .rev()
                .map(|c| WellRef::column_top(plate, c))
                .collect(),
            volume_ul: DOSE_VOL_UL,
            new_tip: NewTipPolicy::Always,
            group_size: None,
            mix: None,
            channel: layout.column_channel,
            aspirate_rate_ul_s: config.asp_rate,
            dispense_rate_ul_s: config.disp_rate,
        })?);
        messages.push(format!(
            "Prepared {} from source column {} added to {plate}",
            Reagent::InducerB,
            INDUCER_B_FIRST_COLUMN + plate_index + 1
        ));

        // Cells top every touched well up to the total volume. Fill volumes
        // come from the plan ledger, grouped so equal fills share one pass.
        let mut ledger = WellLedger::new();
        for segment in &plate_segments {
            ledger.record(segment);
        }
        let mut fill_groups: BTreeMap<i64, (f64, Vec<WellRef>)> = BTreeMap::new();
        for well in ledger.wells() {
            let fill = ledger.fill_to(&well, config.total_vol_ul);
            if fill <= 0.0 {
                if fill < 0.0 {
                    warnings.push(format!(
                        "{well} already holds {:.1} uL, over the {:.1} uL total; no {} added",
                        ledger.dispensed_into(&well),
                        config.total_vol_ul,
                        Reagent::Cells
                    ));
                }
                continue;
            }
            fill_groups
                .entry(fill_key(fill))
                .or_insert_with(|| (fill, Vec::new()))
                .1
                .push(well);
        }
        for (fill, wells) in fill_groups.values().rev() {
            plate_segments.push(plan_distribution(&DistributeSpec {
                reagent: Reagent::Cells,
                source: WellRef::column_top(Plate::Reservoir, CELL_COLUMN),
                targets: wells.clone(),
                volume_ul: *fill,
                new_tip: NewTipPolicy::Always,
                group_size: None,
                mix: Some(CELL_MIX),
                channel: layout.column_channel,
                aspirate_rate_ul_s: config.asp_rate,
                dispense_rate_ul_s: config.disp_rate,
            })?);
        }
        messages.push(format!("{} added to {plate}", Reagent::Cells));

        segments.extend(plate_segments);
    }

    finish(
        config.clone(),
        segments,
        dilution_table,
        layout,
        achievability,
        warnings,
        messages,
    )
}

/// Compiles the single-plate direct gradient: per-column diluent and stock
/// volumes straight from the dilution table, then cells with mixing. This is
/// the mode that exercises the calculator output directly.
pub fn compile_gradient(config: &ExperimentConfig) -> Result<CompiledPlan, PlanError> {
    config.validate()?;
    let n = config.targets_um.len();
    if n > PLATE_COLUMNS {
        return Err(PlanError::InvalidConfiguration(format!(
            "at most {PLATE_COLUMNS} target concentrations fit one plate, got {n}"
        )));
    }
    let layout = allocation::resolve(1)?;

    let dilution_table =
        compute_dilutions(config.stock_conc_um, config.total_vol_ul, &config.targets_um);
    let achievability = unachievable_targets(&dilution_table, config.total_vol_ul);
    let mut warnings: Vec<String> = achievability.iter().map(|w| w.to_string()).collect();
    for row in &dilution_table {
        if row.stock_vol_ul > DILUENT_WELL_CAPACITY_UL {
            warnings.push(format!(
                "target {} uM needs a single {:.1} uL draw, over the {:.1} uL reservoir well capacity",
                row.final_conc_um, row.stock_vol_ul, DILUENT_WELL_CAPACITY_UL
            ));
        }
    }
    let mut messages = vec![format!(
        "Planning direct gradient: stock '{}', diluent '{}', {} columns",
        config.stock_name, config.diluent_name, n
    )];

    let slow = config.rate_multiplier();
    let plate = Plate::Destination(1);
    let diluent_source = WellRef::new(Plate::Reservoir, 0, 0);
    let stock_source = WellRef::new(Plate::Reservoir, 1, 0);
    let cell_source = WellRef::new(Plate::Reservoir, 2, 0);
    let channel = layout.column_channel;
    let mut segments: Vec<Vec<Operation>> = Vec::new();

    // Diluent pass, one tip for every column.
    let mut ops = vec![Operation::AcquireTip { channel }];
    for (column, row) in dilution_table.iter().enumerate() {
        if row.diluent_vol_ul <= 0.0 {
            continue;
        }
        let target = WellRef::column_top(plate, column);
        ops.push(Operation::Aspirate {
            volume_ul: row.diluent_vol_ul,
            from: diluent_source,
            rate_ul_s: config.asp_rate,
        });
        ops.push(Operation::Dispense {
            volume_ul: row.diluent_vol_ul,
            to: target,
            rate_ul_s: config.disp_rate,
        });
        ops.push(Operation::BlowOut { at: target });
    }
    ops.push(Operation::ReleaseTip { channel });
    segments.push(ops);
    messages.push(format!("{} added", config.diluent_name));

    // Stock pass, one tip, mixed into each column.
    let mut ops = vec![Operation::AcquireTip { channel }];
    for (column, row) in dilution_table.iter().enumerate() {
        if row.stock_vol_ul <= 0.0 {
            continue;
        }
        let target = WellRef::column_top(plate, column);
        ops.push(Operation::Aspirate {
            volume_ul: row.stock_vol_ul,
            from: stock_source,
            rate_ul_s: config.asp_rate * slow,
        });
        ops.push(Operation::Dispense {
            volume_ul: row.stock_vol_ul,
            to: target,
            rate_ul_s: config.disp_rate * slow,
        });
        ops.push(Operation::Mix {
            repetitions: GRADIENT_PLATE_MIX.repetitions,
            volume_ul: GRADIENT_PLATE_MIX.volume_ul,
            at: target,
        });
        ops.push(Operation::BlowOut { at: target });
    }
    ops.push(Operation::ReleaseTip { channel });
    segments.push(ops);
    messages.push("Gradient created".to_string());

    // Cells on top of every column, fresh tip each.
    segments.push(plan_distribution(&DistributeSpec {
        reagent: Reagent::Cells,
        source: cell_source,
        targets: (0..n).map(|c| WellRef::column_top(plate, c)).collect(),
        volume_ul: config.total_vol_ul,
        new_tip: NewTipPolicy::Always,
        group_size: None,
        mix: Some(GRADIENT_PLATE_MIX),
        channel,
        aspirate_rate_ul_s: config.asp_rate,
        dispense_rate_ul_s: config.disp_rate,
    })?);
    messages.push("Cells added".to_string());
    messages.push("Move plate to plate reader".to_string());

    finish(
        config.clone(),
        segments,
        dilution_table,
        layout,
        achievability,
        warnings,
        messages,
    )
}

fn finish(
    config: ExperimentConfig,
    segments: Vec<Vec<Operation>>,
    dilution_table: Vec<DilutionRow>,
    layout: DeckLayout,
    achievability: Vec<AchievabilityWarning>,
    warnings: Vec<String>,
    mut messages: Vec<String>,
) -> Result<CompiledPlan, PlanError> {
    let plan = Plan::emit(segments)?;
    let tips_used_multi = plan.tips_used(Channel::Multi);
    let tips_used_single = plan.tips_used(Channel::Single);
    messages.push(format!(
        "Plan complete: {} operations, {tips_used_multi} multi-channel and {tips_used_single} single-channel tips",
        plan.len()
    ));
    Ok(CompiledPlan {
        config,
        plan,
        dilution_table,
        layout,
        achievability,
        warnings,
        messages,
        tips_used_multi,
        tips_used_single,
    })
}

fn diluent_pool(diluent_name: &str) -> Result<SourcePool, PlanError> {
    let wells = DILUENT_POOL_COLUMNS
        .iter()
        .map(|column| {
            SourceWell::new(
                WellRef::column_top(Plate::Reservoir, *column),
                DILUENT_WELL_CAPACITY_UL,
            )
        })
        .collect();
    SourcePool::new(diluent_name, wells, Some(DILUENT_HIGH_WATER_UL))
}

fn fill_key(fill: f64) -> i64 {
    (fill * 1000.0).round() as i64
}
