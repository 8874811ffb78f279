use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use super::AgentContext;
use crate::domain::{AssetId, AssetStack, AssetUpdate, TransitionType};
use crate::error::{Result, SimulationError};
use crate::inputs::{RankingRow, RankingTable};
use crate::transitions::TransitionEntry;

/// Switch eligible assets to better-ranked technologies, at most
/// `ceil(annual_renovation_share × |stack|)` of them per year.
///
/// When several assets match the best row, one is drawn uniformly with the
/// run's seeded generator.
pub fn run_brownfield(
    ctx: &AgentContext<'_>,
    current: &AssetStack,
    next: &mut AssetStack,
    rng: &mut StdRng,
    pending: &mut Vec<TransitionEntry>,
) -> Result<()> {
    let year = ctx.year;
    let config = ctx.config;
    let cap = (config.annual_renovation_share * current.len() as f64).ceil() as usize;

    let mut table = candidate_rows(ctx)?;
    let mut pool: Vec<AssetId> =
        next.get_assets_eligible_for_brownfield(year, config.investment_cycle);
    let mut transitioned = 0usize;

    while !pool.is_empty() && transitioned < cap {
        let Some(row) = table.pop_best() else {
            break;
        };

        let matches: Vec<AssetId> = pool
            .iter()
            .copied()
            .filter(|id| {
                next.get(*id).is_some_and(|a| {
                    a.technology == row.technology_origin
                        && a.region == row.region
                        && a.product == row.product
                })
            })
            .collect();
        let Some(&id) = matches.choose(rng) else {
            continue;
        };

        let update = AssetUpdate {
            new_technology: row.technology_destination.clone(),
            new_classification: row.technology_classification,
            new_lifetime: row.technology_lifetime,
            switch_type: row.switch_type,
            year,
            update_year_commissioned: config
                .brownfield
                .switch_types_update_year_commissioned
                .contains(&row.switch_type),
        };

        let checked = ctx.check(
            current,
            || {
                let mut tentative = next.clone();
                tentative.update_asset(id, &update)?;
                Ok(tentative)
            },
            TransitionType::Brownfield,
            Some(&row.technology_destination),
        )?;
        if let Some(results) = checked.filter(|r| !r.all_passed()) {
            let struck = ctx.apply_remediation(&mut table, &row, &results);
            debug!(year, region = %row.region, destination = %row.technology_destination, struck, "brownfield switch rejected by constraints");
            continue;
        }

        next.update_asset(id, &update)?;
        pool.retain(|p| *p != id);
        transitioned += 1;
        debug!(year, asset_id = %id, origin = %row.technology_origin, destination = %row.technology_destination, switch_type = %row.switch_type, "brownfield switch");
        pending.push(TransitionEntry {
            year,
            transition_type: row.switch_type,
            asset_id: id,
            region: row.region,
            product: row.product,
            technology_origin: Some(row.technology_origin),
            technology_destination: Some(row.technology_destination),
        });
    }

    info!(year, transitioned, cap, "brownfield complete");
    Ok(())
}

/// This year's brownfield ranking, restricted to switches that are allowed
fn candidate_rows(ctx: &AgentContext<'_>) -> Result<RankingTable> {
    let year = ctx.year;
    let config = ctx.config;
    let brownfield = &config.brownfield;
    let mut table = ctx.inputs.rankings.for_year(TransitionType::Brownfield, year);

    table.retain(|r| {
        r.switch_type.is_brownfield()
            && r.technology_origin != r.technology_destination
            && config.products.contains(&r.product)
    });

    if let Some(minimum) = brownfield.cost_metric_decrease {
        if let Some(row) = table.iter().find(|r| r.cost_metric_decrease.is_none()) {
            return Err(SimulationError::data_alignment(
                "cost_metric_decrease",
                row_key(row),
            ));
        }
        table.retain(|r| r.cost_metric_decrease.is_some_and(|d| d >= minimum));
    }

    table.retain(|r| !brownfield.is_banned(&r.region, &r.technology_destination));
    table.retain(|r| brownfield.start_year(r.switch_type).map_or(true, |start| year >= start));
    Ok(table)
}

fn row_key(row: &RankingRow) -> String {
    format!(
        "{}/{}/{} -> {}/{}",
        row.product, row.region, row.technology_origin, row.technology_destination, row.year
    )
}
