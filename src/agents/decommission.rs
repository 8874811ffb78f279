use ordered_float::OrderedFloat;
use tracing::{debug, info};

use super::{AgentContext, EPSILON};
use crate::domain::{AssetId, AssetStack, SwitchType, TransitionType};
use crate::error::Result;
use crate::inputs::RankingRow;
use crate::transitions::TransitionEntry;

/// Retire assets while production of the current stack exceeds this year's
/// demand.
///
/// Candidates are old (`age >= investment_cycle`) and already at the CUF
/// floor. Within a ranking row the oldest asset goes first, then the one with
/// the lowest CUF, then stack order. Running out of candidates ends the
/// product's decommissioning for the year.
pub fn run_decommission(
    ctx: &AgentContext<'_>,
    current: &AssetStack,
    next: &mut AssetStack,
    pending: &mut Vec<TransitionEntry>,
) -> Result<()> {
    let year = ctx.year;

    for product in ctx.config.products.iter() {
        let production = current.annual_production_volume(Some(product));
        let demand = ctx.inputs.demand.global_demand(product, year, ctx.policy())?;
        let mut surplus = production - demand;
        if surplus <= EPSILON {
            continue;
        }

        let mut table = ctx.inputs.rankings.for_year(TransitionType::Decommission, year);
        table.filter_product(product);
        let mut removed = 0usize;

        while surplus > EPSILON {
            let mut rejected: Vec<RankingRow> = Vec::new();
            let mut selected: Option<(RankingRow, AssetId)> = None;

            for row in table.iter() {
                let Some(id) = select_asset(ctx, next, row) else {
                    continue;
                };
                let checked = ctx.check(
                    current,
                    || {
                        let mut tentative = next.clone();
                        tentative.remove(id)?;
                        Ok(tentative)
                    },
                    TransitionType::Decommission,
                    None,
                )?;
                if checked.as_ref().is_some_and(|r| !r.all_passed()) {
                    debug!(year, region = %row.region, technology = %row.technology_origin, "decommission candidate rejected by constraints");
                    rejected.push(row.clone());
                    continue;
                }
                selected = Some((row.clone(), id));
                break;
            }

            for row in rejected.iter() {
                table.remove_row(row);
            }

            let Some((row, id)) = selected else {
                info!(year, product = %product, surplus, "no eligible asset left to decommission");
                break;
            };

            let asset = next.remove(id)?;
            surplus -= asset.annual_production_volume();
            removed += 1;
            debug!(year, asset_id = %id, region = %row.region, technology = %asset.technology, "asset decommissioned");
            pending.push(TransitionEntry {
                year,
                transition_type: SwitchType::Decommission,
                asset_id: id,
                region: asset.region,
                product: asset.product,
                technology_origin: Some(asset.technology),
                technology_destination: None,
            });
        }

        info!(year, product = %product, decommissioned = removed, "decommission complete");
    }
    Ok(())
}

/// Oldest, then least utilised asset matching the row
fn select_asset(ctx: &AgentContext<'_>, next: &AssetStack, row: &RankingRow) -> Option<AssetId> {
    let cycle = ctx.config.investment_cycle;
    let floor = ctx.config.cuf_lower_threshold;
    next.iter()
        .filter(|a| {
            a.product == row.product
                && a.region == row.region
                && a.technology == row.technology_origin
                && a.age(ctx.year) >= cycle
                && a.cuf <= floor + EPSILON
        })
        .min_by_key(|a| (a.year_commissioned, OrderedFloat(a.cuf)))
        .map(|a| a.id)
}
