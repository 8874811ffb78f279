use rand::rngs::StdRng;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{AgentContext, EPSILON};
use crate::constraints::regional_supply_headroom;
use crate::domain::{Asset, AssetId, AssetStack, SwitchType, TransitionType};
use crate::error::{Result, SimulationError};
use crate::inputs::RankingRow;
use crate::transitions::TransitionEntry;

/// Build new standard-size assets until next year's global demand is met.
///
/// The best row is reused until a check fails. Exhausting the ranking with
/// demand still unmet is fatal.
pub fn run_greenfield(
    ctx: &AgentContext<'_>,
    current: &AssetStack,
    next: &mut AssetStack,
    id_rng: &mut StdRng,
    pending: &mut Vec<TransitionEntry>,
) -> Result<()> {
    let year = ctx.year;
    let config = ctx.config;
    let cuf = config.bounded_standard_cuf();

    for product in config.products.iter() {
        let demand = ctx.inputs.demand.global_demand(product, year + 1, ctx.policy())?;
        let mut unmet = demand - next.annual_production_volume(Some(product));
        if unmet <= EPSILON {
            continue;
        }

        let capacity = config.assumed_capacity(product)?;
        let volume = capacity * cuf;
        if volume <= 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "new {product} assets would produce nothing (capacity {capacity}, cuf {cuf})"
            )));
        }
        let required_additions = (unmet / volume).ceil() as usize;

        let mut table = ctx.inputs.rankings.for_year(TransitionType::Greenfield, year);
        table.filter_product(product);

        // greenfield assets of every product count towards the regional cap
        let mut regional_greenfield: BTreeMap<String, usize> = BTreeMap::new();
        for asset in next.iter().filter(|a| a.greenfield) {
            *regional_greenfield.entry(asset.region.clone()).or_insert(0) += 1;
        }
        let greenfield_total: usize = regional_greenfield.values().sum();
        let mut built = 0usize;

        while unmet > EPSILON {
            let Some(row) = table.best().cloned() else {
                return Err(SimulationError::GreenfieldDemandUnmet {
                    year,
                    product: product.clone(),
                    unmet,
                });
            };

            if let Some(share) = config.maximum_global_demand_share_one_region {
                let headroom = regional_supply_headroom(
                    share,
                    greenfield_total,
                    required_additions,
                    &regional_greenfield,
                    &row.region,
                );
                if headroom <= 0 {
                    let struck = table.strike_region(&row.region);
                    debug!(year, region = %row.region, struck, "region reached its greenfield supply cap");
                    continue;
                }
            }

            let asset = new_asset(ctx, &row, capacity, cuf, AssetId::from_rng(id_rng));
            let checked = ctx.check(
                current,
                || {
                    let mut tentative = next.clone();
                    tentative.append(asset.clone())?;
                    Ok(tentative)
                },
                TransitionType::Greenfield,
                Some(&row.technology_destination),
            )?;
            if let Some(results) = checked.filter(|r| !r.all_passed()) {
                let struck = ctx.apply_remediation(&mut table, &row, &results);
                if table.contains(&row) {
                    table.remove_row(&row);
                }
                debug!(year, region = %row.region, destination = %row.technology_destination, struck, "greenfield addition rejected by constraints");
                continue;
            }

            let id = asset.id;
            unmet -= asset.annual_production_volume();
            next.append(asset)?;
            built += 1;
            *regional_greenfield.entry(row.region.clone()).or_insert(0) += 1;
            debug!(year, asset_id = %id, region = %row.region, technology = %row.technology_destination, "greenfield asset built");
            pending.push(TransitionEntry {
                year,
                transition_type: SwitchType::Greenfield,
                asset_id: id,
                region: row.region,
                product: row.product,
                technology_origin: None,
                technology_destination: Some(row.technology_destination),
            });
        }

        info!(year, product = %product, built, "greenfield complete");
    }
    Ok(())
}

fn new_asset(ctx: &AgentContext<'_>, row: &RankingRow, capacity: f64, cuf: f64, id: AssetId) -> Asset {
    Asset {
        id,
        product: row.product.clone(),
        region: row.region.clone(),
        technology: row.technology_destination.clone(),
        annual_production_capacity: capacity,
        cuf,
        technology_classification: row.technology_classification,
        year_commissioned: ctx.year,
        asset_lifetime: row.technology_lifetime,
        retrofit: false,
        rebuild: false,
        greenfield: true,
        year_last_transition: None,
    }
}
