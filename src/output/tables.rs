//! Comma-separated tables with a header row.
//!
//! Fields containing a comma, quote or line break are quoted, with embedded
//! quotes doubled.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::str::FromStr;

use crate::domain::{Asset, AssetId, AssetStack, TechnologyClassification, Year};
use crate::error::{Result, SimulationError};
use crate::inputs::{EmissionsTable, MissingDataPolicy, CO2_SCOPE1, CO2_SCOPE2};
use crate::transitions::TransitionEntry;

const STACK_HEADER: &str = "asset_id,product,region,technology,annual_production_capacity,cuf,\
annual_production_volume,technology_classification,year_commissioned,asset_lifetime,\
retrofit,rebuild,greenfield,year_last_transition";

const TRANSITIONS_HEADER: &str =
    "year,transition_type,asset_id,region,product,technology_origin,technology_destination";

fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split text into records of fields. Quoted fields may span line breaks;
/// each record carries the line it starts on.
fn split_records(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut line = 1;
    let mut start = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', _) => quoted = !quoted,
            (',', false) => fields.push(std::mem::take(&mut current)),
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n', false) => {
                fields.push(std::mem::take(&mut current));
                records.push((start, std::mem::take(&mut fields)));
                line += 1;
                start = line;
            }
            ('\n', true) => {
                current.push(c);
                line += 1;
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
        records.push((start, fields));
    }
    records
}

pub fn write_stack_csv(writer: &mut impl Write, stack: &AssetStack) -> std::io::Result<()> {
    writeln!(writer, "{STACK_HEADER}")?;
    for asset in stack.iter() {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            asset.id,
            field(&asset.product),
            field(&asset.region),
            field(&asset.technology),
            asset.annual_production_capacity,
            asset.cuf,
            asset.annual_production_volume(),
            asset.technology_classification,
            asset.year_commissioned,
            asset.asset_lifetime,
            asset.retrofit,
            asset.rebuild,
            asset.greenfield,
            asset.year_last_transition.map(|y| y.to_string()).unwrap_or_default(),
        )?;
    }
    Ok(())
}

fn parse<T: FromStr>(value: &str, column: &str, line: usize) -> Result<T> {
    value.trim().parse().map_err(|_| {
        SimulationError::InvalidInput(format!("line {line}: invalid {column} '{value}'"))
    })
}

/// Read a stack written by [`write_stack_csv`]. The derived volume column is
/// ignored.
pub fn read_stack_csv(year: Year, mut reader: impl Read) -> Result<AssetStack> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let mut records = split_records(&text).into_iter();

    let (_, header) = records
        .next()
        .ok_or_else(|| SimulationError::InvalidInput("empty stack file".to_string()))?;
    let header = header.join(",");
    if header.trim() != STACK_HEADER {
        return Err(SimulationError::InvalidInput(format!(
            "unexpected stack header '{header}'"
        )));
    }

    let mut assets = Vec::new();
    for (n, f) in records {
        if f.len() == 1 && f[0].trim().is_empty() {
            continue;
        }
        if f.len() != 14 {
            return Err(SimulationError::InvalidInput(format!(
                "line {n}: expected 14 fields, got {}",
                f.len()
            )));
        }
        assets.push(Asset {
            id: parse::<AssetId>(&f[0], "asset_id", n)?,
            product: f[1].clone(),
            region: f[2].clone(),
            technology: f[3].clone(),
            annual_production_capacity: parse(&f[4], "annual_production_capacity", n)?,
            cuf: parse(&f[5], "cuf", n)?,
            technology_classification: parse::<TechnologyClassification>(&f[7], "technology_classification", n)?,
            year_commissioned: parse(&f[8], "year_commissioned", n)?,
            asset_lifetime: parse(&f[9], "asset_lifetime", n)?,
            retrofit: parse(&f[10], "retrofit", n)?,
            rebuild: parse(&f[11], "rebuild", n)?,
            greenfield: parse(&f[12], "greenfield", n)?,
            year_last_transition: match f[13].trim() {
                "" => None,
                value => Some(parse(value, "year_last_transition", n)?),
            },
        });
    }
    AssetStack::new(year, assets)
}

pub fn write_transitions_csv(
    writer: &mut impl Write,
    entries: &[TransitionEntry],
) -> std::io::Result<()> {
    writeln!(writer, "{TRANSITIONS_HEADER}")?;
    for entry in entries {
        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            entry.year,
            entry.transition_type,
            entry.asset_id,
            field(&entry.region),
            field(&entry.product),
            field(entry.technology_origin.as_deref().unwrap_or_default()),
            field(entry.technology_destination.as_deref().unwrap_or_default()),
        )?;
    }
    Ok(())
}

/// Production volume per technology (rows) and year (columns)
pub fn write_technology_roadmap_csv(
    writer: &mut impl Write,
    stacks: &BTreeMap<Year, AssetStack>,
) -> std::io::Result<()> {
    let mut volumes: BTreeMap<String, BTreeMap<Year, f64>> = BTreeMap::new();
    let mut technologies = BTreeSet::new();
    for (year, stack) in stacks.iter() {
        for asset in stack.iter() {
            technologies.insert(asset.technology.clone());
            *volumes
                .entry(asset.technology.clone())
                .or_default()
                .entry(*year)
                .or_insert(0.0) += asset.annual_production_volume();
        }
    }

    write!(writer, "technology")?;
    for year in stacks.keys() {
        write!(writer, ",{year}")?;
    }
    writeln!(writer)?;

    for technology in technologies.iter() {
        write!(writer, "{}", field(technology))?;
        let by_year = &volumes[technology];
        for year in stacks.keys() {
            write!(writer, ",{}", by_year.get(year).copied().unwrap_or(0.0))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Emissions of every stack per variable (`emissions_<key>`), including
/// captured CO2 and the scope 1+2 CO2 sum, in Mt per year
pub fn emissions_trajectory(
    stacks: &BTreeMap<Year, AssetStack>,
    emissions: &EmissionsTable,
    policy: MissingDataPolicy,
) -> Result<BTreeMap<String, BTreeMap<Year, f64>>> {
    let mut trajectory: BTreeMap<String, BTreeMap<Year, f64>> = BTreeMap::new();
    for (year, stack) in stacks.iter() {
        let totals = stack.calculate_emissions_stack(*year, emissions, None, policy)?;
        let captured = stack.calculate_co2_captured_stack(*year, emissions, policy)?;
        let scope1_2 = totals.get(CO2_SCOPE1).copied().unwrap_or(0.0)
            + totals.get(CO2_SCOPE2).copied().unwrap_or(0.0);

        let variables = totals
            .into_iter()
            .chain([
                (format!("{CO2_SCOPE1}_captured"), captured),
                (format!("{CO2_SCOPE1}+2"), scope1_2),
            ]);
        for (key, value) in variables {
            trajectory
                .entry(format!("emissions_{key}"))
                .or_default()
                .insert(*year, value);
        }
    }
    Ok(trajectory)
}

/// Emissions per variable (rows) and year (columns)
pub fn write_emissions_trajectory_csv(
    writer: &mut impl Write,
    years: impl IntoIterator<Item = Year> + Clone,
    trajectory: &BTreeMap<String, BTreeMap<Year, f64>>,
) -> std::io::Result<()> {
    write!(writer, "variable")?;
    for year in years.clone() {
        write!(writer, ",{year}")?;
    }
    writeln!(writer)?;

    for (variable, by_year) in trajectory.iter() {
        write!(writer, "{}", field(variable))?;
        for year in years.clone() {
            write!(writer, ",{}", by_year.get(&year).copied().unwrap_or(0.0))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
