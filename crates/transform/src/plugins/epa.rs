//! Gridded EPA U.S. methane inventory, summed into sector layers.

use std::ops::Range;

use crate::error::{Result, TransformError};
use crate::filename::FilenameTokens;
use crate::plugin::{TransformOutput, Transformation};
use crate::source::SourceFile;

use super::{find_dim, harmonize, mask_value, normalize, select, spatial_raster, Outputs};

/// Sector layers are written in millions of the source unit.
const UNIT_DIVISOR: f32 = 1.0e6;

/// Inventory files list at least this many emission variables.
const MIN_VARIABLES: usize = 27;

pub struct EpaCh4Emission;

/// Sector layers as positions in the file's variable list.
fn sectors(var_count: usize) -> Vec<(&'static str, Vec<usize>)> {
    fn span(r: Range<usize>) -> Vec<usize> {
        r.collect()
    }
    vec![
        ("all-variables", span(0..var_count - 1)),
        ("agriculture", span(17..21)),
        ("natural-gas-systems", span(10..15).into_iter().chain([26]).collect()),
        ("petroleum-systems", span(5..9)),
        ("waste", span(21..26)),
        ("coal-mines", span(2..5)),
        (
            "other",
            span(0..2)
                .into_iter()
                .chain([9])
                .chain(15..17)
                .collect(),
        ),
    ]
}

impl EpaCh4Emission {
    fn year(name: &str) -> Result<i32> {
        let tokens = FilenameTokens::parse(name);
        let token = tokens.get_from_end(2)?;
        token
            .parse()
            .map_err(|_| TransformError::filename(name, format!("'{}' is not a year", token)))
    }

    fn cog_name(name: &str, sector: &str, year: i32) -> Result<String> {
        let mut tokens = FilenameTokens::parse(name);
        tokens.pop()?;
        tokens.set_last(format!("{:04}", year))?;
        tokens.insert(2, sector);
        Ok(tokens.cog_name())
    }
}

impl Transformation for EpaCh4Emission {
    fn name(&self) -> &'static str {
        "epa_ch4emission"
    }

    fn description(&self) -> &'static str {
        "EPA gridded CH4 inventory, summed into sector layers per year"
    }

    fn transform(&self, source: &SourceFile, nodata: f32) -> Result<TransformOutput> {
        let year = Self::year(&source.name)?;
        let ds = source.open_netcdf()?;
        let x = find_dim(&ds, &["lon", "longitude"], &source.name)?;
        let y = find_dim(&ds, &["lat", "latitude"], &source.name)?;

        let vars: Vec<_> = ds.data_vars().collect();
        if vars.len() < MIN_VARIABLES {
            return Err(TransformError::missing(
                &source.name,
                format!(
                    "{} emission variables, sector layers need {}",
                    vars.len(),
                    MIN_VARIABLES
                ),
            ));
        }

        let mut outputs = Outputs::new(source);
        for step in 0..ds.dimension_len("time").unwrap_or(1) {
            for (sector, members) in sectors(vars.len()) {
                let mut total = None;
                for &i in &members {
                    let part = mask_value(select(vars[i], &[("time", step)], x, y)?, nodata);
                    total = Some(match total {
                        None => part,
                        Some(sum) => sum.add(&part)?,
                    });
                }
                let Some(total) = total else { continue };

                let mut layer = total.map(|v| v / UNIT_DIVISOR);
                layer.name = sector.to_string();

                let mut raster = spatial_raster(&ds, &layer, x, y)?;
                normalize(&mut raster);
                harmonize(&mut raster, nodata);
                raster
                    .attributes
                    .insert("source".to_string(), source.file_name().to_string());
                raster
                    .attributes
                    .insert("sector_variables".to_string(), members.len().to_string());

                let key = Self::cog_name(&source.name, sector, year)?;
                outputs.insert(key, raster)?;
            }
        }
        Ok(outputs.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_membership() {
        let groups = sectors(28);
        let lookup = |name: &str| {
            groups
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, m)| m.clone())
                .unwrap()
        };
        assert_eq!(lookup("all-variables").len(), 27);
        assert_eq!(lookup("natural-gas-systems"), vec![10, 11, 12, 13, 14, 26]);
        assert_eq!(lookup("other"), vec![0, 1, 9, 15, 16]);
        assert_eq!(lookup("coal-mines"), vec![2, 3, 4]);
    }

    #[test]
    fn test_cog_name() {
        assert_eq!(
            EpaCh4Emission::cog_name("Express_Extension_Gridded_GHGI_Methane_v2_2020.nc", "waste", 2020)
                .unwrap(),
            "Express_Extension_waste_Gridded_GHGI_Methane_v2_2020.tif"
        );
    }
}
