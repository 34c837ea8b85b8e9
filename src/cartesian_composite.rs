//! The Cartesian-source composite generator (`spec.md` §4.4): combines
//! already-gridded Cartesian products (rather than polar volumes) by
//! nearest-source-by-distance selection, with no quality-field propagation
//! and no elevation geometry involved.
//!
//! Grounded on `cartesiancomposite.h`'s simpler sibling of `composite.h`:
//! same imperative add/generate shape, but the per-pixel procedure reduces
//! to picking whichever input raster's site is closest and copying its
//! value through, since no beam geometry is needed when every source is
//! already a Cartesian raster on its own grid.

use std::collections::HashMap;

use log::debug;
use rayon::prelude::*;

use crate::error::CompositeError;
use crate::raster::{Area, CartesianRaster, Grid};

/// A single already-gridded input: its own projection/extent (so the
/// generator can map an output pixel's (lon, lat) back into it), a site
/// position used for nearest-source selection, and named value bands.
pub trait ReadableCartesian {
    fn area(&self) -> &dyn Area;

    /// The radar site this raster was generated from, `(lat_rad, lon_rad)`,
    /// used only to break ties between overlapping sources by distance.
    fn site(&self) -> (f64, f64);

    /// The physical value of `quantity` at `(lon, lat)`, or `None` if the
    /// point falls outside this raster's extent or is nodata.
    fn sample(&self, quantity: &str, lon: f64, lat: f64) -> Option<f64>;
}

/// Configures and runs a Cartesian-source composite generation.
pub struct Generator<'a> {
    sources: Vec<&'a dyn ReadableCartesian>,
    parameters: Vec<(String, f64, f64)>,
    output_nodata: f64,
    output_raw_range: (f64, f64),
    emitted: bool,
}

impl<'a> Default for Generator<'a> {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            parameters: Vec::new(),
            output_nodata: 255.0,
            output_raw_range: (0.0, 254.0),
            emitted: false,
        }
    }
}

impl<'a> Generator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_configuring(&self) -> Result<(), CompositeError> {
        if self.emitted {
            return Err(CompositeError::InvalidConfig(
                "generator has already emitted; create a new Generator to reconfigure".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add(&mut self, source: &'a dyn ReadableCartesian) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.sources.push(source);
        Ok(())
    }

    pub fn add_parameter(&mut self, quantity: impl Into<String>, gain: f64, offset: f64) -> Result<(), CompositeError> {
        self.require_configuring()?;
        if gain == 0.0 {
            return Err(CompositeError::InvalidConfig(
                "parameter gain must not be zero".to_string(),
            ));
        }
        self.parameters.push((quantity.into(), gain, offset));
        Ok(())
    }

    pub fn set_output_nodata(&mut self, nodata: f64) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.output_nodata = nodata;
        Ok(())
    }

    pub fn set_output_raw_range(&mut self, min: f64, max: f64) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.output_raw_range = (min, max);
        Ok(())
    }

    fn validate(&self, area: &dyn Area) -> Result<(), CompositeError> {
        if self.sources.is_empty() {
            return Err(CompositeError::InvalidConfig("no sources added".to_string()));
        }
        if self.parameters.is_empty() {
            return Err(CompositeError::InvalidConfig(
                "no parameters configured".to_string(),
            ));
        }
        for source in &self.sources {
            let src_area = source.area();
            let same_grid = src_area.xsize() == area.xsize()
                && src_area.ysize() == area.ysize()
                && src_area.xscale() == area.xscale()
                && src_area.yscale() == area.yscale()
                && src_area.ll_x() == area.ll_x()
                && src_area.ll_y() == area.ll_y();
            if !same_grid {
                return Err(CompositeError::InvalidConfig(
                    "source grid does not match output area (projection, size, or extent differ)"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Generates the composite by, at each pixel, choosing whichever source
    /// both covers it and has the nearest site, and copying its value
    /// through repacked to the output gain/offset. A source that covers a
    /// pixel but whose site is farther away never overrides a closer
    /// source's sample, even if the closer source is itself nodata there
    /// (`spec.md` §4.4's single-valid-source override rule: a pixel only
    /// falls through to a farther source when the nearest one has no
    /// sample at all).
    pub fn nearest(&mut self, area: &dyn Area) -> Result<Grid, CompositeError> {
        self.validate(area)?;
        self.emitted = true;
        debug!(
            "generating cartesian composite from {} source(s) over a {}x{} area",
            self.sources.len(),
            area.xsize(),
            area.ysize()
        );

        let mut grid = Grid::new(area.xsize(), area.ysize(), self.output_nodata);
        for (quantity, gain, offset) in &self.parameters {
            grid.add_parameter(quantity, *gain, *offset);
        }

        let source_order: Vec<(usize, (f64, f64))> = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.site()))
            .collect();

        let rows: Vec<Vec<(usize, usize, HashMap<String, Option<f64>>)>> = (0..area.ysize())
            .into_par_iter()
            .map(|y| {
                let mut row = Vec::with_capacity(area.xsize());
                for x in 0..area.xsize() {
                    let (lon, lat) = area.xy_to_lonlat(x, y);
                    let ranked = rank_sources_by_distance(&source_order, lon, lat);
                    let mut samples = HashMap::new();
                    for (quantity, _, _) in &self.parameters {
                        let mut chosen = None;
                        for &idx in &ranked {
                            if let Some(value) = self.sources[idx].sample(quantity, lon, lat) {
                                chosen = Some(value);
                                break;
                            }
                        }
                        samples.insert(quantity.clone(), chosen);
                    }
                    row.push((x, y, samples));
                }
                row
            })
            .collect();

        for row in rows {
            for (x, y, samples) in row {
                for (quantity, gain, offset) in &self.parameters {
                    grid.select_parameter(quantity);
                    match samples.get(quantity).copied().flatten() {
                        Some(phys) => {
                            let raw = ((phys - offset) / gain).round().clamp(
                                self.output_raw_range.0,
                                self.output_raw_range.1,
                            );
                            grid.set_value(x, y, raw);
                        }
                        None => grid.set_nodata(x, y),
                    }
                }
            }
        }

        Ok(grid)
    }
}

/// Ranks source indices by great-circle distance (radians, flat-angle
/// approximation sufficient for tie-breaking at composite scale) from each
/// source's own site to `(lon, lat)`, nearest first.
fn rank_sources_by_distance(sources: &[(usize, (f64, f64))], lon: f64, lat: f64) -> Vec<usize> {
    let mut ranked: Vec<(usize, f64)> = sources
        .iter()
        .map(|&(idx, (site_lat, site_lon))| {
            let d_lat = site_lat - lat;
            let d_lon = site_lon - lon;
            (idx, d_lat * d_lat + d_lon * d_lon)
        })
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    ranked.into_iter().map(|(idx, _)| idx).collect()
}
