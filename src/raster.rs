//! The `Area`/`Projection` and `CartesianRaster` external collaborators
//! (`spec.md` §6), plus a concrete in-memory raster for callers that do not
//! bring their own.

use std::collections::HashMap;

use crate::polar::{Field, QualityField};

/// A Cartesian grid's extent and pixel-to-geographic projection. The core
/// never computes a projection itself; it only asks `xy_to_lonlat`.
pub trait Area {
    fn xsize(&self) -> usize;
    fn ysize(&self) -> usize;
    fn xscale(&self) -> f64;
    fn yscale(&self) -> f64;
    fn ll_x(&self) -> f64;
    fn ll_y(&self) -> f64;

    /// The (lon, lat) in radians of pixel `(x, y)`, `y` counted from the
    /// bottom row per the lower-left origin (`llX`, `llY`) convention.
    fn xy_to_lonlat(&self, x: usize, y: usize) -> (f64, f64);
}

/// A writable 2-D output grid.
pub trait CartesianRaster {
    fn set_value(&mut self, x: usize, y: usize, raw: f64);
    fn set_nodata(&mut self, x: usize, y: usize);
    fn add_parameter(&mut self, name: &str, gain: f64, offset: f64);
    fn attach_quality(&mut self, name: &str, field: Box<dyn QualityField>);
}

/// A simple equirectangular-projection area, sufficient for tests and small
/// standalone callers: pixel (x, y) maps linearly onto (lon, lat) from a
/// lower-left corner.
#[derive(Debug, Clone)]
pub struct EquirectangularArea {
    pub xsize: usize,
    pub ysize: usize,
    pub xscale: f64,
    pub yscale: f64,
    pub ll_x: f64,
    pub ll_y: f64,
}

impl Area for EquirectangularArea {
    fn xsize(&self) -> usize {
        self.xsize
    }
    fn ysize(&self) -> usize {
        self.ysize
    }
    fn xscale(&self) -> f64 {
        self.xscale
    }
    fn yscale(&self) -> f64 {
        self.yscale
    }
    fn ll_x(&self) -> f64 {
        self.ll_x
    }
    fn ll_y(&self) -> f64 {
        self.ll_y
    }
    fn xy_to_lonlat(&self, x: usize, y: usize) -> (f64, f64) {
        let lon = self.ll_x + (x as f64 + 0.5) * self.xscale;
        // Raster rows are conventionally stored top-down; row 0 is the
        // northernmost row, so y counts down from ysize - 1 to reach llY.
        let lat = self.ll_y + ((self.ysize - 1 - y) as f64 + 0.5) * self.yscale;
        (lon, lat)
    }
}

/// A single output band: packed raw values plus the gain/offset they were
/// packed with.
#[derive(Debug, Clone)]
pub struct Band {
    pub gain: f64,
    pub offset: f64,
    pub nodata: f64,
    pub data: Vec<f64>,
}

/// A simple in-memory Cartesian raster: one band per parameter, plus
/// optionally attached quality fields. Useful as a default `CartesianRaster`
/// implementation and in tests.
#[derive(Default)]
pub struct Grid {
    pub xsize: usize,
    pub ysize: usize,
    pub nodata: f64,
    pub bands: HashMap<String, Band>,
    pub quality: HashMap<String, Field>,
    current_parameter: Option<String>,
}

impl Grid {
    pub fn new(xsize: usize, ysize: usize, nodata: f64) -> Self {
        Self {
            xsize,
            ysize,
            nodata,
            bands: HashMap::new(),
            quality: HashMap::new(),
            current_parameter: None,
        }
    }

    /// Selects the band subsequent `set_value`/`set_nodata` calls write to.
    /// The composite generator calls this once per parameter before
    /// sampling it across the whole raster.
    pub fn select_parameter(&mut self, name: &str) {
        self.current_parameter = Some(name.to_string());
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.get(name)
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.xsize + x
    }
}

impl CartesianRaster for Grid {
    fn set_value(&mut self, x: usize, y: usize, raw: f64) {
        let idx = self.index(x, y);
        if let Some(name) = self.current_parameter.clone() {
            if let Some(band) = self.bands.get_mut(&name) {
                band.data[idx] = raw;
            }
        }
    }

    fn set_nodata(&mut self, x: usize, y: usize) {
        let idx = self.index(x, y);
        if let Some(name) = self.current_parameter.clone() {
            if let Some(band) = self.bands.get_mut(&name) {
                let nodata = band.nodata;
                band.data[idx] = nodata;
            }
        }
    }

    fn add_parameter(&mut self, name: &str, gain: f64, offset: f64) {
        let band = Band {
            gain,
            offset,
            nodata: self.nodata,
            data: vec![self.nodata; self.xsize * self.ysize],
        };
        self.bands.insert(name.to_string(), band);
    }

    fn attach_quality(&mut self, name: &str, field: Box<dyn QualityField>) {
        self.quality.insert(
            name.to_string(),
            Field {
                data: (0..self.ysize)
                    .map(|y| {
                        (0..self.xsize)
                            .map(|x| field.raw(y, x))
                            .collect()
                    })
                    .collect(),
                gain: field.gain(),
                offset: field.offset(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equirectangular_pixel_zero_is_near_lower_left() {
        let area = EquirectangularArea {
            xsize: 10,
            ysize: 10,
            xscale: 1000.0,
            yscale: 1000.0,
            ll_x: 0.0,
            ll_y: 0.0,
        };
        let (lon, lat) = area.xy_to_lonlat(0, 9);
        assert!(lon > 0.0 && lon < 1000.0);
        assert!(lat > 0.0 && lat < 1000.0);
    }

    #[test]
    fn grid_round_trips_values() {
        let mut grid = Grid::new(4, 4, -9999.0);
        grid.add_parameter("DBZH", 0.5, -20.0);
        grid.select_parameter("DBZH");
        grid.set_value(1, 2, 42.0);
        assert_eq!(grid.band("DBZH").unwrap().data[2 * 4 + 1], 42.0);
        grid.set_nodata(1, 2);
        assert_eq!(grid.band("DBZH").unwrap().data[2 * 4 + 1], -9999.0);
    }
}
