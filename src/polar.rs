//! The `PolarVolume`/`PolarScan` accessor contract (`spec.md` §6), plus a
//! concrete in-memory implementation for callers that do not bring their own
//! ODIM binding.

use std::collections::HashMap;

/// A single quality field sampled the same way as a scan's quantity data:
/// raw values plus a linear gain/offset.
pub trait QualityField {
    fn raw(&self, ray: usize, bin: usize) -> f64;
    fn gain(&self) -> f64;
    fn offset(&self) -> f64;

    /// Convenience: `raw * gain + offset`.
    fn value(&self, ray: usize, bin: usize) -> f64 {
        self.raw(ray, bin) * self.gain() + self.offset()
    }
}

/// One elevation sweep of a polar volume.
pub trait PolarScan {
    fn elevation_rad(&self) -> f64;
    fn range_step_m(&self) -> f64;
    fn range_start_m(&self) -> f64;
    fn nbins(&self) -> usize;
    fn nrays(&self) -> usize;
    fn raw(&self, ray: usize, bin: usize) -> f64;
    fn gain(&self) -> f64;
    fn offset(&self) -> f64;
    fn nodata_raw(&self) -> f64;
    fn undetect_raw(&self) -> f64;
    fn quality_field(&self, how_task: &str) -> Option<&dyn QualityField>;

    /// Convenience: `raw * gain + offset`, or `None` if `(ray, bin)` is
    /// outside this scan's dimensions.
    fn value(&self, ray: usize, bin: usize) -> Option<f64> {
        if ray >= self.nrays() || bin >= self.nbins() {
            return None;
        }
        Some(self.raw(ray, bin) * self.gain() + self.offset())
    }

    /// True when `raw` is this scan's nodata or undetect sentinel.
    fn is_reserved_raw(&self, raw: f64) -> bool {
        raw == self.nodata_raw() || raw == self.undetect_raw()
    }
}

/// A full polar volume: a radar site plus an ascending-by-elevation list of
/// scans.
pub trait PolarVolume {
    /// `(lat_rad, lon_rad, altitude_m)`.
    fn site(&self) -> (f64, f64, f64);
    fn scan_count(&self) -> usize;
    fn scan(&self, i: usize) -> &dyn PolarScan;
}

/// An owned quality field, for callers building volumes in-process (tests,
/// simple adapters) rather than wrapping an existing ODIM binding.
#[derive(Debug, Clone)]
pub struct Field {
    pub data: Vec<Vec<f64>>,
    pub gain: f64,
    pub offset: f64,
}

impl QualityField for Field {
    fn raw(&self, ray: usize, bin: usize) -> f64 {
        self.data
            .get(ray)
            .and_then(|row| row.get(bin))
            .copied()
            .unwrap_or(f64::NAN)
    }
    fn gain(&self) -> f64 {
        self.gain
    }
    fn offset(&self) -> f64 {
        self.offset
    }
}

/// An owned scan, for callers building volumes in-process.
#[derive(Debug, Clone)]
pub struct Scan {
    pub elevation_rad: f64,
    pub range_step_m: f64,
    pub range_start_m: f64,
    pub data: Vec<Vec<f64>>,
    pub gain: f64,
    pub offset: f64,
    pub nodata_raw: f64,
    pub undetect_raw: f64,
    pub quality_fields: HashMap<String, Field>,
}

impl PolarScan for Scan {
    fn elevation_rad(&self) -> f64 {
        self.elevation_rad
    }
    fn range_step_m(&self) -> f64 {
        self.range_step_m
    }
    fn range_start_m(&self) -> f64 {
        self.range_start_m
    }
    fn nbins(&self) -> usize {
        self.data.first().map_or(0, |row| row.len())
    }
    fn nrays(&self) -> usize {
        self.data.len()
    }
    fn raw(&self, ray: usize, bin: usize) -> f64 {
        self.data
            .get(ray)
            .and_then(|row| row.get(bin))
            .copied()
            .unwrap_or(self.nodata_raw)
    }
    fn gain(&self) -> f64 {
        self.gain
    }
    fn offset(&self) -> f64 {
        self.offset
    }
    fn nodata_raw(&self) -> f64 {
        self.nodata_raw
    }
    fn undetect_raw(&self) -> f64 {
        self.undetect_raw
    }
    fn quality_field(&self, how_task: &str) -> Option<&dyn QualityField> {
        self.quality_fields
            .get(how_task)
            .map(|f| f as &dyn QualityField)
    }
}

/// An owned polar volume: site plus an ascending-by-elevation list of scans,
/// with the metadata (time, date, source, NOD) `spec.md` §3 describes.
#[derive(Debug, Clone)]
pub struct Volume {
    pub lat_rad: f64,
    pub lon_rad: f64,
    pub alt_m: f64,
    pub scans: Vec<Scan>,
    pub time: Option<String>,
    pub date: Option<String>,
    pub source: Option<String>,
}

impl Volume {
    /// Builds a volume, sorting `scans` ascending by elevation angle per the
    /// `PolarVolume` invariant.
    pub fn new(lat_rad: f64, lon_rad: f64, alt_m: f64, mut scans: Vec<Scan>) -> Self {
        scans.sort_by(|a, b| a.elevation_rad.partial_cmp(&b.elevation_rad).unwrap());
        Self {
            lat_rad,
            lon_rad,
            alt_m,
            scans,
            time: None,
            date: None,
            source: None,
        }
    }
}

impl PolarVolume for Volume {
    fn site(&self) -> (f64, f64, f64) {
        (self.lat_rad, self.lon_rad, self.alt_m)
    }
    fn scan_count(&self) -> usize {
        self.scans.len()
    }
    fn scan(&self, i: usize) -> &dyn PolarScan {
        &self.scans[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(elevation_deg: f64) -> Scan {
        Scan {
            elevation_rad: elevation_deg.to_radians(),
            range_step_m: 500.0,
            range_start_m: 0.0,
            data: vec![vec![10.0, 20.0, 30.0]; 4],
            gain: 0.5,
            offset: -20.0,
            nodata_raw: 255.0,
            undetect_raw: 0.0,
            quality_fields: HashMap::new(),
        }
    }

    #[test]
    fn volume_sorts_scans_ascending() {
        let vol = Volume::new(0.0, 0.0, 0.0, vec![scan(1.5), scan(0.5), scan(1.0)]);
        let elevations: Vec<f64> = (0..vol.scan_count())
            .map(|i| vol.scan(i).elevation_rad())
            .collect();
        assert!(elevations.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn scan_value_applies_gain_offset() {
        let s = scan(0.5);
        assert_eq!(s.value(0, 0), Some(10.0 * 0.5 - 20.0));
        assert_eq!(s.value(0, 99), None);
    }
}
