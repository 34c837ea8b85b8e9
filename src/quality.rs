//! The quality-flag propagator (`spec.md` §4.5): for each requested
//! `how/task` identifier, samples the matching quality field alongside the
//! value band at the same (ray, bin).
//!
//! Per the design notes' redesign flag, discovery is a one-time index built
//! at the start of `nearest()` rather than a linear scan per pixel.

use indexmap::IndexMap;
use itertools::Itertools;

use crate::polar::PolarScan;

/// Maps a normalized `how/task` string to the index of the matching quality
/// field on one scan, built once per scan.
#[derive(Debug, Default)]
pub struct TaskIndex {
    tasks: IndexMap<String, ()>,
}

impl TaskIndex {
    /// Builds an index over the requested task names that `scan` actually
    /// carries a quality field for. Names not present on `scan` are simply
    /// absent from the index; looking one up yields `None` downstream.
    pub fn build(scan: &dyn PolarScan, requested: &[String]) -> Self {
        let mut tasks = IndexMap::new();
        for task in requested.iter().unique() {
            if scan.quality_field(task).is_some() {
                tasks.insert(task.clone(), ());
            }
        }
        Self { tasks }
    }

    pub fn has(&self, task: &str) -> bool {
        self.tasks.contains_key(task)
    }

    pub fn requested_present(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }
}

/// Samples `scan`'s quality field for `task` at `(ray, bin)`, normalized to
/// `(out_gain, out_offset)`. Returns `out_nodata` if the field is missing or
/// the sample is out of range.
pub fn sample_quality(
    scan: &dyn PolarScan,
    task: &str,
    ray: usize,
    bin: usize,
    out_gain: f64,
    out_offset: f64,
    out_nodata: f64,
) -> f64 {
    let Some(field) = scan.quality_field(task) else {
        return out_nodata;
    };
    if ray >= scan.nrays() || bin >= scan.nbins() {
        return out_nodata;
    }
    let phys = field.value(ray, bin);
    if !phys.is_finite() {
        return out_nodata;
    }
    ((phys - out_offset) / out_gain).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polar::{Field, Scan};
    use std::collections::HashMap;

    fn scan_with_quality() -> Scan {
        let mut fields = HashMap::new();
        fields.insert(
            "se.smhi.detector.beamblockage".to_string(),
            Field {
                data: vec![vec![1.0, 2.0]; 2],
                gain: 1.0,
                offset: 0.0,
            },
        );
        Scan {
            elevation_rad: 0.0,
            range_step_m: 500.0,
            range_start_m: 0.0,
            data: vec![vec![0.0, 0.0]; 2],
            gain: 1.0,
            offset: 0.0,
            nodata_raw: -1.0,
            undetect_raw: -2.0,
            quality_fields: fields,
        }
    }

    #[test]
    fn index_only_keeps_present_tasks() {
        let scan = scan_with_quality();
        let requested = vec![
            "se.smhi.detector.beamblockage".to_string(),
            "pl.imgw.quality.qi".to_string(),
        ];
        let idx = TaskIndex::build(&scan, &requested);
        assert!(idx.has("se.smhi.detector.beamblockage"));
        assert!(!idx.has("pl.imgw.quality.qi"));
    }

    #[test]
    fn sample_quality_normalizes_gain_offset() {
        let scan = scan_with_quality();
        let v = sample_quality(&scan, "se.smhi.detector.beamblockage", 0, 1, 0.5, 0.0, -9999.0);
        assert_eq!(v, (2.0_f64 / 0.5).round());
    }

    #[test]
    fn sample_quality_missing_yields_nodata() {
        let scan = scan_with_quality();
        let v = sample_quality(&scan, "missing", 0, 0, 1.0, 0.0, -9999.0);
        assert_eq!(v, -9999.0);
    }
}
