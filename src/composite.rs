//! The polar-source composite generator (`spec.md` §4.3): iterates each
//! output pixel, selects the contributing radar(s), samples the volume(s)
//! via [`crate::geometry`] and [`crate::polar`], and writes to a
//! [`crate::raster::Grid`].
//!
//! Grounded on `composite.h`'s `Composite_t` API and the teacher's
//! imperative configure-then-generate shape (add sources, set parameters,
//! call `nearest` once).

use std::f64::consts::TAU;

use chrono::{NaiveDate, NaiveTime};
use log::{debug, trace};
use rayon::prelude::*;

use crate::error::CompositeError;
use crate::geometry::{self, ElevationModel};
use crate::polar::{Field, PolarScan, PolarVolume};
use crate::quality::{self, TaskIndex};
use crate::raster::{Area, CartesianRaster, Grid};
use crate::site::SiteCoordinates;

/// The four composite product types `spec.md` §1/§4.3 defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    /// Plan-Position Indicator: a horizontal sweep at a fixed elevation.
    Ppi,
    /// Constant-Altitude PPI: a horizontal slice at a fixed altitude.
    Cappi,
    /// Pseudo-CAPPI: falls back to the lowest elevation where the CAPPI
    /// altitude is unreachable.
    Pcappi,
    /// Pseudo-MAX: column-maximum beyond a configured range, PCAPPI within.
    Pmax,
}

/// The per-pixel radar-selection rule (`spec.md` §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMethod {
    /// The geographically nearest radar site wins.
    Nearest,
    /// The radar whose lowest usable elevation reaches the lowest altitude
    /// above the pixel's ground wins.
    Height,
}

/// A quantity to composite, with the gain/offset the output band is packed
/// with.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub quantity: String,
    pub gain: f64,
    pub offset: f64,
}

impl Parameter {
    pub fn new(quantity: impl Into<String>, gain: f64, offset: f64) -> Result<Self, CompositeError> {
        if gain == 0.0 {
            return Err(CompositeError::InvalidConfig(
                "parameter gain must not be zero".to_string(),
            ));
        }
        Ok(Self {
            quantity: quantity.into(),
            gain,
            offset,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Configuring,
    Emitted,
}

/// A single source volume, its precomputed site frame, and the elevation
/// model derived from its scans. Built once per `nearest()` call, never
/// mutated afterward.
struct SourceContext<'a> {
    volume: &'a dyn PolarVolume,
    site: SiteCoordinates,
    elevations: ElevationModel,
}

/// Configures and runs a polar-source composite generation. Sources are
/// borrowed for the lifetime of one `nearest()` call; the generator owns its
/// own parameter/source lists and produces a newly allocated [`Grid`] each
/// time it is invoked.
pub struct Generator<'a> {
    product: Option<Product>,
    selection_method: SelectionMethod,
    height: Option<f64>,
    elevation_angle: Option<f64>,
    range_threshold: Option<f64>,
    parameters: Vec<Parameter>,
    sources: Vec<&'a dyn PolarVolume>,
    time: Option<String>,
    date: Option<String>,
    output_nodata: f64,
    output_raw_range: (f64, f64),
    default_beam_width: f64,
    state: State,
}

impl<'a> Default for Generator<'a> {
    fn default() -> Self {
        Self {
            product: None,
            selection_method: SelectionMethod::Nearest,
            height: None,
            elevation_angle: None,
            range_threshold: None,
            parameters: Vec::new(),
            sources: Vec::new(),
            time: None,
            date: None,
            output_nodata: 255.0,
            output_raw_range: (0.0, 254.0),
            default_beam_width: 1.0_f64.to_radians(),
            state: State::Configuring,
        }
    }
}

impl<'a> Generator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_configuring(&self) -> Result<(), CompositeError> {
        if self.state != State::Configuring {
            return Err(CompositeError::InvalidConfig(
                "generator has already emitted; create a new Generator to reconfigure".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add(&mut self, source: &'a dyn PolarVolume) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.sources.push(source);
        Ok(())
    }

    pub fn set_product(&mut self, product: Product) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.product = Some(product);
        Ok(())
    }

    pub fn set_selection_method(&mut self, method: SelectionMethod) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.selection_method = method;
        Ok(())
    }

    pub fn set_height(&mut self, height: f64) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.height = Some(height);
        Ok(())
    }

    pub fn set_elevation_angle(&mut self, angle: f64) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.elevation_angle = Some(angle);
        Ok(())
    }

    pub fn set_range(&mut self, range: f64) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.range_threshold = Some(range);
        Ok(())
    }

    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<(), CompositeError> {
        self.require_configuring()?;
        self.parameters.push(parameter);
        Ok(())
    }

    /// Sets the output's nominal time, ODIM's `HHmmss` format.
    pub fn set_time(&mut self, time: impl Into<String>) -> Result<(), CompositeError> {
        self.require_configuring()?;
        let time = time.into();
        NaiveTime::parse_from_str(&time, "%H%M%S")
            .map_err(|e| CompositeError::InvalidConfig(format!("invalid time {time:?}: {e}")))?;
        self.time = Some(time);
        Ok(())
    }

    /// Sets the output's nominal date, ODIM's `YYYYMMDD` format.
    pub fn set_date(&mut self, date: impl Into<String>) -> Result<(), CompositeError> {
        self.require_configuring()?;
        let date = date.into();
        NaiveDate::parse_from_str(&date, "%Y%m%d")
            .map_err(|e| CompositeError::InvalidConfig(format!("invalid date {date:?}: {e}")))?;
        self.date = Some(date);
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

    fn validate(&self) -> Result<Product, CompositeError> {
        let product = self
            .product
            .ok_or_else(|| CompositeError::InvalidConfig("no product configured".to_string()))?;
        if self.sources.is_empty() {
            return Err(CompositeError::InvalidConfig("no sources added".to_string()));
        }
        if self.parameters.is_empty() {
            return Err(CompositeError::InvalidConfig(
                "no parameters configured".to_string(),
            ));
        }
        match product {
            Product::Ppi if self.elevation_angle.is_none() => {
                return Err(CompositeError::InvalidConfig(
                    "PPI requires an elevation angle".to_string(),
                ))
            }
            Product::Cappi | Product::Pcappi if self.height.is_none() => {
                return Err(CompositeError::InvalidConfig(
                    "CAPPI/PCAPPI requires a height".to_string(),
                ))
            }
            Product::Pmax if self.height.is_none() || self.range_threshold.is_none() => {
                return Err(CompositeError::InvalidConfig(
                    "PMAX requires a height and a range threshold".to_string(),
                ))
            }
            _ => {}
        }
        Ok(product)
    }

    fn build_contexts(&self) -> Result<Vec<SourceContext<'a>>, CompositeError> {
        self.sources
            .iter()
            .map(|&volume| {
                let (lat, lon, _alt) = volume.site();
                let site = SiteCoordinates::origin(lat, lon)?;
                let elevations = ElevationModel::new(
                    self.default_beam_width,
                    (0..volume.scan_count())
                        .map(|i| volume.scan(i).elevation_rad())
                        .collect(),
                );
                Ok(SourceContext {
                    volume,
                    site,
                    elevations,
                })
            })
            .collect()
    }

    /// Generates the composite according to the configured product and
    /// selection method over `area`, sampling the `quality_flags` named
    /// `how/task` identifiers alongside each parameter into additional
    /// quality bands.
    ///
    /// Configuration errors (`spec.md` §7) fail the whole call before any
    /// pixel is written. Per-pixel numeric failures are absorbed into
    /// nodata and never surfaced. Calling `nearest` more than once on the
    /// same (already emitted) generator is idempotent, but further
    /// configuration is rejected once a call has been made.
    pub fn nearest(&mut self, area: &dyn Area, quality_flags: &[String]) -> Result<Grid, CompositeError> {
        let product = self.validate()?;
        self.state = State::Emitted;

        let contexts = self.build_contexts()?;
        debug!(
            "generating {:?} composite from {} source(s) over a {}x{} area",
            product,
            contexts.len(),
            area.xsize(),
            area.ysize()
        );

        let mut grid = Grid::new(area.xsize(), area.ysize(), self.output_nodata);
        for parameter in &self.parameters {
            grid.add_parameter(&parameter.quantity, parameter.gain, parameter.offset);
        }

        let rows: Vec<RowResult> = (0..area.ysize())
            .into_par_iter()
            .map(|y| {
                let mut row = Vec::with_capacity(area.xsize());
                for x in 0..area.xsize() {
                    let (lon, lat) = area.xy_to_lonlat(x, y);
                    let values = sample_pixel(lon, lat, &contexts, product, self);
                    row.push((x, y, values));
                }
                row
            })
            .collect();

        let mut selections: Vec<Vec<Option<PixelSelection>>> =
            vec![vec![None; area.xsize()]; area.ysize()];
        for row in &rows {
            for (x, y, values) in row {
                for (parameter, sample) in self.parameters.iter().zip(values.value_samples.iter()) {
                    grid.select_parameter(&parameter.quantity);
                    match sample {
                        Some(raw) => grid.set_value(*x, *y, *raw),
                        None => grid.set_nodata(*x, *y),
                    }
                }
                selections[*y][*x] = values.selection;
            }
        }

        self.propagate_quality(area, &contexts, quality_flags, &selections, &mut grid);

        Ok(grid)
    }

    /// Propagates the requested `how/task` quality flags into additional
    /// quality bands on `grid`, reusing the exact `(scan, ray, bin)` each
    /// pixel's value sample was drawn from (`selections`, filled in by
    /// [`sample_pixel`] during the value pass) rather than re-deriving
    /// geometry and elevation selection independently. This keeps the
    /// quality band faithful to the value band for every product — notably
    /// PMAX beyond its range threshold, where the value is a vertical
    /// maximum across elevations rather than a single fixed one, and strict
    /// CAPPI, where a value that misses the half-beam-extent check becomes
    /// nodata with no scan selected at all.
    fn propagate_quality(
        &self,
        area: &dyn Area,
        contexts: &[SourceContext],
        quality_flags: &[String],
        selections: &[Vec<Option<PixelSelection>>],
        grid: &mut Grid,
    ) {
        if quality_flags.is_empty() {
            return;
        }
        let task_indexes = build_task_indexes(contexts, quality_flags);

        for task in quality_flags {
            trace!("propagating quality flag {task:?}");
            let mut data = vec![vec![self.output_nodata; area.xsize()]; area.ysize()];
            for y in 0..area.ysize() {
                for x in 0..area.xsize() {
                    let Some(sel) = selections[y][x] else {
                        continue;
                    };
                    if !task_indexes[sel.ctx_idx][sel.scan_idx].has(task) {
                        continue;
                    }
                    let scan = contexts[sel.ctx_idx].volume.scan(sel.scan_idx);
                    data[y][x] = quality::sample_quality(scan, task, sel.ray, sel.bin, 1.0, 0.0, self.output_nodata);
                }
            }
            grid.attach_quality(
                task,
                Box::new(Field {
                    data,
                    gain: 1.0,
                    offset: 0.0,
                }),
            );
        }
    }
}

/// Builds, once per source scan, the index of which requested `how/task`
/// quality flags that scan actually carries — `task_indexes[ctx_idx][scan_idx]`
/// — so the per-pixel quality pass does a map lookup rather than a linear
/// scan or a rebuild per pixel.
fn build_task_indexes(contexts: &[SourceContext], quality_flags: &[String]) -> Vec<Vec<TaskIndex>> {
    contexts
        .iter()
        .map(|ctx| {
            (0..ctx.volume.scan_count())
                .map(|i| TaskIndex::build(ctx.volume.scan(i), quality_flags))
                .collect()
        })
        .collect()
}

/// The per-parameter packed raw sample (or `None` for nodata) at one pixel,
/// plus the source/scan/ray/bin the sample came from (`None` when no source
/// was selected or the sample missed), reused by quality propagation.
struct PixelValues {
    value_samples: Vec<Option<f64>>,
    selection: Option<PixelSelection>,
}

type RowResult = Vec<(usize, usize, PixelValues)>;

/// The source and exact `(scan, ray, bin)` a pixel's value sample was drawn
/// from, so quality propagation (`spec.md` §4.5) can read "the same (ray,
/// bin)" rather than re-deriving it from geometry a second time.
#[derive(Debug, Clone, Copy)]
struct PixelSelection {
    ctx_idx: usize,
    scan_idx: usize,
    ray: usize,
    bin: usize,
}

fn sample_pixel(
    lon: f64,
    lat: f64,
    contexts: &[SourceContext],
    product: Product,
    gen: &Generator,
) -> PixelValues {
    let chosen = select_source(lon, lat, contexts, product, gen);

    let sampled = chosen.and_then(|ctx_idx| {
        sample_selected(&contexts[ctx_idx], lon, lat, product, gen).map(|(phys, scan_idx, ray, bin)| {
            (
                phys,
                PixelSelection {
                    ctx_idx,
                    scan_idx,
                    ray,
                    bin,
                },
            )
        })
    });

    let value_samples = gen
        .parameters
        .iter()
        .map(|parameter| {
            sampled
                .as_ref()
                .map(|(phys, _)| pack(*phys, parameter.gain, parameter.offset, gen.output_raw_range))
        })
        .collect();

    PixelValues {
        value_samples,
        selection: sampled.map(|(_, sel)| sel),
    }
}

fn pack(phys: f64, gain: f64, offset: f64, range: (f64, f64)) -> f64 {
    let raw = ((phys - offset) / gain).round();
    raw.clamp(range.0, range.1)
}

/// Picks the index into `contexts` of the source to use at `(lon, lat)`, or
/// `None` if no source can be selected (empty elevation list everywhere).
fn select_source(
    lon: f64,
    lat: f64,
    contexts: &[SourceContext],
    product: Product,
    gen: &Generator,
) -> Option<usize> {
    if contexts.is_empty() {
        return None;
    }
    match gen.selection_method {
        SelectionMethod::Nearest => select_source_nearest(lon, lat, contexts),
        SelectionMethod::Height => {
            if product == Product::Ppi {
                return select_source_nearest(lon, lat, contexts);
            }
            // The source whose lowest elevation reaches the lowest beam
            // altitude above this pixel's ground wins — not the source
            // whose beam is closest to the configured CAPPI height; this is
            // about which radar gives the best low-level view of the pixel,
            // per `spec.md` §4.3's "choose the source that yields the
            // lowest sampled-beam altitude above the pixel ground".
            contexts
                .iter()
                .enumerate()
                .filter_map(|(i, ctx)| {
                    let lowest_eta = *ctx.elevations.elevation_angles().first()?;
                    let (_, g) = ctx.site.bearing_and_distance(lon, lat);
                    let beta = g / crate::constants::EARTH_RADIUS_43_M;
                    let height = geometry::height_from_eta_beta(lowest_eta, beta);
                    Some((i, height))
                })
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                .map(|(i, _)| i)
        }
    }
}

fn select_source_nearest(lon: f64, lat: f64, contexts: &[SourceContext]) -> Option<usize> {
    contexts
        .iter()
        .enumerate()
        .map(|(i, ctx)| {
            let (_, distance) = ctx.site.bearing_and_distance(lon, lat);
            (i, distance)
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(i, _)| i)
}

fn ray_index(azimuth: f64, nrays: usize) -> usize {
    if nrays == 0 {
        return 0;
    }
    let normalized = azimuth.rem_euclid(TAU);
    ((normalized * nrays as f64 / TAU).floor() as usize) % nrays
}

fn bin_index(slant_range: f64, range_start: f64, range_step: f64) -> Option<usize> {
    if !slant_range.is_finite() || range_step <= 0.0 {
        return None;
    }
    let bin = ((slant_range - range_start) / range_step).floor();
    if bin < 0.0 {
        return None;
    }
    Some(bin as usize)
}

fn indices(azimuth: f64, slant_range: f64, scan: &dyn PolarScan) -> Option<(usize, usize)> {
    let ray = ray_index(azimuth, scan.nrays());
    let bin = bin_index(slant_range, scan.range_start_m(), scan.range_step_m())?;
    if bin >= scan.nbins() {
        return None;
    }
    Some((ray, bin))
}

fn read_value(scan: &dyn PolarScan, ray: usize, bin: usize) -> Option<f64> {
    let raw = scan.raw(ray, bin);
    if scan.is_reserved_raw(raw) {
        return None;
    }
    Some(raw * scan.gain() + scan.offset())
}

/// Samples one source's volume at `(lon, lat)`, returning the physical
/// value (`raw * gain + offset`) together with the exact `(scan_idx, ray,
/// bin)` it was read from, or `None` if the geometry is out-of-domain, the
/// index is out of range, or the sample is a nodata/undetect code. The
/// returned indices are what quality propagation must reuse to satisfy
/// `spec.md` §4.5's "samples the same (ray, bin)".
fn sample_selected(
    ctx: &SourceContext,
    lon: f64,
    lat: f64,
    product: Product,
    gen: &Generator,
) -> Option<(f64, usize, usize, usize)> {
    let (azimuth, ground_distance) = ctx.site.bearing_and_distance(lon, lat);
    let beta = ground_distance / crate::constants::EARTH_RADIUS_43_M;

    match product {
        Product::Ppi => {
            let target_eta = gen.elevation_angle?;
            let scan_idx = nearest_elevation_index(&ctx.elevations, target_eta)?;
            if scan_idx >= ctx.volume.scan_count() {
                return None;
            }
            let scan = ctx.volume.scan(scan_idx);
            let slant_range = geometry::beam_from_eta_beta(scan.elevation_rad(), beta);
            let (ray, bin) = indices(azimuth, slant_range, scan)?;
            read_value(scan, ray, bin).map(|phys| (phys, scan_idx, ray, bin))
        }
        Product::Cappi => sample_height_product(ctx, azimuth, beta, gen.height?, true),
        Product::Pcappi => sample_height_product(ctx, azimuth, beta, gen.height?, false),
        Product::Pmax => {
            let height = gen.height?;
            let threshold = gen.range_threshold?;
            if ground_distance > threshold {
                sample_vertical_max(ctx, azimuth, beta)
            } else {
                sample_height_product(ctx, azimuth, beta, height, false)
            }
        }
    }
}

/// The index of the scan whose elevation is nearest `target`, preferring the
/// lower bracket on a tie, per `ElevationModel::find_closest_elevations`.
fn nearest_elevation_index(model: &ElevationModel, target: f64) -> Option<usize> {
    let (lower, upper) = model.find_closest_elevations(target);
    match (lower, upper) {
        (Some(l), Some(u)) => {
            let angles = model.elevation_angles();
            if (angles[l] - target).abs() <= (angles[u] - target).abs() {
                Some(l)
            } else {
                Some(u)
            }
        }
        (Some(l), None) => Some(l),
        (None, Some(u)) => Some(u),
        (None, None) => None,
    }
}

/// CAPPI/PCAPPI sampling: find the elevation bracket around the elevation
/// that would reach `height` at `beta`, preferring whichever bracket side
/// lands closest to `height`. When `strict` (true CAPPI) and no full bracket
/// exists, use the single available side only if it lands within half the
/// scan's vertical beam extent of `height`; otherwise nodata. When not
/// strict (PCAPPI), an incomplete bracket falls back to whichever single
/// elevation is available on the bracket's open side (pseudo-CAPPI).
fn sample_height_product(
    ctx: &SourceContext,
    azimuth: f64,
    beta: f64,
    height: f64,
    strict: bool,
) -> Option<(f64, usize, usize, usize)> {
    let eta_star = geometry::eta_from_beta_h(beta, height);
    let (lower, upper) = ctx.elevations.find_closest_elevations(eta_star);

    let scan_idx = match (lower, upper) {
        (Some(l), Some(u)) if l == u => Some(l),
        (Some(l), Some(u)) => {
            let angles = ctx.elevations.elevation_angles();
            let h_l = geometry::height_from_eta_beta(angles[l], beta);
            let h_u = geometry::height_from_eta_beta(angles[u], beta);
            if (h_l - height).abs() <= (h_u - height).abs() {
                Some(l)
            } else {
                Some(u)
            }
        }
        (Some(l), None) if strict => within_half_extent(ctx, l, beta, height),
        (None, Some(u)) if strict => within_half_extent(ctx, u, beta, height),
        // Pseudo-CAPPI: no bracket, so fall back to whichever single
        // elevation is available — the highest when the target height is
        // above every scan's reach, the lowest when it is below all of them.
        (Some(l), None) => Some(l),
        (None, Some(u)) => Some(u),
        (None, None) => None,
    }?;

    if scan_idx >= ctx.volume.scan_count() {
        return None;
    }
    let scan = ctx.volume.scan(scan_idx);
    let slant_range = geometry::beam_from_eta_beta(scan.elevation_rad(), beta);
    let (ray, bin) = indices(azimuth, slant_range, scan)?;
    read_value(scan, ray, bin).map(|phys| (phys, scan_idx, ray, bin))
}

fn within_half_extent(ctx: &SourceContext, idx: usize, beta: f64, height: f64) -> Option<usize> {
    let eta = ctx.elevations.elevation_angles()[idx];
    let candidate_height = geometry::height_from_eta_beta(eta, beta);
    let half_width = ctx.elevations.beam_width() / 2.0;
    let h_top = geometry::height_from_eta_beta(eta + half_width, beta);
    let h_bottom = geometry::height_from_eta_beta(eta - half_width, beta);
    let half_extent = (h_top - h_bottom).abs() / 2.0;
    if (candidate_height - height).abs() <= half_extent {
        Some(idx)
    } else {
        None
    }
}

/// PMAX's beyond-threshold branch: the vertical maximum physical value
/// across every elevation at this `beta`, together with the `(scan_idx,
/// ray, bin)` that produced it — whichever elevation's value was the
/// maximum, not a fixed one, since quality propagation must follow the same
/// bin the value itself came from.
fn sample_vertical_max(ctx: &SourceContext, azimuth: f64, beta: f64) -> Option<(f64, usize, usize, usize)> {
    let mut best: Option<(f64, usize, usize, usize)> = None;
    for idx in 0..ctx.elevations.elevation_angles().len() {
        if idx >= ctx.volume.scan_count() {
            continue;
        }
        let scan = ctx.volume.scan(idx);
        let slant_range = geometry::beam_from_eta_beta(scan.elevation_rad(), beta);
        let Some((ray, bin)) = indices(azimuth, slant_range, scan) else {
            continue;
        };
        if let Some(value) = read_value(scan, ray, bin) {
            best = Some(match best {
                Some(b) if b.0 >= value => b,
                _ => (value, idx, ray, bin),
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polar::{Scan, Volume};
    use crate::raster::EquirectangularArea;
    use std::collections::HashMap;

    fn flat_scan(elevation_deg: f64, nrays: usize, nbins: usize, fill: f64) -> Scan {
        Scan {
            elevation_rad: elevation_deg.to_radians(),
            range_step_m: 2000.0,
            range_start_m: 0.0,
            data: vec![vec![fill; nbins]; nrays],
            gain: 1.0,
            offset: 0.0,
            nodata_raw: 255.0,
            undetect_raw: 0.0,
            quality_fields: HashMap::new(),
        }
    }

    fn area_for(site_lat: f64, site_lon: f64, half_size_m: f64, pixels: usize) -> EquirectangularArea {
        // crude degrees-per-meter scale near mid-latitudes, good enough for tests
        let m_per_deg_lat = 111_320.0;
        let scale_deg = half_size_m * 2.0 / pixels as f64 / m_per_deg_lat;
        EquirectangularArea {
            xsize: pixels,
            ysize: pixels,
            xscale: scale_deg.to_radians(),
            yscale: scale_deg.to_radians(),
            ll_x: site_lon.to_radians() - (half_size_m / m_per_deg_lat).to_radians(),
            ll_y: site_lat.to_radians() - (half_size_m / m_per_deg_lat).to_radians(),
        }
    }

    #[test]
    fn rejects_missing_product() {
        let mut gen = Generator::new();
        let area = area_for(60.0, 15.0, 100_000.0, 10);
        assert!(gen.nearest(&area, &[]).is_err());
    }

    #[test]
    fn rejects_no_sources() {
        let mut gen = Generator::new();
        gen.set_product(Product::Ppi).unwrap();
        gen.set_elevation_angle(0.5_f64.to_radians()).unwrap();
        gen.add_parameter(Parameter::new("DBZH", 0.5, -20.0).unwrap()).unwrap();
        let area = area_for(60.0, 15.0, 100_000.0, 10);
        assert!(gen.nearest(&area, &[]).is_err());
    }

    #[test]
    fn ppi_single_site_samples_expected_bin() {
        let scans = vec![
            flat_scan(0.5, 360, 200, 30.0),
            flat_scan(1.0, 360, 200, 40.0),
            flat_scan(1.5, 360, 200, 50.0),
        ];
        let volume = Volume::new(60.0_f64.to_radians(), 15.0_f64.to_radians(), 0.0, scans);

        let mut gen = Generator::new();
        gen.set_product(Product::Ppi).unwrap();
        gen.set_elevation_angle(0.5_f64.to_radians()).unwrap();
        gen.add(&volume).unwrap();
        gen.add_parameter(Parameter::new("DBZH", 1.0, 0.0).unwrap()).unwrap();

        let area = area_for(60.0, 15.0, 100_000.0, 100);
        let grid = gen.nearest(&area, &[]).unwrap();
        let band = grid.band("DBZH").unwrap();
        // At least some pixels near the site should have sampled the 30.0 fill value.
        assert!(band.data.iter().any(|&v| (v - 30.0).abs() < 1e-6));
    }

    #[test]
    fn two_site_nearest_selects_by_distance() {
        let scans_a = vec![flat_scan(0.5, 360, 400, 10.0)];
        let scans_b = vec![flat_scan(0.5, 360, 400, 90.0)];
        let vol_a = Volume::new(60.0_f64.to_radians(), 15.0_f64.to_radians(), 0.0, scans_a);
        let vol_b = Volume::new(60.0_f64.to_radians(), 17.0_f64.to_radians(), 0.0, scans_b);

        let mut gen = Generator::new();
        gen.set_product(Product::Ppi).unwrap();
        gen.set_elevation_angle(0.5_f64.to_radians()).unwrap();
        gen.add(&vol_a).unwrap();
        gen.add(&vol_b).unwrap();
        gen.add_parameter(Parameter::new("DBZH", 1.0, 0.0).unwrap()).unwrap();

        let area = EquirectangularArea {
            xsize: 2,
            ysize: 1,
            xscale: 0.2_f64.to_radians(),
            yscale: 0.2_f64.to_radians(),
            ll_x: 15.85_f64.to_radians(),
            ll_y: 60.0_f64.to_radians(),
        };
        let grid = gen.nearest(&area, &[]).unwrap();
        let band = grid.band("DBZH").unwrap();
        assert!((band.data[0] - 10.0).abs() < 1e-6, "left pixel should pick site A");
        assert!((band.data[1] - 90.0).abs() < 1e-6, "right pixel should pick site B");
    }

    #[test]
    fn setters_fail_after_emission() {
        let scans = vec![flat_scan(0.5, 36, 50, 10.0)];
        let volume = Volume::new(60.0_f64.to_radians(), 15.0_f64.to_radians(), 0.0, scans);
        let mut gen = Generator::new();
        gen.set_product(Product::Ppi).unwrap();
        gen.set_elevation_angle(0.5_f64.to_radians()).unwrap();
        gen.add(&volume).unwrap();
        gen.add_parameter(Parameter::new("DBZH", 1.0, 0.0).unwrap()).unwrap();
        let area = area_for(60.0, 15.0, 20_000.0, 5);
        gen.nearest(&area, &[]).unwrap();
        assert!(gen.add(&volume).is_err());
    }

    #[test]
    fn cappi_falls_back_to_nodata_outside_bracket_and_extent() {
        let scans = vec![flat_scan(5.0, 360, 400, 22.0), flat_scan(10.0, 360, 400, 23.0)];
        let volume = Volume::new(60.0_f64.to_radians(), 15.0_f64.to_radians(), 0.0, scans);

        let mut gen = Generator::new();
        gen.set_product(Product::Cappi).unwrap();
        gen.set_height(50_000.0).unwrap(); // far above what these elevations reach nearby
        gen.add(&volume).unwrap();
        gen.add_parameter(Parameter::new("DBZH", 1.0, 0.0).unwrap()).unwrap();

        let area = area_for(60.0, 15.0, 5_000.0, 3);
        let grid = gen.nearest(&area, &[]).unwrap();
        let band = grid.band("DBZH").unwrap();
        assert!(band.data.iter().all(|&v| v == band.nodata));
    }

    #[test]
    fn set_time_and_date_reject_malformed_strings() {
        let mut gen = Generator::new();
        assert!(gen.set_time("25:99:00").is_err());
        assert!(gen.set_time("120000").is_ok());
        assert!(gen.set_date("not-a-date").is_err());
        assert!(gen.set_date("20240131").is_ok());
    }

    #[test]
    fn pcappi_falls_back_to_highest_elevation_when_target_is_unreachably_high() {
        // Target height (50 km) is far beyond what either elevation reaches
        // at this short range, so the fallback should pick the highest
        // available elevation (closest approach from below), not the lowest.
        let scans = vec![flat_scan(5.0, 360, 400, 22.0), flat_scan(10.0, 360, 400, 23.0)];
        let volume = Volume::new(60.0_f64.to_radians(), 15.0_f64.to_radians(), 0.0, scans);

        let mut gen = Generator::new();
        gen.set_product(Product::Pcappi).unwrap();
        gen.set_height(50_000.0).unwrap();
        gen.add(&volume).unwrap();
        gen.add_parameter(Parameter::new("DBZH", 1.0, 0.0).unwrap()).unwrap();

        let area = area_for(60.0, 15.0, 5_000.0, 3);
        let grid = gen.nearest(&area, &[]).unwrap();
        let band = grid.band("DBZH").unwrap();
        assert!(band.data.iter().any(|&v| (v - 23.0).abs() < 1e-6));
    }
}
