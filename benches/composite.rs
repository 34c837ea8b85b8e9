use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, Criterion};
use polar_composite::composite::{Generator, Parameter, Product};
use polar_composite::geometry::{beam_from_eta_h, height_from_eta_beam};
use polar_composite::polar::{Scan, Volume};
use polar_composite::raster::EquirectangularArea;

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("geometry round trip", |b| b.iter(geometry_round_trip));
    c.bench_function("PPI composite 200x200", |b| b.iter(|| ppi_composite(200)));
    c.bench_function("PPI composite 800x800", |b| b.iter(|| ppi_composite(800)));
}

fn geometry_round_trip() {
    for eta_deg in [0, 10, 20, 30, 40, 50, 60] {
        let eta = (eta_deg as f64).to_radians();
        for b in (1_000..250_000).step_by(1_000) {
            let h = height_from_eta_beam(eta, b as f64);
            let _ = beam_from_eta_h(eta, h);
        }
    }
}

fn ppi_composite(pixels: usize) {
    let scan = Scan {
        elevation_rad: 0.5_f64.to_radians(),
        range_step_m: 500.0,
        range_start_m: 0.0,
        data: vec![vec![20.0; 600]; 360],
        gain: 0.5,
        offset: -20.0,
        nodata_raw: 255.0,
        undetect_raw: 0.0,
        quality_fields: HashMap::new(),
    };
    let volume = Volume::new(60.0_f64.to_radians(), 15.0_f64.to_radians(), 0.0, vec![scan]);

    let mut gen = Generator::new();
    gen.set_product(Product::Ppi).unwrap();
    gen.set_elevation_angle(0.5_f64.to_radians()).unwrap();
    gen.add(&volume).unwrap();
    gen.add_parameter(Parameter::new("DBZH", 0.5, -20.0).unwrap()).unwrap();

    let m_per_deg = 111_320.0;
    let half_size_m = 150_000.0;
    let scale_deg = half_size_m * 2.0 / pixels as f64 / m_per_deg;
    let area = EquirectangularArea {
        xsize: pixels,
        ysize: pixels,
        xscale: scale_deg.to_radians(),
        yscale: scale_deg.to_radians(),
        ll_x: (15.0 - half_size_m / m_per_deg).to_radians(),
        ll_y: (60.0 - half_size_m / m_per_deg).to_radians(),
    };

    gen.nearest(&area, &[]).unwrap();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
