use crate::odim::SourceIdError;
use crate::site::SiteError;
use thiserror::Error;

/// Top-level error for the compositing core.
///
/// Per-pixel numeric failures (NaN geometry, out-of-range bin/ray indices,
/// missing quality fields) are never surfaced through this type: they are
/// absorbed locally into a nodata write, as `spec.md` §7 requires. Only
/// configuration-time failures reach the caller.
#[derive(Error, Debug)]
pub enum CompositeError {
    /// A required field was missing or unusable before any pixel was written:
    /// no sources, no parameters, a zero gain, a product-specific parameter
    /// absent (e.g. CAPPI without a height), or mismatched Cartesian grids.
    #[error("invalid composite configuration: {0}")]
    InvalidConfig(String),

    /// Surfaced by a boundary collaborator (e.g. ODIM-HDF5 I/O), never raised
    /// by the core itself.
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// A site coordinate computation failed outside the geometry's domain.
    #[error("{0}")]
    Site(#[from] SiteError),

    /// A `source` attribute string could not be parsed or extracted.
    #[error("{0}")]
    SourceId(#[from] SourceIdError),
}
