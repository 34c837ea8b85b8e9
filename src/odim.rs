//! Boundary helpers for the ODIM-HDF5 persisted-state format (`spec.md` §6):
//! the `how/*` attribute unit conversions performed on write and inverted on
//! read, and `source` attribute (`KEY:value`) parsing. ODIM-HDF5 I/O itself
//! remains an external collaborator; only this conversion arithmetic and
//! string parsing are core-adjacent enough to belong here, per `SPEC_FULL.md`.

use thiserror::Error;

/// An ODIM specification version, ordered so `version < V2_4` gates the
/// unit-conversion behavior of [`to_internal`]/[`from_internal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OdimVersion(pub u8, pub u8);

impl OdimVersion {
    pub const V2_2: OdimVersion = OdimVersion(2, 2);
    pub const V2_3: OdimVersion = OdimVersion(2, 3);
    pub const V2_4: OdimVersion = OdimVersion(2, 4);
}

/// Converts a scalar `how/*` attribute value from its ODIM file
/// representation to the internal representation this crate uses
/// everywhere else. A no-op for `version < OdimVersion::V2_4`.
///
/// Mirrors `OdimIoUtilities_convertHowAttributeToInternalRave`.
pub fn to_internal(attr_name: &str, version: OdimVersion, value: f64) -> f64 {
    if version < OdimVersion::V2_4 {
        return value;
    }
    match_attr(attr_name, value, |v| v * 1000.0, |v| v / 1000.0, |v| {
        if v > 0.0 {
            10f64.powf((v - 30.0) / 10.0) / 1000.0
        } else {
            v
        }
    })
}

/// Converts a scalar `how/*` attribute value from the internal
/// representation to its ODIM file representation. A no-op for
/// `version < OdimVersion::V2_4`.
///
/// Mirrors `OdimIoUtilities_convertHowAttributeFromInternalRave`.
pub fn from_internal(attr_name: &str, version: OdimVersion, value: f64) -> f64 {
    if version < OdimVersion::V2_4 {
        return value;
    }
    match_attr(attr_name, value, |v| v / 1000.0, |v| v * 1000.0, |v| {
        if v > 0.0 {
            10.0 * (1000.0 * v).log10() + 30.0
        } else {
            v
        }
    })
}

fn match_attr(
    attr_name: &str,
    value: f64,
    gasattn: impl Fn(f64) -> f64,
    range_like: impl Fn(f64) -> f64,
    power: impl Fn(f64) -> f64,
) -> f64 {
    if attr_name.eq_ignore_ascii_case("how/gasattn") {
        gasattn(value)
    } else if attr_name.eq_ignore_ascii_case("how/minrange")
        || attr_name.eq_ignore_ascii_case("how/maxrange")
        || attr_name.eq_ignore_ascii_case("how/melting_layer_top_A")
        || attr_name.eq_ignore_ascii_case("how/melting_layer_bottom_A")
    {
        range_like(value)
    } else if attr_name.eq_ignore_ascii_case("how/nomTXpower")
        || attr_name.eq_ignore_ascii_case("how/peakpwr")
        || attr_name.eq_ignore_ascii_case("how/avgpwr")
    {
        power(value)
    } else {
        value
    }
}

/// Element-wise variant of [`to_internal`]/[`from_internal`] for the
/// `how/TXpower` array attribute.
pub fn to_internal_array(attr_name: &str, version: OdimVersion, values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| to_internal(attr_name, version, v)).collect()
}

pub fn from_internal_array(attr_name: &str, version: OdimVersion, values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| from_internal(attr_name, version, v)).collect()
}

#[derive(Error, Debug)]
pub enum SourceIdError {
    #[error("buffer of {capacity} bytes is too small for {needed} bytes")]
    BufferTooSmall { capacity: usize, needed: usize },
}

/// A parsed view over an ODIM `source` attribute string: comma-separated
/// `KEY:value` tokens (e.g. `"WMO:02954,NOD:sekir,CMT:Kiruna"`).
#[derive(Debug, Clone)]
pub struct SourceId<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> SourceId<'a> {
    pub fn parse(source: &'a str) -> Self {
        let pairs = source
            .split(',')
            .filter_map(|tok| tok.split_once(':'))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();
        Self { pairs }
    }

    /// The value for `key`, or `None` if absent.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    /// Tries `NOD:` first, falling back to `CMT:`.
    pub fn nod_or_cmt(&self) -> Option<&'a str> {
        self.get("NOD").or_else(|| self.get("CMT"))
    }

    /// Writes the value for `key` into `buf`, returning the number of bytes
    /// written, or [`SourceIdError::BufferTooSmall`] if `buf` is not large
    /// enough to hold it.
    pub fn get_into(&self, key: &str, buf: &mut [u8]) -> Result<usize, SourceIdError> {
        let value = self.get(key).unwrap_or("");
        let bytes = value.as_bytes();
        if bytes.len() > buf.len() {
            return Err(SourceIdError::BufferTooSmall {
                capacity: buf.len(),
                needed: bytes.len(),
            });
        }
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }
}
