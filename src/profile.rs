//! The `VerticalProfile` read-only external collaborator (`spec.md` §6):
//! named fields used by CAPPI logic when a vertical profile is available for
//! a source, accessed by name rather than by a fixed struct layout.

/// The well-known field names a vertical profile may carry, per `spec.md`
/// §6. Generic fields (indexed by `what/quantity`) are looked up by name
/// directly via [`VerticalProfile::field`] without going through this enum.
pub const KNOWN_FIELDS: &[&str] = &[
    "FF", "FFDev", "W", "WDev", "DD", "DDDev", "Div", "DivDev", "Def", "DefDev", "AD", "ADDev",
    "DBZ", "DBZDev", "HGHT", "n", "UWND", "VWND",
];

/// A read-only vertical profile: named scalar fields at a sequence of
/// heights. Exposed as an external collaborator per the profile's own field
/// accessors, for callers that want to consult one alongside a composite
/// (e.g. to sanity-check a CAPPI height against the echo profile at a site).
/// The composite core does not read from this trait itself — no generator
/// in this crate takes a `VerticalProfile` — so it carries no elevation-
/// selection behavior of its own. The core never mutates a profile and
/// never requires one.
pub trait VerticalProfile {
    /// The field's values at this profile's height levels, or `None` if the
    /// profile does not carry that field.
    fn field(&self, name: &str) -> Option<&[f64]>;

    /// The height levels, meters, that `field` values are indexed against.
    fn heights(&self) -> &[f64];
}
