//! Memoization contract for expensive PSF computation
//!
//! The application shell keys cached PSFs (and whatever display asset it
//! derives from them) by prescription. Keys match under the
//! prescription's approximate equality, never bit-exact float
//! comparison, so a slider wiggling in the last decimal does not trigger
//! a recompute. The catalog is handed to the pipeline entry points as a
//! plain collaborator reference; there is no global instance.

use crate::image::Frame;
use crate::prescription::Prescription;
use crate::psf::Psf;

/// One memoized prescription with its PSF and derived display asset
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub prescription: Prescription,
    pub psf: Psf,
    /// Shell-derived asset, e.g. the pre-corrected frame or a PSF preview
    pub asset: Option<Frame>,
}

/// Lookup/insert contract the core expects from the shell's PSF store
///
/// Storage policy (eviction, persistence) is entirely the implementer's
/// business.
pub trait PsfCatalog {
    fn lookup(&self, prescription: &Prescription) -> Option<&CatalogEntry>;
    fn upsert(&mut self, prescription: Prescription, psf: Psf, asset: Option<Frame>);
}

/// In-memory catalog
///
/// A linear scan with [`Prescription::approx_eq`] keeps the tolerance
/// semantics exact; the catalog holds a handful of entries per user, so
/// hashing buys nothing here and a quantized float key would misbehave
/// at bin boundaries.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: Vec<CatalogEntry>,
}
impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
impl PsfCatalog for MemoryCatalog {
    fn lookup(&self, prescription: &Prescription) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.prescription.approx_eq(prescription))
    }
    fn upsert(&mut self, prescription: Prescription, psf: Psf, asset: Option<Frame>) {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.prescription.approx_eq(&prescription))
        {
            Some(entry) => {
                entry.psf = psf;
                entry.asset = asset;
            }
            None => self.entries.push(CatalogEntry {
                prescription,
                psf,
                asset,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psf_for(rx: &Prescription) -> Psf {
        Psf::generate(rx, 16, 575f64, 1f64).unwrap()
    }

    #[test]
    fn lookup_tolerates_field_jitter() {
        let mut catalog = MemoryCatalog::new();
        let rx = Prescription::new(-2.25, -0.75, 30f64);
        catalog.upsert(rx.clone(), psf_for(&rx), None);

        let jittered = Prescription::new(-2.25 + 4e-7, -0.75 - 4e-7, 30f64 + 4e-7);
        assert!(catalog.lookup(&jittered).is_some());
        assert!(catalog
            .lookup(&Prescription::new(-2.25, -0.5, 30f64))
            .is_none());
    }
    #[test]
    fn upsert_replaces_matching_entry() {
        let mut catalog = MemoryCatalog::new();
        let rx = Prescription::new(-1f64, 0f64, 0f64);
        catalog.upsert(rx.clone(), psf_for(&rx), None);
        catalog.upsert(
            Prescription::new(-1f64 + 1e-8, 0f64, 0f64),
            psf_for(&rx),
            None,
        );
        assert_eq!(catalog.len(), 1);

        let other = Prescription::new(-3f64, 0f64, 0f64);
        catalog.upsert(other.clone(), psf_for(&other), None);
        assert_eq!(catalog.len(), 2);
    }
}
