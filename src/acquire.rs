//! Elevation acquisition: batch planning, paced sequential requests, and
//! merge into the project dataset.
//!
//! Acquisition is deliberately confirmation-gated: callers build an
//! [`AcquisitionPlan`] first, show its request count to the user, and only
//! then call [`Acquirer::execute`]. A declined plan has no side effects.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::services;
use crate::coords::SamplePoint;
use crate::dataset::{self, ElevationSample};
use crate::error::Result;
use crate::provider::ElevationProvider;
use crate::usage::UsageLedger;

/// Split `points` into provider-sized batches. Batches never split a point
/// and concatenating them in order reproduces the input.
pub fn plan_batches(points: &[SamplePoint], location_limit: usize) -> Vec<&[SamplePoint]> {
    points.chunks(location_limit).collect()
}

/// A priced acquisition waiting for caller confirmation.
pub struct AcquisitionPlan<'a> {
    pub batches: Vec<&'a [SamplePoint]>,
}

impl<'a> AcquisitionPlan<'a> {
    pub fn new(points: &'a [SamplePoint], location_limit: usize) -> Self {
        Self {
            batches: plan_batches(points, location_limit),
        }
    }

    /// Provider requests this plan will issue.
    pub fn request_count(&self) -> usize {
        self.batches.len()
    }

    pub fn point_count(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }
}

/// Inter-request pacing policy, injectable so tests can run many batches
/// without real delays.
pub trait Pacer {
    /// Called between consecutive requests.
    fn pace(&mut self);
}

/// Fixed delay between requests, the provider rate-limit compliant default.
pub struct FixedDelayPacer {
    pub delay: Duration,
}

impl Default for FixedDelayPacer {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
        }
    }
}

impl Pacer for FixedDelayPacer {
    fn pace(&mut self) {
        std::thread::sleep(self.delay);
    }
}

/// No-op pacer for tests.
pub struct NoPacer;

impl Pacer for NoPacer {
    fn pace(&mut self) {}
}

/// Outcome of one acquisition run.
#[derive(Debug, Default, PartialEq)]
pub struct AcquisitionReport {
    /// Requests issued (failed ones included; they consumed quota).
    pub requests_issued: usize,
    /// Batches whose transport or schema failed; their points are absent
    /// from the output.
    pub failed_batches: usize,
    /// Samples merged into the dataset.
    pub points_received: usize,
    /// Incoming rows whose (lat, lon) already existed in the dataset.
    pub duplicate_rows: usize,
}

pub struct Acquirer<P, T> {
    provider: P,
    pacer: T,
}

impl<P: ElevationProvider, T: Pacer> Acquirer<P, T> {
    pub fn new(provider: P, pacer: T) -> Self {
        Self { provider, pacer }
    }

    pub fn plan<'a>(&self, points: &'a [SamplePoint]) -> AcquisitionPlan<'a> {
        AcquisitionPlan::new(points, self.provider.location_limit())
    }

    /// Run a confirmed plan: fetch every batch sequentially, merge results
    /// into the dataset at `output_path`, and charge the usage ledger once
    /// for the whole run.
    ///
    /// A failed batch is logged and skipped; its points are simply missing
    /// from the output.
    pub fn execute(
        &mut self,
        plan: &AcquisitionPlan<'_>,
        output_path: &Path,
        ledger: &UsageLedger,
    ) -> Result<AcquisitionReport> {
        let mut report = AcquisitionReport::default();
        let mut rows: Vec<ElevationSample> = Vec::with_capacity(plan.point_count());

        for (index, batch) in plan.batches.iter().enumerate() {
            if index > 0 {
                self.pacer.pace();
            }
            report.requests_issued += 1;

            match self.provider.fetch(batch) {
                Ok(results) => {
                    info!(batch = index, points = results.len(), "batch retrieved");
                    for (point, result) in batch.iter().zip(results) {
                        rows.push(ElevationSample {
                            latitude: result.lat,
                            longitude: result.lng,
                            elevation: result.elevation,
                            resolution: result.resolution,
                            x_offset_m: point.x_offset_m,
                            y_offset_m: point.y_offset_m,
                        });
                    }
                }
                Err(err) => {
                    warn!(batch = index, error = %err, "batch failed, points omitted");
                    report.failed_batches += 1;
                }
            }
        }
        report.points_received = rows.len();

        report.duplicate_rows = count_duplicates(output_path, &rows)?;
        if report.duplicate_rows > 0 {
            warn!(
                duplicates = report.duplicate_rows,
                "incoming rows repeat coordinates already in the dataset; \
                 rebuild the dataset if these were re-requested points"
            );
        }

        dataset::append_rows(output_path, &rows)?;
        ledger.add(services::GOOGLE_ELEVATION, report.requests_issued as u64)?;

        info!(
            requests = report.requests_issued,
            points = report.points_received,
            failed = report.failed_batches,
            "acquisition complete"
        );
        Ok(report)
    }
}

/// How many of `rows` repeat a (lat, lon) pair already present at `path`.
fn count_duplicates(path: &Path, rows: &[ElevationSample]) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let existing: HashSet<(u64, u64)> = dataset::read_dataset(path)?
        .iter()
        .map(|s| (s.latitude.to_bits(), s.longitude.to_bits()))
        .collect();
    Ok(rows
        .iter()
        .filter(|r| existing.contains(&(r.latitude.to_bits(), r.longitude.to_bits())))
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppPaths;
    use crate::error::TerrainError;
    use crate::provider::ProviderPoint;
    use std::cell::RefCell;

    fn points(n: usize) -> Vec<SamplePoint> {
        (0..n)
            .map(|i| SamplePoint {
                lat: 35.0 + i as f64 * 1e-4,
                lon: -82.0,
                x_offset_m: 0.0,
                y_offset_m: i as f64 * 5.0,
            })
            .collect()
    }

    /// Provider that answers from a ramp and can fail chosen batches.
    struct FakeProvider {
        limit: usize,
        fail_batches: Vec<usize>,
        calls: RefCell<usize>,
    }

    impl FakeProvider {
        fn new(limit: usize) -> Self {
            Self {
                limit,
                fail_batches: Vec::new(),
                calls: RefCell::new(0),
            }
        }
    }

    impl ElevationProvider for FakeProvider {
        fn fetch(&self, batch: &[SamplePoint]) -> Result<Vec<ProviderPoint>> {
            let call = *self.calls.borrow();
            *self.calls.borrow_mut() += 1;
            if self.fail_batches.contains(&call) {
                return Err(TerrainError::InvalidProviderResponse("boom".to_string()));
            }
            Ok(batch
                .iter()
                .map(|p| ProviderPoint {
                    lat: p.lat,
                    lng: p.lon,
                    elevation: 100.0 + p.y_offset_m,
                    resolution: 9.54,
                })
                .collect())
        }

        fn location_limit(&self) -> usize {
            self.limit
        }
    }

    #[test]
    fn test_batch_split_600_over_250() {
        let pts = points(600);
        let batches = plan_batches(&pts, 250);
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, [250, 250, 100]);

        // Concatenation reproduces the input in order.
        let rejoined: Vec<SamplePoint> = batches.concat();
        assert_eq!(rejoined, pts);
    }

    #[test]
    fn test_no_batch_exceeds_limit() {
        for n in [1, 249, 250, 251, 600, 1000] {
            let pts = points(n);
            for batch in plan_batches(&pts, 250) {
                assert!(batch.len() <= 250);
            }
        }
    }

    #[test]
    fn test_execute_merges_and_charges_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("Elevation.csv");
        let ledger = UsageLedger::new(&AppPaths::new(dir.path()));

        let pts = points(600);
        let mut acquirer = Acquirer::new(FakeProvider::new(250), NoPacer);
        let plan = acquirer.plan(&pts);
        assert_eq!(plan.request_count(), 3);
        assert_eq!(plan.point_count(), 600);

        let report = acquirer.execute(&plan, &csv, &ledger).unwrap();
        assert_eq!(report.requests_issued, 3);
        assert_eq!(report.failed_batches, 0);
        assert_eq!(report.points_received, 600);

        assert_eq!(dataset::read_dataset(&csv).unwrap().len(), 600);
        // One ledger charge for the whole run, counting requests not points.
        assert_eq!(ledger.get(services::GOOGLE_ELEVATION).unwrap(), 3);
    }

    #[test]
    fn test_failed_batch_is_omitted_but_charged() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("Elevation.csv");
        let ledger = UsageLedger::new(&AppPaths::new(dir.path()));

        let pts = points(600);
        let mut provider = FakeProvider::new(250);
        provider.fail_batches = vec![1];
        let mut acquirer = Acquirer::new(provider, NoPacer);
        let plan = acquirer.plan(&pts);

        let report = acquirer.execute(&plan, &csv, &ledger).unwrap();
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.points_received, 350);
        assert_eq!(dataset::read_dataset(&csv).unwrap().len(), 350);
        assert_eq!(ledger.get(services::GOOGLE_ELEVATION).unwrap(), 3);
    }

    #[test]
    fn test_rerun_appends_and_counts_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("Elevation.csv");
        let ledger = UsageLedger::new(&AppPaths::new(dir.path()));

        let pts = points(10);
        let mut acquirer = Acquirer::new(FakeProvider::new(250), NoPacer);

        let plan = acquirer.plan(&pts);
        acquirer.execute(&plan, &csv, &ledger).unwrap();
        let first = std::fs::read_to_string(&csv).unwrap();

        let plan = acquirer.plan(&pts);
        let report = acquirer.execute(&plan, &csv, &ledger).unwrap();
        assert_eq!(report.duplicate_rows, 10);

        // Prior bytes preserved, duplicates appended rather than dropped.
        let second = std::fs::read_to_string(&csv).unwrap();
        assert!(second.starts_with(&first));
        assert_eq!(dataset::read_dataset(&csv).unwrap().len(), 20);
    }
}
