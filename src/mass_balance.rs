//! Mass-balance closure over oil-fate run output.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::TraceError;
use crate::schema::{mass_balance as col, output};
use crate::taxonomy::OilType;

/// End-of-run rows dropped from every run.
pub const TAIL_ROWS: usize = 4;

/// Rows after the initialization row below which a run is unusable: the
/// dropped tail plus two, so a second trimmed row exists.
pub const MIN_USABLE_ROWS: usize = TAIL_ROWS + 2;

/// One time step of a run's mass-balance output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassBalanceRecord {
    pub vol_oil_beached: f64,
    pub density: f64,
    pub v_water_content: f64,
    pub m_water_content: f64,
    pub m_evaporated: f64,
    pub m_dispersed: f64,
    pub m_dissolved: f64,
    pub m_bio: f64,
    pub mass_oil: f64,
}

impl MassBalanceRecord {
    /// Beached oil mass with the emulsion water removed.
    pub fn beached_mass(&self) -> f64 {
        self.vol_oil_beached * self.density / (1.0 - self.v_water_content)
            * (1.0 - self.m_water_content)
    }

    pub fn closure(&self) -> ClosureDiagnostic {
        ClosureDiagnostic::from_components(
            self.m_evaporated,
            self.m_dispersed,
            self.m_dissolved,
            self.m_bio,
            self.mass_oil,
            self.beached_mass(),
        )
    }
}

/// `MInitial`, `MBeached` and `MInitial - MassOil`. The residual is
/// reported as is, never forced to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosureDiagnostic {
    pub m_initial: f64,
    pub m_beached: f64,
    pub mass_lost: f64,
}

impl ClosureDiagnostic {
    pub fn from_components(
        evaporated: f64,
        dispersed: f64,
        dissolved: f64,
        bio: f64,
        mass_oil: f64,
        beached: f64,
    ) -> Self {
        let m_initial = evaporated + dispersed + dissolved + bio + mass_oil + beached;
        Self {
            m_initial,
            m_beached: beached,
            mass_lost: m_initial - mass_oil,
        }
    }
}

/// One run's parsed time series.
#[derive(Debug, Clone)]
pub struct MassBalanceRun {
    pub run_id: String,
    rows: Vec<MassBalanceRecord>,
}

impl MassBalanceRun {
    pub fn from_rows(run_id: impl Into<String>, rows: Vec<MassBalanceRecord>) -> Self {
        Self {
            run_id: run_id.into(),
            rows,
        }
    }

    pub fn load(path: &Path, header_lines: usize) -> Result<Self, TraceError> {
        let text = fs::read_to_string(path)?;
        Self::parse(path.display().to_string(), &text, header_lines)
    }

    /// Whitespace-delimited table after `header_lines` preamble lines.
    ///
    /// Blank lines are skipped. Cells that do not parse as numbers are NaN,
    /// and rows shorter than the header are padded with NaN.
    pub fn parse(run_id: impl Into<String>, text: &str, header_lines: usize) -> Result<Self, TraceError> {
        let run_id = run_id.into();
        let mut lines = text
            .lines()
            .skip(header_lines)
            .filter(|l| !l.trim().is_empty());

        let header: Vec<&str> = lines
            .next()
            .ok_or_else(|| TraceError::InvalidData(format!("{run_id}: no header row")))?
            .split_whitespace()
            .collect();
        let position = |name: &str| {
            header
                .iter()
                .position(|h| *h == name)
                .ok_or_else(|| TraceError::MissingColumn(format!("{name} in {run_id}")))
        };
        let idx: Vec<usize> = col::REQUIRED
            .iter()
            .map(|&name| position(name))
            .collect::<Result<_, _>>()?;

        let rows = lines
            .map(|line| {
                let cells: Vec<&str> = line.split_whitespace().collect();
                let value = |i: usize| {
                    cells
                        .get(idx[i])
                        .and_then(|c| c.parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                };
                MassBalanceRecord {
                    vol_oil_beached: value(0),
                    density: value(1),
                    v_water_content: value(2),
                    m_water_content: value(3),
                    m_evaporated: value(4),
                    m_dispersed: value(5),
                    m_dissolved: value(6),
                    m_bio: value(7),
                    mass_oil: value(8),
                }
            })
            .collect();

        Ok(Self { run_id, rows })
    }

    pub fn rows(&self) -> &[MassBalanceRecord] {
        &self.rows
    }

    /// Rows left after dropping the initialization row and, when more than
    /// [`TAIL_ROWS`] remain, the end-of-run rows.
    pub fn trimmed(&self) -> &[MassBalanceRecord] {
        let body = self.rows.get(1..).unwrap_or(&[]);
        if body.len() > TAIL_ROWS {
            &body[..body.len() - TAIL_ROWS]
        } else {
            body
        }
    }

    /// The second trimmed row. `None` for malformed runs.
    pub fn representative(&self) -> Option<&MassBalanceRecord> {
        if self.rows.len().saturating_sub(1) < MIN_USABLE_ROWS {
            return None;
        }
        self.trimmed().get(1)
    }

    pub fn closure(&self) -> Option<ClosureDiagnostic> {
        self.representative().map(MassBalanceRecord::closure)
    }
}

/// Closure diagnostics per oil type, keyed by run id.
#[derive(Debug, Clone, Default)]
pub struct ClosureTables {
    tables: BTreeMap<OilType, BTreeMap<String, ClosureDiagnostic>>,
    excluded: Vec<String>,
}

impl ClosureTables {
    pub fn get(&self, oil: OilType) -> Option<&BTreeMap<String, ClosureDiagnostic>> {
        self.tables.get(&oil)
    }

    pub fn iter(&self) -> impl Iterator<Item = (OilType, &BTreeMap<String, ClosureDiagnostic>)> {
        self.tables.iter().map(|(oil, runs)| (*oil, runs))
    }

    /// Runs left out as malformed.
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    pub fn to_frames(&self) -> Result<BTreeMap<OilType, DataFrame>, TraceError> {
        self.tables
            .iter()
            .map(|(oil, runs)| Ok((*oil, closure_frame(runs)?)))
            .collect()
    }
}

pub fn closure_frame(runs: &BTreeMap<String, ClosureDiagnostic>) -> Result<DataFrame, TraceError> {
    let ids: Vec<&str> = runs.keys().map(String::as_str).collect();
    let initial: Vec<f64> = runs.values().map(|d| d.m_initial).collect();
    let beached: Vec<f64> = runs.values().map(|d| d.m_beached).collect();
    let lost: Vec<f64> = runs.values().map(|d| d.mass_lost).collect();
    Ok(DataFrame::new(vec![
        Column::new(output::RUN_ID.into(), &ids),
        Column::new(output::M_INITIAL.into(), &initial),
        Column::new(output::M_BEACHED.into(), &beached),
        Column::new(output::MASS_LOST.into(), &lost),
    ])?)
}

/// Run list: oil key (short code, label, or Lagrangian file name) to run
/// file paths. Relative paths resolve against the manifest's directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RunManifest {
    runs: BTreeMap<String, Vec<PathBuf>>,
}

impl RunManifest {
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let text = fs::read_to_string(path)?;
        let mut manifest: RunManifest = serde_yml::from_str(&text)?;
        if let Some(dir) = path.parent() {
            for paths in manifest.runs.values_mut() {
                for p in paths.iter_mut() {
                    if p.is_relative() {
                        *p = dir.join(&*p);
                    }
                }
            }
        }
        Ok(manifest)
    }

    /// `(oil, path)` pairs; unknown oil keys are an error.
    pub fn entries(&self) -> Result<Vec<(OilType, PathBuf)>, TraceError> {
        let mut out = Vec::new();
        for (key, paths) in &self.runs {
            let oil: OilType = key.parse()?;
            out.extend(paths.iter().map(|p| (oil, p.clone())));
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MassBalanceAggregator {
    header_lines: usize,
}

impl Default for MassBalanceAggregator {
    fn default() -> Self {
        Self { header_lines: 4 }
    }
}

impl MassBalanceAggregator {
    pub fn new(header_lines: usize) -> Self {
        Self { header_lines }
    }

    /// Group closure diagnostics by oil type. Malformed runs are skipped
    /// with a warning; unreadable files are errors.
    pub fn aggregate<I>(&self, runs: I) -> Result<ClosureTables, TraceError>
    where
        I: IntoIterator<Item = (OilType, PathBuf)>,
    {
        let mut tables = ClosureTables::default();
        for (oil, path) in runs {
            let run = MassBalanceRun::load(&path, self.header_lines)?;
            tables.add(oil, &run);
        }
        info!(
            oils = tables.tables.len(),
            excluded = tables.excluded.len(),
            "mass balance aggregated"
        );
        Ok(tables)
    }

    pub fn aggregate_runs<'a, I>(&self, runs: I) -> ClosureTables
    where
        I: IntoIterator<Item = (OilType, &'a MassBalanceRun)>,
    {
        let mut tables = ClosureTables::default();
        for (oil, run) in runs {
            tables.add(oil, run);
        }
        tables
    }

    pub fn aggregate_manifest(&self, manifest: &Path) -> Result<ClosureTables, TraceError> {
        let entries = RunManifest::load(manifest)?.entries()?;
        self.aggregate(entries)
    }
}

impl ClosureTables {
    fn add(&mut self, oil: OilType, run: &MassBalanceRun) {
        match run.closure() {
            Some(diag) => {
                self.tables
                    .entry(oil)
                    .or_default()
                    .insert(run.run_id.clone(), diag);
            }
            None => {
                warn!(run = %run.run_id, rows = run.rows().len(), "malformed mass-balance run excluded");
                self.excluded.push(run.run_id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const HEADER: &str = "VolOilBeached Density VWaterContent MWaterContent MEvaporated MDispersed MDissolved MBio MassOil";

    fn run_text(rows: usize) -> String {
        let mut text = String::from("SERIE\nMODEL\nRUN\n\n");
        text.push_str(HEADER);
        text.push('\n');
        text.push_str("<BeginTimeSerie>\n");
        for i in 0..rows {
            text.push_str(&format!("{} 900 0.5 0.5 10 5 2 1 70\n", i));
        }
        text.push_str("<EndTimeSerie>\n");
        text
    }

    #[test]
    fn closure_residual_is_mass_lost() {
        let diag = ClosureDiagnostic::from_components(10.0, 5.0, 2.0, 1.0, 70.0, 12.0);
        assert_relative_eq!(diag.m_initial, 100.0);
        assert_relative_eq!(diag.mass_lost, 30.0);
        assert_relative_eq!(diag.m_beached, 12.0);
    }

    #[test]
    fn beached_mass_removes_water() {
        let record = MassBalanceRecord {
            vol_oil_beached: 2.0,
            density: 900.0,
            v_water_content: 0.5,
            m_water_content: 0.25,
            ..Default::default()
        };
        assert_relative_eq!(record.beached_mass(), 2.0 * 900.0 / 0.5 * 0.75);
    }

    #[test]
    fn parse_trims_marker_rows() {
        let run = MassBalanceRun::parse("r1", &run_text(6), 4).unwrap();
        // marker rows become NaN rows
        assert_eq!(run.rows().len(), 8);
        assert!(run.rows()[0].mass_oil.is_nan());
        assert_eq!(run.trimmed().len(), 3);
        assert_eq!(run.representative().unwrap().vol_oil_beached, 1.0);

        let diag = run.closure().unwrap();
        assert_relative_eq!(diag.m_beached, 1.0 * 900.0 / 0.5 * 0.5);
        assert_relative_eq!(diag.mass_lost, diag.m_initial - 70.0);
    }

    #[test]
    fn short_runs_are_malformed() {
        let run = MassBalanceRun::parse("short", &run_text(2), 4).unwrap();
        assert!(run.closure().is_none());

        let tables = MassBalanceAggregator::default().aggregate_runs([(OilType::Diesel, &run)]);
        assert_eq!(tables.excluded(), ["short"]);
        assert!(tables.get(OilType::Diesel).is_none());
    }

    #[test]
    fn usable_threshold_is_tail_plus_two() {
        // run_text(n) has n + 1 rows after the initialization row
        let five = MassBalanceRun::parse("five", &run_text(MIN_USABLE_ROWS - 2), 4).unwrap();
        assert_eq!(five.rows().len() - 1, MIN_USABLE_ROWS - 1);
        assert!(five.representative().is_none());

        let six = MassBalanceRun::parse("six", &run_text(MIN_USABLE_ROWS - 1), 4).unwrap();
        assert_eq!(six.trimmed().len(), 2);
        assert_eq!(six.representative().unwrap().vol_oil_beached, 1.0);
    }

    #[test]
    fn missing_column_is_reported() {
        let text = "a\nb\nc\nd\nVolOilBeached Density\n1 2\n";
        assert!(matches!(
            MassBalanceRun::parse("bad", text, 4),
            Err(TraceError::MissingColumn(_))
        ));
    }

    #[test]
    fn aggregates_manifest_by_oil() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run_a.sro"), run_text(6)).unwrap();
        fs::write(dir.path().join("run_b.sro"), run_text(7)).unwrap();
        fs::write(dir.path().join("run_c.sro"), run_text(1)).unwrap();
        let manifest = dir.path().join("runs.yaml");
        fs::write(
            &manifest,
            "diesel:\n  - run_a.sro\n  - run_c.sro\nLagrangian_akns.dat:\n  - run_b.sro\n",
        )
        .unwrap();

        let tables = MassBalanceAggregator::new(4).aggregate_manifest(&manifest).unwrap();
        assert_eq!(tables.get(OilType::Diesel).unwrap().len(), 1);
        assert_eq!(tables.get(OilType::Ans).unwrap().len(), 1);
        assert_eq!(tables.excluded().len(), 1);

        let frames = tables.to_frames().unwrap();
        assert_eq!(frames[&OilType::Diesel].height(), 1);
        assert_eq!(frames[&OilType::Diesel].width(), 4);
    }
}
