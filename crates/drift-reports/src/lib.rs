//! # drift-reports
//!
//! Report writers for the drift DTN simulator. Each report implements the
//! listener traits from `drift-core`, accumulates during the run, and
//! writes one append-only text file named
//! `<Scenario.name>_<ReportClass>.txt` under the configured report
//! directory when `done()` fires.

pub mod community;
pub mod message_stats;
pub mod popularity;
pub mod trajectory;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use drift_core::{Report, Settings, SimError, SimResult};

pub use community::CommunityReport;
pub use message_stats::MessageStatsReport;
pub use popularity::GlobalPopularityReport;
pub use trajectory::NodeTrajectoryReport;

/// Instantiate the reports a scenario file asks for
///
/// Reads `Report.nrofReports` and `Report.reportN` class names; unknown
/// classes are fatal configuration errors.
pub fn from_settings(settings: &Settings, scenario: &str) -> SimResult<Vec<Box<dyn Report>>> {
    let nrof = settings.get_usize_or("Report.nrofReports", 0)?;
    let dir = settings.get_or("Report.reportDir", "reports").to_string();
    let warmup = settings.get_f64_or("Report.warmup", 0.0)?;

    let mut reports: Vec<Box<dyn Report>> = Vec::with_capacity(nrof);
    for i in 1..=nrof {
        let key = format!("Report.report{i}");
        match settings.get(&key)? {
            "MessageStatsReport" => {
                reports.push(Box::new(MessageStatsReport::new(&dir, scenario, warmup)));
            }
            "NodeTrajectoryReport" => {
                let granularity =
                    settings.get_f64_or("NodeTrajectoryReport.granularity", 60.0)?;
                let prefix = settings
                    .raw("NodeTrajectoryReport.groupPrefix")
                    .map(str::to_string);
                reports.push(Box::new(NodeTrajectoryReport::new(
                    &dir,
                    scenario,
                    granularity,
                    prefix,
                )));
            }
            "CommunityReport" => {
                reports.push(Box::new(CommunityReport::new(&dir, scenario)));
            }
            "GlobalPopularityReport" => {
                reports.push(Box::new(GlobalPopularityReport::new(&dir, scenario)));
            }
            other => {
                return Err(SimError::config(
                    key,
                    format!("unknown report class '{other}'"),
                ));
            }
        }
    }
    Ok(reports)
}

/// Path of a report file, creating the report directory if needed
pub(crate) fn report_path(dir: &str, scenario: &str, class: &str) -> PathBuf {
    Path::new(dir).join(format!("{scenario}_{class}.txt"))
}

/// Append report text to its file
pub(crate) fn write_report(path: &Path, contents: &str) -> SimResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_unknown_class_is_fatal() {
        let settings = Settings::parse(
            "Report.nrofReports = 1\nReport.report1 = FlameGraphReport\n",
        )
        .unwrap();
        let err = from_settings(&settings, "s").unwrap_err();
        assert!(err.to_string().contains("FlameGraphReport"));
    }

    #[test]
    fn test_from_settings_builds_all_classes() {
        let settings = Settings::parse(
            "Report.nrofReports = 4\n\
             Report.report1 = MessageStatsReport\n\
             Report.report2 = NodeTrajectoryReport\n\
             Report.report3 = CommunityReport\n\
             Report.report4 = GlobalPopularityReport\n\
             Report.reportDir = out\n",
        )
        .unwrap();
        assert_eq!(from_settings(&settings, "s").unwrap().len(), 4);
    }
}
