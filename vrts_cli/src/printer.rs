use chrono::Local;
use vrts_common::{CompareOutcome, ComparisonReport};

const RESET: &str = "\x1b[0m";
const LIGHT_RED: &str = "\x1b[91m";
const LIGHT_YELLOW: &str = "\x1b[93m";
const LIGHT_MAGENTA: &str = "\x1b[95m";
const LIGHT_CYAN: &str = "\x1b[96m";
const WHITE: &str = "\x1b[97m";
const DARK_GRAY: &str = "\x1b[90m";

/// Prints per-file outcomes and progress lines
pub struct Printer {
    use_color: bool,
    report_diffs: bool,
}

impl Printer {
    pub fn new(use_color: bool, report_diffs: bool) -> Self {
        Self {
            use_color,
            report_diffs,
        }
    }

    pub fn result(&self, name: &str, report: &ComparisonReport) {
        if let Some(line) = self.format_result(name, report) {
            println!("{}", line);
        }
    }

    pub fn info(&self, msg: &str) {
        println!("{}", self.format_info(msg));
    }

    /// `None` when the outcome is filtered out by `--report-diffs`
    pub fn format_result(&self, name: &str, report: &ComparisonReport) -> Option<String> {
        if self.report_diffs && !is_reported_diff(report.outcome) {
            return None;
        }

        let mut msg = format!("{}: {}", name, report.outcome.label());
        if let Some(mismatch) = report.mismatch {
            msg.push_str(&format!(" ({} @0x{:x})", mismatch.delta, mismatch.offset));
        }
        if report.inconclusive {
            msg.push_str(" (inconclusive)");
        }

        Some(self.paint(&msg, outcome_color(report.outcome)))
    }

    pub fn format_info(&self, msg: &str) -> String {
        let msg = format!("{} ({})", msg, Local::now().format("%Y-%m-%d %H:%M:%S"));
        self.paint(&msg, DARK_GRAY)
    }

    fn paint(&self, msg: &str, color: &str) -> String {
        if self.use_color {
            format!("{}{}{}", color, msg, RESET)
        } else {
            msg.to_string()
        }
    }
}

fn outcome_color(outcome: CompareOutcome) -> &'static str {
    match outcome {
        CompareOutcome::Same => WHITE,
        CompareOutcome::FuzzySame => LIGHT_CYAN,
        CompareOutcome::NeitherExists => LIGHT_YELLOW,
        CompareOutcome::Diffs => LIGHT_RED,
        CompareOutcome::SizeMismatch => LIGHT_MAGENTA,
        CompareOutcome::MissingFirst => LIGHT_RED,
        CompareOutcome::MissingSecond => WHITE,
    }
}

fn is_reported_diff(outcome: CompareOutcome) -> bool {
    matches!(
        outcome,
        CompareOutcome::Diffs
            | CompareOutcome::SizeMismatch
            | CompareOutcome::MissingFirst
            | CompareOutcome::MissingSecond
    )
}
