//! 批处理结果.

use mr_cmap::batch::{BatchReport, SubjectOutcome};
use std::io::{self, Write};

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
fn sep_to<W: Write>(w: &mut W) -> io::Result<()> {
    writeln!(w, "{SEP}")
}

/// 将 `report` 的结果写进 `w` 中.
fn describe_into<W: Write>(report: &BatchReport, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    sep_to(w)?;
    writeln!(w, "Constraint maps:")?;
    writeln!(w, "{S4}Subjects: {}", report.outcomes().len())?;
    writeln!(w, "{S4}Succeeded: {}", report.succeeded())?;
    writeln!(w, "{S4}Failed: {}", report.failed())?;
    for o in report.outcomes() {
        if let SubjectOutcome::Success { .. } = o {
            writeln!(w, "{S4}{o}")?;
        }
    }
    if !report.is_clean() {
        sep_to(w)?;
        writeln!(w, "Failures:")?;
        for o in report.failures() {
            writeln!(w, "{S4}{o}")?;
        }
    }
    sep_to(w)
}

/// 分析运行结果.
pub fn analyze(report: &BatchReport) {
    let mut buf = Vec::with_capacity(512);
    // 写入 Vec 不会失败.
    describe_into(report, &mut buf).unwrap();
    print!("{}", String::from_utf8_lossy(&buf));
}
