use std::io::{self, Write};

use recsync_engine::{BatchPlan, Report};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Summary table with optional colors.
    #[default]
    Human,
    /// A single JSON document for machine consumption.
    Json,
}

/// Color handling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorChoice {
    /// Automatically detect TTY and enable colors if appropriate.
    #[default]
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

impl ColorChoice {
    pub fn parse(when: &str) -> Self {
        match when {
            "always" => ColorChoice::Always,
            "never" => ColorChoice::Never,
            _ => ColorChoice::Auto,
        }
    }
}

/// Configuration for printing run results.
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub format: OutputFormat,
    pub color: ColorChoice,
    /// Maximum number of failure rows to print.
    pub max_failures: usize,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Human,
            color: ColorChoice::Auto,
            max_failures: 20,
        }
    }
}

/// Renders the outcome of a run (or a dry-run plan).
pub trait ReportPrinter {
    fn print_plan(&mut self, plan: &BatchPlan) -> io::Result<()>;

    fn print_report(&mut self, report: &Report) -> io::Result<()>;
}

/// Human-readable printer with optional color support.
pub struct HumanPrinter<W: Write, E: Write> {
    out: W,
    err: E,
    cfg: PrinterConfig,
    use_color: bool,
}

impl<W: Write, E: Write> HumanPrinter<W, E> {
    /// Generic writers are never treated as terminals, so `Auto` means no color.
    #[cfg(test)]
    pub fn new(out: W, err: E, cfg: PrinterConfig) -> Self {
        let use_color = cfg.color == ColorChoice::Always;
        Self {
            out,
            err,
            cfg,
            use_color,
        }
    }

    /// Create a printer that writes to stdout and stderr with TTY detection.
    pub fn stdout(cfg: PrinterConfig) -> HumanPrinter<io::Stdout, io::Stderr> {
        use std::io::IsTerminal;

        let use_color = match cfg.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        };

        HumanPrinter {
            out: io::stdout(),
            err: io::stderr(),
            cfg,
            use_color,
        }
    }

    #[inline]
    fn paint(&self, code: &str, text: impl std::fmt::Display) -> String {
        if self.use_color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl<W: Write, E: Write> ReportPrinter for HumanPrinter<W, E> {
    fn print_plan(&mut self, plan: &BatchPlan) -> io::Result<()> {
        writeln!(
            self.out,
            "dry run: {} records in {} batches, nothing sent",
            plan.records,
            plan.batches()
        )?;
        for (index, size) in plan.batch_sizes.iter().enumerate() {
            writeln!(self.out, "  batch {index:>5}  {size:>6} records")?;
        }
        Ok(())
    }

    fn print_report(&mut self, report: &Report) -> io::Result<()> {
        let succeeded = self.paint("32", report.succeeded);
        let failed = if report.failed > 0 {
            self.paint("31", report.failed)
        } else {
            report.failed.to_string()
        };

        writeln!(
            self.out,
            "{} records in {} batches: {succeeded} succeeded, {failed} failed",
            report.total_records, report.batches
        )?;
        if report.retried > 0 {
            writeln!(self.out, "  {} records needed a retry", report.retried)?;
        }
        let cancelled = report.cancelled();
        if cancelled > 0 {
            writeln!(self.out, "  {cancelled} records cancelled before sending")?;
        }

        if !report.failures.is_empty() {
            writeln!(self.out)?;
            writeln!(self.out, "{:>8}  {:>6}  REASON", "RECORD", "BATCH")?;
            writeln!(self.out, "{}", "-".repeat(72))?;

            for failure in report.failures.iter().take(self.cfg.max_failures) {
                writeln!(
                    self.out,
                    "{:>8}  {:>6}  {}",
                    failure.sequence_index, failure.batch_index, failure.reason
                )?;
            }

            let hidden = report.failures.len().saturating_sub(self.cfg.max_failures);
            if hidden > 0 {
                writeln!(
                    self.out,
                    "... and {hidden} more failures, use --max-failures to show more"
                )?;
            }
        }

        writeln!(
            self.err,
            "\n[sync] {} attempts in {}ms",
            report.attempts, report.elapsed_ms
        )
    }
}

/// Writes one JSON document per call.
pub struct JsonPrinter<W: Write> {
    out: W,
    cfg: PrinterConfig,
}

impl<W: Write> JsonPrinter<W> {
    #[cfg(test)]
    pub fn new(out: W, cfg: PrinterConfig) -> Self {
        Self { out, cfg }
    }

    pub fn stdout(cfg: PrinterConfig) -> JsonPrinter<io::Stdout> {
        JsonPrinter {
            out: io::stdout(),
            cfg,
        }
    }
}

impl<W: Write> ReportPrinter for JsonPrinter<W> {
    fn print_plan(&mut self, plan: &BatchPlan) -> io::Result<()> {
        let obj = serde_json::json!({
            "type": "plan",
            "records": plan.records,
            "batches": plan.batches(),
            "batch_sizes": plan.batch_sizes,
        });
        writeln!(self.out, "{obj}")
    }

    fn print_report(&mut self, report: &Report) -> io::Result<()> {
        let truncated = report.failures.len() > self.cfg.max_failures;
        let failures: Vec<_> = report
            .failures
            .iter()
            .take(self.cfg.max_failures)
            .collect();

        let obj = serde_json::json!({
            "type": "report",
            "total_records": report.total_records,
            "succeeded": report.succeeded,
            "failed": report.failed,
            "retried": report.retried,
            "cancelled": report.cancelled(),
            "batches": report.batches,
            "attempts": report.attempts,
            "elapsed_ms": report.elapsed_ms,
            "failures": failures,
            "failures_truncated": truncated,
        });
        writeln!(self.out, "{obj}")
    }
}

/// Pick a printer for stdout according to `cfg.format`.
pub fn make_printer(cfg: PrinterConfig) -> Box<dyn ReportPrinter> {
    match cfg.format {
        OutputFormat::Human => Box::new(HumanPrinter::<io::Stdout, io::Stderr>::stdout(cfg)),
        OutputFormat::Json => Box::new(JsonPrinter::<io::Stdout>::stdout(cfg)),
    }
}

#[cfg(test)]
#[path = "printer_tests.rs"]
mod tests;
