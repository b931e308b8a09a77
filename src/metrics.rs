/// Counters for one probe-and-report cycle, logged when the run completes.
/// The run is strictly sequential, so plain fields suffice.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub accounts_probed: u64,
    pub syntax_errors: u64,
    pub login_failures: u64,
    pub records_written: u64,
}

impl RunStats {
    pub fn record_probe(&mut self) {
        self.accounts_probed += 1;
    }

    pub fn record_syntax_error(&mut self) {
        self.syntax_errors += 1;
    }

    pub fn record_login_failure(&mut self) {
        self.login_failures += 1;
    }

    pub fn record_row(&mut self) {
        self.records_written += 1;
    }
}
