use std::fmt::Write as _;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Metrics {
    // Catalog
    pub ddl_statements_total: AtomicU64,

    // Bulk loads
    pub copy_statements_total: AtomicU64,
    pub copy_rows_total: AtomicU64,

    // Transforms
    pub transform_statements_total: AtomicU64,
    pub transform_rows_total: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            ddl_statements_total: AtomicU64::new(0),
            copy_statements_total: AtomicU64::new(0),
            copy_rows_total: AtomicU64::new(0),
            transform_statements_total: AtomicU64::new(0),
            transform_rows_total: AtomicU64::new(0),
        }
    }
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::default)
}

pub(crate) fn record_ddl_statement() {
    metrics().ddl_statements_total.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_copy(rows: u64) {
    let m = metrics();
    m.copy_statements_total.fetch_add(1, Ordering::Relaxed);
    m.copy_rows_total.fetch_add(rows, Ordering::Relaxed);
}

pub(crate) fn record_transform(rows: u64) {
    let m = metrics();
    m.transform_statements_total.fetch_add(1, Ordering::Relaxed);
    m.transform_rows_total.fetch_add(rows, Ordering::Relaxed);
}

/// Prometheus text exposition of every counter.
pub fn render_prometheus() -> String {
    let m = metrics();
    let mut s = String::new();
    let _ = writeln!(
        s,
        "# TYPE ddl_statements_total counter\nddl_statements_total {}",
        m.ddl_statements_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE copy_statements_total counter\ncopy_statements_total {}",
        m.copy_statements_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE copy_rows_total counter\ncopy_rows_total {}",
        m.copy_rows_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE transform_statements_total counter\ntransform_statements_total {}",
        m.transform_statements_total.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        s,
        "# TYPE transform_rows_total counter\ntransform_rows_total {}",
        m.transform_rows_total.load(Ordering::Relaxed)
    );
    s
}
