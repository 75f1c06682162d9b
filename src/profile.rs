//! Statement tracing and timing.
//!
//! A [`ProfileTap`] installed with
//! [`SqliteConnection::set_profile_tap()`](crate::SqliteConnection::set_profile_tap) sees the
//! text of every statement when it starts executing, and its execution time in nanoseconds
//! when it completes.
//!
//! ```rust,no_run
//! use std::sync::{Arc, Mutex};
//! use litebind::{SqliteConnection, StringTap};
//!
//! # fn main() -> Result<(), litebind::Error> {
//! let conn = SqliteConnection::open(":memory:")?;
//! let tap = Arc::new(Mutex::new(StringTap::default()));
//! conn.set_profile_tap(Arc::clone(&tap));
//!
//! conn.prepare("SELECT 1")?.execute()?;
//!
//! let mut tap = tap.lock().unwrap();
//! tap.dump_profile().unwrap();
//! println!("{}", tap.contents());
//! # Ok(())
//! # }
//! ```

use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;

/// Receives statement text and timings from a connection.
pub trait ProfileTap: Send {
    /// A statement is about to run.
    fn trace(&mut self, sql: &str);

    /// A statement finished after `nanos` nanoseconds.
    fn profile(&mut self, sql: &str, nanos: u64);
}

impl<T: ProfileTap + ?Sized> ProfileTap for Box<T> {
    fn trace(&mut self, sql: &str) {
        (**self).trace(sql);
    }

    fn profile(&mut self, sql: &str, nanos: u64) {
        (**self).profile(sql, nanos);
    }
}

// shared so the caller can still read the tap after handing it to a connection
impl<T: ProfileTap + ?Sized> ProfileTap for Arc<Mutex<T>> {
    fn trace(&mut self, sql: &str) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .trace(sql);
    }

    fn profile(&mut self, sql: &str, nanos: u64) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .profile(sql, nanos);
    }
}

/// Running statistics over a series of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSampler {
    name: String,
    n: u64,
    sum: u128,
    sumsq: u128,
    min: u64,
    max: u64,
}

impl ProfileSampler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            n: 0,
            sum: 0,
            sumsq: 0,
            min: 0,
            max: 0,
        }
    }

    pub fn sample(&mut self, value: u64) {
        if self.n == 0 || value < self.min {
            self.min = value;
        }

        if self.n == 0 || value > self.max {
            self.max = value;
        }

        self.n += 1;
        self.sum += u128::from(value);
        self.sumsq += u128::from(value) * u128::from(value);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn sum(&self) -> u128 {
        self.sum
    }

    pub fn sum_of_squares(&self) -> u128 {
        self.sumsq
    }

    /// 0 before the first sample.
    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }

        self.sum as f64 / self.n as f64
    }

    /// Sample standard deviation; 0 with fewer than two samples.
    #[allow(clippy::cast_precision_loss)]
    pub fn stddev(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }

        let n = self.n as f64;
        let mean = self.mean();
        let variance = (self.sumsq as f64 - n * mean * mean) / (n - 1.0);

        // rounding can push a zero variance slightly negative
        variance.max(0.0).sqrt()
    }
}

impl Display for ProfileSampler {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] => sum: {}, sumsq: {}, n: {}, mean: {:.6}, stddev: {:.6}, min: {}, max: {}",
            self.name,
            self.sum,
            self.sumsq,
            self.n,
            self.mean(),
            self.stddev(),
            self.min,
            self.max
        )
    }
}

/// A tap writing one `"<nanos> : <sql>"` line per completed statement to `W`, and keeping a
/// [`ProfileSampler`] per distinct statement text.
#[derive(Debug)]
pub struct IoTap<W> {
    writer: W,
    trace: bool,
    samplers: IndexMap<String, ProfileSampler>,
}

/// An [`IoTap`] collecting its output in memory.
pub type StringTap = IoTap<Vec<u8>>;

impl<W: Write> IoTap<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            trace: false,
            samplers: IndexMap::new(),
        }
    }

    /// Also write each statement as it starts. Off by default.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn samplers(&self) -> impl Iterator<Item = &ProfileSampler> {
        self.samplers.values()
    }

    pub fn sampler(&self, sql: &str) -> Option<&ProfileSampler> {
        self.samplers.get(sql)
    }

    /// Write one summary line per distinct statement, in the order they were first seen.
    pub fn dump_profile(&mut self) -> io::Result<()> {
        for sampler in self.samplers.values() {
            writeln!(self.writer, "{sampler}")?;
        }

        self.writer.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl IoTap<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl IoTap<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl Default for StringTap {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl StringTap {
    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.writer).into_owned()
    }
}

impl<W: Write + Send> ProfileTap for IoTap<W> {
    fn trace(&mut self, sql: &str) {
        if self.trace {
            if let Err(error) = writeln!(self.writer, "{sql}") {
                tracing::warn!(%error, "failed to write statement trace");
            }
        }
    }

    fn profile(&mut self, sql: &str, nanos: u64) {
        if let Err(error) = writeln!(self.writer, "{nanos} : {sql}") {
            tracing::warn!(%error, "failed to write statement profile");
        }

        self.samplers
            .entry(sql.to_owned())
            .or_insert_with(|| ProfileSampler::new(sql))
            .sample(nanos);
    }
}
