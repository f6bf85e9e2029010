//! # tagid
//!
//! Short, prefixable, hexadecimal identifiers for a single process.
//!
//! Every id is the concatenation of four parts, with no separators:
//!
//! ```text
//! prefix | hex(sequence) | hex(seconds since epoch) | hex(machine id bytes)
//! ```
//!
//! - **Prefix**: a caller-chosen label such as `cat-` or `dog-`, used to tell id kinds apart.
//! - **Sequence**: one process-wide counter that wraps modulo 4096 and is offset by 170.
//! - **Seconds since epoch**: whole seconds between a configurable epoch and now.
//! - **Machine id**: an opaque token naming the issuing process or shard.
//!
//! ## Guarantees
//! - Every id in the process draws from the same counter, so no two calls observe the
//!   same counter value until it wraps.
//! - Encoding is deterministic: the same inputs always produce the same string.
//!
//! ## Limitations
//! - Uniqueness is not guaranteed above 4096 ids per second per machine id; the counter wraps
//!   silently and nothing detects the resulting collision.
//! - Ids are not globally unique across processes that share a machine id, and they are not
//!   strictly time ordered.
//!
//! ## Quick Start
//!
//! ```rust
//! use tagid::Config;
//!
//! let config = Config::new()
//!     .with_epoch(chrono::Utc::now())
//!     .with_machine_id("1")
//!     .with_default_prefix("cat-");
//!
//! let id = config.generate();
//! assert!(id.starts_with("cat-"));
//! assert!(id.ends_with("31"));
//!
//! let dog = config.generate_with_prefix("dog-");
//! assert!(dog.starts_with("dog-"));
//! ```
//!
//! ### Bound generators
//!
//! A [`Generator`] resolves its prefix once and then issues ids repeatedly. It keeps
//! following the epoch and machine id of the [`Config`] it was bound to.
//! ```rust
//! use tagid::{Config, PrefixSource};
//!
//! struct Cat;
//!
//! impl PrefixSource for Cat {
//!     fn prefix(&self) -> String {
//!         "cat-".to_string()
//!     }
//! }
//!
//! let config = Config::new().with_machine_id("node-7");
//! let cats = config.generator_for(&Cat);
//! assert!(cats.new_id().starts_with("cat-"));
//! ```
//!
//! ### Process-wide default
//!
//! The free functions wrap a process-wide [`Config`], configured once at startup.
//! ```rust
//! tagid::set_machine_id("1");
//! tagid::set_default_prefix("cat-");
//! let id = tagid::generate();
//! assert!(id.starts_with("cat-"));
//! ```

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};

mod error;
pub mod manifest;

pub use error::{Error, Result};
pub use manifest::{IdKind, Manifest};

/// Number of distinct counter states before the sequence wraps.
pub const SEQUENCE_MODULUS: u16 = 4096;

/// Offset added to the wrapped counter so the sequence never encodes as a tiny value.
pub const SEQUENCE_BIAS: u16 = 170;

/// Default epoch in seconds since the Unix epoch: the proleptic zero date.
///
/// This is year 0, month 0, day 0 normalised to `-0001-11-30 00:00:00 UTC`
/// (see [`civil_epoch`]).
pub const DEFAULT_EPOCH_SECONDS: i64 = -62_169_984_000;

/// The counter every id in the process draws from.
static COUNTER: SequenceCounter = SequenceCounter::new();

/// A wrapping, lock-protected sequence counter.
///
/// Every id issued by this crate draws from one process-wide instance.
///
/// Every call to [`SequenceCounter::next`] advances the counter by one modulo
/// [`SEQUENCE_MODULUS`] and returns the new state plus [`SEQUENCE_BIAS`], so the
/// returned values cycle through `170..=4265` with a period of exactly 4096.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    state: Mutex<u16>,
}

impl SequenceCounter {
    /// Create a counter whose first [`next`](Self::next) returns `171`.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(0),
        }
    }

    /// Advance the counter and return the biased value.
    ///
    /// The lock is held only for the increment, so concurrent callers never
    /// observe the same post-increment state.
    ///
    /// # Example
    /// ```
    /// use tagid::SequenceCounter;
    /// let counter = SequenceCounter::new();
    /// assert_eq!(counter.next(), 171);
    /// assert_eq!(counter.next(), 172);
    /// ```
    pub fn next(&self) -> u16 {
        let mut state = self.state.lock();
        *state = (*state + 1) % SEQUENCE_MODULUS;
        *state + SEQUENCE_BIAS
    }
}

/// Measures whole seconds elapsed since an epoch.
///
/// The epoch is stored as signed seconds relative to the Unix epoch, so instants
/// before 1970 and in the future are both representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Clock {
    epoch: i64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::from_unix_seconds(DEFAULT_EPOCH_SECONDS)
    }
}

impl Clock {
    /// Create a clock measuring from `instant`. Sub-second precision is dropped.
    pub fn new<Tz: TimeZone>(instant: DateTime<Tz>) -> Self {
        Self::from_unix_seconds(instant.timestamp())
    }

    /// Create a clock measuring from `epoch` seconds since the Unix epoch.
    pub const fn from_unix_seconds(epoch: i64) -> Self {
        Self { epoch }
    }

    /// The epoch in seconds since the Unix epoch.
    pub const fn epoch(&self) -> i64 {
        self.epoch
    }

    /// Seconds from the epoch to the current wall-clock time.
    ///
    /// Negative when the epoch lies in the future.
    pub fn elapsed_seconds(&self) -> i64 {
        self.elapsed_at(Utc::now())
    }

    /// Seconds from the epoch to `now`.
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use tagid::Clock;
    ///
    /// let clock = Clock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    /// let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
    /// assert_eq!(clock.elapsed_at(now), 60);
    /// ```
    pub fn elapsed_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> i64 {
        now.timestamp().saturating_sub(self.epoch)
    }
}

/// Build a UTC midnight from a civil date, normalising out-of-range fields.
///
/// Months outside `1..=12` carry into neighbouring years and days outside the
/// month carry into neighbouring months: month `0` is December of the previous
/// year, day `0` is the last day of the previous month.
///
/// # Errors
/// Returns [`Error::EpochOutOfRange`] when the normalised date cannot be represented.
///
/// # Example
/// ```
/// use tagid::civil_epoch;
/// let eve = civil_epoch(1970, 1, 0).unwrap();
/// assert_eq!(eve.timestamp(), -86_400);
/// ```
pub fn civil_epoch(year: i32, month: i32, day: i32) -> Result<DateTime<Utc>> {
    let out_of_range = || Error::EpochOutOfRange { year, month, day };

    let months = i64::from(year) * 12 + i64::from(month) - 1;
    let normal_year = i32::try_from(months.div_euclid(12)).map_err(|_| out_of_range())?;
    let normal_month = months.rem_euclid(12) as u32 + 1;

    let date = NaiveDate::from_ymd_opt(normal_year, normal_month, 1)
        .and_then(|first| {
            TimeDelta::try_days(i64::from(day) - 1).and_then(|d| first.checked_add_signed(d))
        })
        .ok_or_else(out_of_range)?;

    date.and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .ok_or_else(out_of_range)
}

/// Lowercase hexadecimal encoding of the id components.
///
/// - `sequence`: minimal width.
/// - `elapsed`: minimal width when non-negative; a negative value is written as
///   its 16-digit two's-complement form, so `-1` encodes as `ffffffffffffffff`.
/// - `machine`: two digits per UTF-8 byte of the machine id.
///
/// Writing into a `String` cannot fail, so the `fmt::Result` of `write!` is discarded.
pub mod encode {
    use std::fmt::Write;

    /// Encode a counter value.
    pub fn sequence(seq: u16) -> String {
        format!("{seq:x}")
    }

    /// Encode elapsed seconds.
    pub fn elapsed(seconds: i64) -> String {
        let mut out = String::with_capacity(16);
        push_elapsed(&mut out, seconds);
        out
    }

    /// Encode a machine id.
    pub fn machine(id: &str) -> String {
        let mut out = String::with_capacity(id.len() * 2);
        for byte in id.bytes() {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Build a full id from its raw parts.
    ///
    /// # Example
    /// ```
    /// use tagid::encode;
    /// assert_eq!(encode::compose("cat-", 171, 0, "1"), "cat-ab031");
    /// ```
    pub fn compose(prefix: &str, seq: u16, elapsed_seconds: i64, machine_id: &str) -> String {
        assemble(prefix, seq, elapsed_seconds, &machine(machine_id))
    }

    /// Build a full id from a pre-encoded machine id.
    pub(crate) fn assemble(
        prefix: &str,
        seq: u16,
        elapsed_seconds: i64,
        machine_hex: &str,
    ) -> String {
        let mut id = String::with_capacity(prefix.len() + 4 + 16 + machine_hex.len());
        id.push_str(prefix);
        let _ = write!(id, "{seq:x}");
        push_elapsed(&mut id, elapsed_seconds);
        id.push_str(machine_hex);
        id
    }

    fn push_elapsed(out: &mut String, seconds: i64) {
        if seconds < 0 {
            let _ = write!(out, "{:016x}", seconds as u64);
        } else {
            let _ = write!(out, "{seconds:x}");
        }
    }
}

/// Something that can name the prefix of the ids a [`Generator`] issues.
///
/// The prefix is resolved exactly once, when the generator is built.
pub trait PrefixSource {
    /// The prefix to prepend to every id.
    fn prefix(&self) -> String;
}

impl PrefixSource for str {
    fn prefix(&self) -> String {
        self.to_owned()
    }
}

impl PrefixSource for String {
    fn prefix(&self) -> String {
        self.clone()
    }
}

impl<T: PrefixSource + ?Sized> PrefixSource for &T {
    fn prefix(&self) -> String {
        (**self).prefix()
    }
}

/// The single encoding path shared by [`Config`] and [`Generator`].
fn issue<Tz: TimeZone>(settings: &Settings, prefix: &str, now: DateTime<Tz>) -> String {
    let seq = COUNTER.next();
    let elapsed = settings.clock.elapsed_at(now);
    let id = encode::assemble(prefix, seq, elapsed, &settings.machine_hex);
    tracing::trace!(%id, seq, elapsed, "issued id");
    id
}

#[derive(Debug, Clone, Default)]
struct Settings {
    clock: Clock,
    machine_id: String,
    machine_hex: String,
    default_prefix: String,
}

/// Configuration for issuing ids: epoch, machine id and default prefix.
///
/// A `Config` is a handle to shared settings. Its clones and every [`Generator`]
/// bound to it see changes made through any handle, starting with the next id.
/// All configs draw from the same process-wide [`SequenceCounter`].
#[derive(Debug, Clone, Default)]
pub struct Config {
    settings: Arc<RwLock<Settings>>,
}

impl Config {
    /// Default epoch, empty machine id and empty prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set_epoch`](Self::set_epoch).
    pub fn with_epoch<Tz: TimeZone>(self, instant: DateTime<Tz>) -> Self {
        self.set_epoch(instant);
        self
    }

    /// Builder form of [`set_machine_id`](Self::set_machine_id).
    pub fn with_machine_id(self, machine_id: impl Into<String>) -> Self {
        self.set_machine_id(machine_id);
        self
    }

    /// Builder form of [`set_default_prefix`](Self::set_default_prefix).
    pub fn with_default_prefix(self, prefix: impl Into<String>) -> Self {
        self.set_default_prefix(prefix);
        self
    }

    /// Measure elapsed time from `instant` for every id issued afterwards.
    ///
    /// Ids already issued are unaffected. An epoch in the future is accepted and
    /// yields negative elapsed time.
    pub fn set_epoch<Tz: TimeZone>(&self, instant: DateTime<Tz>) {
        self.set_epoch_seconds(instant.timestamp());
    }

    /// Measure elapsed time from `epoch` seconds since the Unix epoch.
    pub fn set_epoch_seconds(&self, epoch: i64) {
        let clock = Clock::from_unix_seconds(epoch);
        self.settings.write().clock = clock;
        if clock.elapsed_seconds() < 0 {
            tracing::warn!(epoch, "epoch is in the future; elapsed time will be negative");
        }
        tracing::debug!(epoch, "epoch set");
    }

    /// Restore [`DEFAULT_EPOCH_SECONDS`].
    pub fn reset_epoch(&self) {
        self.set_epoch_seconds(DEFAULT_EPOCH_SECONDS);
    }

    /// Embed `machine_id` in every id issued afterwards.
    pub fn set_machine_id(&self, machine_id: impl Into<String>) {
        let machine_id = machine_id.into();
        let machine_hex = encode::machine(&machine_id);
        tracing::debug!(%machine_id, "machine id set");

        let mut settings = self.settings.write();
        settings.machine_id = machine_id;
        settings.machine_hex = machine_hex;
    }

    /// Prefix used by [`generate`](Self::generate) and [`generator`](Self::generator).
    pub fn set_default_prefix(&self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        tracing::debug!(%prefix, "default prefix set");
        self.settings.write().default_prefix = prefix;
    }

    /// Copy every setting of `other` into this config.
    ///
    /// Generators bound to `self` pick up the copied settings; `other` stays independent.
    pub fn assign(&self, other: &Config) {
        if Arc::ptr_eq(&self.settings, &other.settings) {
            return;
        }
        let copied = other.settings.read().clone();
        *self.settings.write() = copied;
    }

    /// The epoch in seconds since the Unix epoch.
    pub fn epoch(&self) -> i64 {
        self.settings.read().clock.epoch()
    }

    /// The clock measuring from the current epoch.
    pub fn clock(&self) -> Clock {
        self.settings.read().clock
    }

    /// The machine id embedded in new ids.
    pub fn machine_id(&self) -> String {
        self.settings.read().machine_id.clone()
    }

    /// The prefix used by [`generate`](Self::generate).
    pub fn default_prefix(&self) -> String {
        self.settings.read().default_prefix.clone()
    }

    /// Seconds from the epoch to now.
    pub fn elapsed_seconds(&self) -> i64 {
        self.clock().elapsed_seconds()
    }

    /// Issue an id with the default prefix.
    pub fn generate(&self) -> String {
        let settings = self.settings.read();
        issue(&settings, &settings.default_prefix, Utc::now())
    }

    /// Issue an id with a one-off prefix. The default prefix is neither read nor changed.
    pub fn generate_with_prefix(&self, prefix: &str) -> String {
        issue(&self.settings.read(), prefix, Utc::now())
    }

    /// A generator bound to the current default prefix.
    pub fn generator(&self) -> Generator {
        Generator::bind(self, self.default_prefix())
    }

    /// A generator bound to the prefix `source` names right now.
    pub fn generator_for<P: PrefixSource + ?Sized>(&self, source: &P) -> Generator {
        Generator::new(self, source)
    }

    /// A generator bound to `prefix`.
    pub fn generator_with_prefix(&self, prefix: impl Into<String>) -> Generator {
        Generator::bind(self, prefix.into())
    }
}

/// Issues ids with a fixed prefix.
///
/// Only the prefix is fixed when the generator is built; later changes to the
/// [`PrefixSource`] or to the config's default prefix do not reach it. The epoch
/// and machine id are read from the bound [`Config`] on every call.
#[derive(Debug, Clone)]
pub struct Generator {
    prefix: String,
    settings: Arc<RwLock<Settings>>,
}

impl Generator {
    /// Bind a generator to `config`, resolving the prefix from `source` once.
    pub fn new<P: PrefixSource + ?Sized>(config: &Config, source: &P) -> Self {
        Self::bind(config, source.prefix())
    }

    fn bind(config: &Config, prefix: String) -> Self {
        Self {
            prefix,
            settings: Arc::clone(&config.settings),
        }
    }

    /// The prefix every id from this generator starts with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The clock of the bound config, as it reads now.
    pub fn clock(&self) -> Clock {
        self.settings.read().clock
    }

    /// Issue an id.
    ///
    /// # Example
    /// ```
    /// use tagid::Config;
    /// let cats = Config::new().generator_with_prefix("cat-");
    /// let (a, b) = (cats.new_id(), cats.new_id());
    /// assert!(a.starts_with("cat-"));
    /// assert_ne!(a, b);
    /// ```
    pub fn new_id(&self) -> String {
        self.new_id_at(Utc::now())
    }

    /// Issue an id as if the wall clock read `now`.
    pub fn new_id_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> String {
        issue(&self.settings.read(), &self.prefix, now)
    }

    /// Issue `n` ids.
    pub fn batch(&self, n: usize) -> Vec<String> {
        (0..n).map(|_| self.new_id()).collect()
    }
}

/// Process-wide default configuration, initialised on first use.
static GLOBAL: OnceLock<Config> = OnceLock::new();

fn global() -> &'static Config {
    GLOBAL.get_or_init(Config::new)
}

/// Set the process-wide epoch.
///
/// Configuration is meant to happen once at startup; changes made while other
/// threads issue ids take effect from the next id each of them issues.
pub fn set_epoch<Tz: TimeZone>(instant: DateTime<Tz>) {
    global().set_epoch(instant);
}

/// Set the process-wide epoch in seconds since the Unix epoch.
pub fn set_epoch_seconds(epoch: i64) {
    global().set_epoch_seconds(epoch);
}

/// Restore the process-wide epoch to [`DEFAULT_EPOCH_SECONDS`].
pub fn reset_epoch() {
    global().reset_epoch();
}

/// The process-wide epoch in seconds since the Unix epoch.
pub fn epoch() -> i64 {
    global().epoch()
}

/// Seconds from the process-wide epoch to now.
pub fn elapsed_seconds() -> i64 {
    global().elapsed_seconds()
}

/// Set the process-wide machine id.
pub fn set_machine_id(machine_id: impl Into<String>) {
    global().set_machine_id(machine_id);
}

/// Set the process-wide default prefix.
pub fn set_default_prefix(prefix: impl Into<String>) {
    global().set_default_prefix(prefix);
}

/// Copy every setting of `config` into the process-wide configuration.
///
/// Generators from [`new_generator`] see the new settings from their next id.
pub fn configure(config: &Config) {
    global().assign(config);
    tracing::debug!("process-wide configuration replaced");
}

/// A handle to the process-wide configuration.
pub fn config() -> Config {
    global().clone()
}

/// Issue an id from the process-wide configuration.
pub fn generate() -> String {
    global().generate()
}

/// Issue an id from the process-wide configuration with a one-off prefix.
pub fn generate_with_prefix(prefix: &str) -> String {
    global().generate_with_prefix(prefix)
}

/// Bind a generator to the process-wide configuration.
///
/// # Example
/// ```
/// let dogs = tagid::new_generator("dog-");
/// assert!(dogs.new_id().starts_with("dog-"));
/// ```
pub fn new_generator<P: PrefixSource + ?Sized>(source: &P) -> Generator {
    global().generator_for(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    /// Split an id into its sequence value, given the prefix and the encoded tail.
    fn sequence_of(id: &str, prefix: &str, tail: &str) -> u16 {
        let hex = id
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(tail))
            .unwrap_or_else(|| panic!("{id} is not {prefix}<seq>{tail}"));
        u16::from_str_radix(hex, 16).unwrap()
    }

    /// Test that the counter starts at 171 and wraps back to 170.
    #[test]
    fn test_counter_wraps() {
        let counter = SequenceCounter::new();
        let first: Vec<u16> = (0..SEQUENCE_MODULUS).map(|_| counter.next()).collect();
        assert_eq!(first[0], 171);
        assert_eq!(first[4094], 4265);
        assert_eq!(first[4095], 170);

        let second: Vec<u16> = (0..SEQUENCE_MODULUS).map(|_| counter.next()).collect();
        assert_eq!(first, second);

        let distinct: HashSet<u16> = first.into_iter().collect();
        assert_eq!(distinct.len(), SEQUENCE_MODULUS as usize);
    }

    /// Test that concurrent callers never share a counter value.
    #[test]
    fn test_counter_concurrent_uniqueness() {
        let counter = Arc::new(SequenceCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || (0..512).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value), "duplicate counter value {value}");
            }
        }
        assert_eq!(seen.len(), 4096);
    }

    #[test]
    fn test_default_epoch_is_zero_date() {
        assert_eq!(Clock::default().epoch(), DEFAULT_EPOCH_SECONDS);
        assert_eq!(civil_epoch(0, 0, 0).unwrap().timestamp(), DEFAULT_EPOCH_SECONDS);
        assert_eq!(Config::new().epoch(), DEFAULT_EPOCH_SECONDS);
    }

    #[test]
    fn test_civil_epoch_normalises() {
        assert_eq!(civil_epoch(1970, 1, 1).unwrap().timestamp(), 0);
        assert_eq!(civil_epoch(2023, 13, 1).unwrap(), civil_epoch(2024, 1, 1).unwrap());
        assert_eq!(civil_epoch(2024, 3, 0).unwrap(), civil_epoch(2024, 2, 29).unwrap());
        assert_eq!(civil_epoch(2024, 1, 32).unwrap(), civil_epoch(2024, 2, 1).unwrap());
        assert!(matches!(
            civil_epoch(i32::MAX, 1, 1),
            Err(Error::EpochOutOfRange { .. })
        ));
    }

    #[test]
    fn test_clock_elapsed() {
        let clock = Clock::from_unix_seconds(1_000);
        assert_eq!(clock.elapsed_at(at(1_000)), 0);
        assert_eq!(clock.elapsed_at(at(1_255)), 255);
        assert_eq!(clock.elapsed_at(at(999)), -1);
    }

    /// Test that elapsed time never goes backwards without an epoch change.
    #[test]
    fn test_clock_monotonic_samples() {
        let clock = Clock::new(Utc::now());
        let first = clock.elapsed_seconds();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let second = clock.elapsed_seconds();
        assert!(second >= first);
        assert!(first >= 0);
    }

    #[test]
    fn test_encode_components() {
        assert_eq!(encode::sequence(171), "ab");
        assert_eq!(encode::sequence(4265), "10a9");
        assert_eq!(encode::elapsed(0), "0");
        assert_eq!(encode::elapsed(255), "ff");
        assert_eq!(encode::elapsed(-1), "ffffffffffffffff");
        assert_eq!(encode::elapsed(-16), "fffffffffffffff0");
        assert_eq!(encode::machine(""), "");
        assert_eq!(encode::machine("1"), "31");
        assert_eq!(encode::machine("Az"), "417a");
        assert_eq!(encode::machine("é"), "c3a9");
    }

    #[test]
    fn test_compose_is_deterministic() {
        let a = encode::compose("cat-", 300, 86_400, "node-7");
        let b = encode::compose("cat-", 300, 86_400, "node-7");
        assert_eq!(a, b);
        assert_eq!(a, "cat-12c151806e6f64652d37");
        assert_eq!(encode::compose("", 170, -2, ""), "aafffffffffffffffe");
    }

    #[test]
    fn test_generated_id_layout() {
        let start = at(1_700_000_000);
        let config = Config::new()
            .with_epoch(start)
            .with_machine_id("1")
            .with_default_prefix("cat-");
        let cats = config.generator();

        let id = cats.new_id_at(start);
        let seq = sequence_of(&id, "cat-", "031");
        assert!((SEQUENCE_BIAS..SEQUENCE_BIAS + SEQUENCE_MODULUS).contains(&seq));
        assert_eq!(id, encode::compose("cat-", seq, 0, "1"));

        let later = cats.new_id_at(at(1_700_000_017));
        sequence_of(&later, "cat-", "1131");
    }

    #[test]
    fn test_future_epoch_encodes_twos_complement() {
        let config = Config::new().with_epoch(at(101)).with_machine_id("1");
        let id = config.generator_with_prefix("x-").new_id_at(at(100));
        sequence_of(&id, "x-", "ffffffffffffffff31");
    }

    #[test]
    fn test_prefix_isolation() {
        let config = Config::new().with_epoch(Utc::now()).with_default_prefix("y-");
        let one_off = config.generate_with_prefix("x-");
        assert!(one_off.starts_with("x-"));
        assert_eq!(config.default_prefix(), "y-");
        assert!(config.generate().starts_with("y-"));

        config.set_default_prefix("z-");
        assert!(config.generate().starts_with("z-"));
    }

    struct Mutable(RefCell<String>);

    impl PrefixSource for Mutable {
        fn prefix(&self) -> String {
            self.0.borrow().clone()
        }
    }

    /// Test that a bound generator keeps the prefix it was built with.
    #[test]
    fn test_bound_prefix_is_immutable() {
        let source = Mutable(RefCell::new("cat-".to_string()));
        let config = Config::new().with_epoch(at(0)).with_machine_id("1");
        let cats = config.generator_for(&source);

        *source.0.borrow_mut() = "dog-".to_string();
        config.set_default_prefix("cow-");

        assert_eq!(cats.prefix(), "cat-");
        sequence_of(&cats.new_id_at(at(0)), "cat-", "031");
    }

    /// Test that a bound generator follows epoch and machine id changes.
    #[test]
    fn test_bound_generator_follows_config() {
        let config = Config::new().with_epoch(at(0)).with_machine_id("1");
        let cats = config.generator_with_prefix("cat-");
        let before = cats.new_id_at(at(255));

        config.set_epoch(at(100));
        config.set_machine_id("2");
        let after = cats.new_id_at(at(255));

        sequence_of(&before, "cat-", "ff31");
        sequence_of(&after, "cat-", "9b32");
        assert_eq!(cats.clock().epoch(), 100);

        config.assign(&Config::new().with_epoch(at(0)).with_machine_id("node"));
        sequence_of(&cats.new_id_at(at(1)), "cat-", "16e6f6465");
    }

    /// Test that separate configs draw from the one process-wide counter.
    #[test]
    fn test_configs_share_process_counter() {
        let left = Config::new().with_epoch(at(0)).generator_with_prefix("dog-");
        let right = Config::new().with_epoch(at(0)).generator_with_prefix("dog-");
        assert_ne!(left.new_id_at(at(5)), right.new_id_at(at(5)));
    }

    /// The counter wraps silently: the 4097th id in one second repeats the first.
    #[test]
    fn test_wrap_collides_within_a_second() {
        let counter = SequenceCounter::new();
        let ids: Vec<String> = (0..=SEQUENCE_MODULUS)
            .map(|_| encode::compose("cat-", counter.next(), 5, "1"))
            .collect();
        let distinct: HashSet<&String> = ids[..SEQUENCE_MODULUS as usize].iter().collect();
        assert_eq!(distinct.len(), SEQUENCE_MODULUS as usize);
        assert_eq!(ids[0], ids[SEQUENCE_MODULUS as usize]);
    }

    #[test]
    fn test_batch() {
        let ids = Config::new().generator_with_prefix("b-").batch(3);
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| id.starts_with("b-")));
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);
    }

    /// Test uniqueness of ids issued below the wrap rate over several seconds.
    #[test]
    #[ignore] // This test is long-running and should be run manually.
    fn test_uniqueness_under_rate() {
        let ids = Config::new().with_machine_id("1").generator_with_prefix("u-");
        let mut seen = HashSet::new();
        for _ in 0..3 {
            for id in ids.batch(4_000) {
                assert!(seen.insert(id), "Duplicate ID found");
            }
            std::thread::sleep(std::time::Duration::from_secs(1));
        }
    }
}
