use bitflags::bitflags;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LOWERCASE_SYMBOLS: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE_SYMBOLS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const NUMBER_SYMBOLS: &str = "0123456789";
const SPECIAL_SYMBOLS: &str = "!\"/$%?&*()_+-=\\:<>";

/// Length of the strings produced by [`RandomSource::string`].
pub const DEFAULT_STRING_LEN: usize = 20;

bitflags! {
    /// Character classes allowed in a generated string.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SymbolFlags: u32 {
        /// Letters from `a` to `z`.
        const LOWERCASE = 0b0001;
        /// Letters from `A` to `Z`.
        const UPPERCASE = 0b0010;
        /// Digits from `0` to `9`.
        const NUMBERS = 0b0100;
        /// Punctuation such as `%` and `!`.
        const SPECIAL = 0b1000;
    }
}

impl SymbolFlags {
    /// Returns the symbols selected by these flags, in a fixed order.
    pub fn symbols(self) -> String {
        let mut symbols = String::new();
        if self.contains(SymbolFlags::LOWERCASE) {
            symbols.push_str(LOWERCASE_SYMBOLS);
        }
        if self.contains(SymbolFlags::UPPERCASE) {
            symbols.push_str(UPPERCASE_SYMBOLS);
        }
        if self.contains(SymbolFlags::NUMBERS) {
            symbols.push_str(NUMBER_SYMBOLS);
        }
        if self.contains(SymbolFlags::SPECIAL) {
            symbols.push_str(SPECIAL_SYMBOLS);
        }
        symbols
    }
}

/// A source of random numbers and strings.
///
/// Each instance owns its generator. Build one with [`RandomSource::new`] for
/// OS-seeded values or [`RandomSource::from_seed`] for a reproducible sequence.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource {
    /// Creates a source seeded by the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Creates a source that always yields the same sequence for `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns a value between 0 and `i32::MAX`, both inclusive.
    pub fn next_int(&mut self) -> u32 {
        self.rng.random_range(0..=i32::MAX as u32)
    }

    /// Returns a value between `min` and `max`, both inclusive.
    ///
    /// Reversed bounds are swapped.
    pub fn int_in_range(&mut self, min: i32, max: i32) -> i32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.rng.random_range(lo..=hi)
    }

    /// Returns `min + u * (max - min)` for a uniform `u` in `[0, 1]`.
    pub fn f64_in_range(&mut self, min: f64, max: f64) -> f64 {
        let unit: f64 = self.rng.random_range(0.0..=1.0);
        min + unit * (max - min)
    }

    /// Single-precision counterpart of [`RandomSource::f64_in_range`].
    pub fn f32_in_range(&mut self, min: f32, max: f32) -> f32 {
        let unit: f32 = self.rng.random_range(0.0..=1.0);
        min + unit * (max - min)
    }

    /// Returns an alphanumeric string of [`DEFAULT_STRING_LEN`] characters.
    pub fn string(&mut self) -> String {
        self.string_of_len(DEFAULT_STRING_LEN)
    }

    /// Returns an alphanumeric string of `len` characters.
    pub fn string_of_len(&mut self, len: usize) -> String {
        self.string_with_flags(
            len,
            SymbolFlags::LOWERCASE | SymbolFlags::UPPERCASE | SymbolFlags::NUMBERS,
        )
    }

    /// Returns a string of `len` characters picked from `symbols`.
    ///
    /// An empty symbol set yields an empty string.
    pub fn string_from_symbols(&mut self, len: usize, symbols: &str) -> String {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return String::new();
        }
        (0..len)
            .map(|_| symbols[self.rng.random_range(0..symbols.len())])
            .collect()
    }

    /// Returns a string of `len` characters from the classes selected by `flags`.
    pub fn string_with_flags(&mut self, len: usize, flags: SymbolFlags) -> String {
        let symbols = flags.symbols();
        self.string_from_symbols(len, &symbols)
    }
}
