/// The `properties` module reads and writes Java-style `.properties` files:
/// flat `key=value` (or `key:value`) lines with `#` and `!` comments.
///
/// `PropertiesFile` keeps the pairs in memory, ordered by key, and offers
/// get/set/delete operations on them.
pub mod properties;

/// The `filesystem` module wraps common file and directory operations:
/// existence checks, creation and deletion, copy with progress, text and
/// binary I/O, directory listing and `PATH` lookup.
pub mod filesystem;

/// The `environment` module reads, writes and expands environment variables
/// through the `Environment` trait, and reports process-level platform facts.
pub mod environment;

/// The `random` module provides `RandomSource`, an explicitly owned generator
/// for bounded numbers and random strings.
pub mod random;

/// The `console` module controls the terminal: cursor placement, screen
/// clearing and text colors, behind the `Console` trait.
pub mod console;

pub use console::{Console, TerminalConsole, TextColor};
pub use environment::{Environment, MemoryEnvironment, SystemEnvironment};
pub use filesystem::FilesystemError;
pub use properties::{PropertiesError, PropertiesFile};
pub use random::{RandomSource, SymbolFlags};
