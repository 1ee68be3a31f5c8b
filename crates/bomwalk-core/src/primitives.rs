//! # Primitives
//!
//! Hardcoded constants shared by the resolver, the path format and the
//! storage backends. These are compiled into the binary and immutable at
//! runtime.

/// Id of the synthetic link placed at element zero of every root-driven path.
pub const ROOT_LINK_ID: u64 = 1;

/// Full id of the synthetic root link as it appears in path strings.
pub const ROOT_LINK_FULL_ID: &str = "-1";

/// Prefix of usage link full ids (`u12`).
pub const USAGE_LINK_PREFIX: char = 'u';

/// Prefix of substitute link full ids (`s3`).
pub const SUBSTITUTE_LINK_PREFIX: char = 's';

/// Separator between link full ids in a path string (`-1-u12-s3`).
pub const PATH_SEPARATOR: char = '-';

/// Magic bytes preceding every record written by the persistent backend.
pub const MAGIC_BYTES: &[u8; 4] = b"BOMW";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the record layout.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum number of parts accepted by a single catalog import.
pub const MAX_IMPORT_PARTS: usize = 100_000;
