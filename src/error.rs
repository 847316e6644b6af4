/// Custom Result type for varindex operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the varindex library, encompassing all possible error cases
/// that can occur while building or decoding variant indexes.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Bit-level precondition violations
    BitError(#[from] BitError),
    /// Invalid or inconsistent configuration
    ConfigError(#[from] ConfigError),
    /// Genotype strings that could not be parsed
    GenotypeError(#[from] GenotypeError),
    /// Input delivered out of genomic order
    OrderError(#[from] OrderError),
    /// Serialized index columns that could not be decoded
    ColumnError(#[from] ColumnError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Generic errors, typically raised by output sinks
    AnyhowError(#[from] anyhow::Error),
}

/// Errors raised by bit-addressable buffers and streams.
///
/// These are programming errors: the request can never succeed and is rejected
/// before any bits are touched.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BitError {
    /// More bits were requested than the operation supports
    ///
    /// # Fields
    /// * `requested` - The number of bits requested
    /// * `max` - The maximum number of bits for this operation
    #[error("Requested {requested} bits, but at most {max} are supported")]
    TooManyBits { requested: usize, max: usize },

    /// A read or write crosses the end of the buffer
    ///
    /// # Fields
    /// * `offset` - Bit offset of the access
    /// * `length` - Number of bits accessed
    /// * `capacity` - Bit length of the buffer
    #[error("Bit range {offset}+{length} exceeds buffer length {capacity}")]
    OutOfBounds {
        offset: usize,
        length: usize,
        capacity: usize,
    },

    /// A stream read past its declared length
    #[error("Requested {requested} bits with only {remaining} remaining in stream")]
    EndOfStream { requested: usize, remaining: usize },
}

/// Errors raised while validating configuration or resolving trios
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The same study:population pair was registered twice
    #[error("Duplicated population '{0}' in population frequency ranges")]
    DuplicatedPopulation(String),

    /// A trio refers to a sample name that is not registered
    #[error("Unknown sample '{0}'")]
    UnknownSample(String),

    /// Two trios share the same child
    #[error("Sample '{0}' is the child of more than one trio")]
    DuplicatedChild(String),

    /// The biotype column holds a single byte
    ///
    /// # Arguments
    /// * `usize` - The number of configured biotypes
    #[error("At most 8 tracked biotypes are supported, got {0}")]
    TooManyBiotypes(usize),

    /// The consequence type column holds a single short
    #[error("At most 16 tracked consequence types are supported, got {0}")]
    TooManyConsequenceTypes(usize),

    /// The clinical significance column holds a single byte
    #[error("At most 8 clinical significance categories are supported, got {0}")]
    TooManyClinicalSignificances(usize),

    /// Frequency thresholds must be strictly ascending within (0, 1]
    #[error("Invalid population frequency thresholds: {0:?}")]
    InvalidThresholds(Vec<f64>),

    /// Frequency codes are 2 bits wide
    #[error("At most 3 population frequency thresholds are supported, got {0}")]
    TooManyThresholds(usize),

    /// The genomic batch size must be positive
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(u32),

    /// The configuration file could not be parsed
    #[error("Unable to parse configuration: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The configuration could not be rendered
    #[error("Unable to serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A population identifier is not of the form `study:population`
    #[error("Invalid population identifier '{0}', expected 'study:population'")]
    InvalidPopulation(String),
}

/// Errors raised while parsing genotype calls
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum GenotypeError {
    /// The genotype string is not a valid call
    #[error("Invalid genotype '{0}'")]
    Invalid(String),
}

/// Errors raised when the input stream violates genomic ordering
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum OrderError {
    /// A position was seen after a larger one on the same chromosome
    #[error("Unsorted input on {chromosome}: position {position} after {previous}")]
    Unsorted {
        chromosome: String,
        previous: u32,
        position: u32,
    },

    /// A chromosome came back after a different chromosome was started
    #[error("Chromosome {0} was already indexed")]
    ChromosomeRevisited(String),
}

/// Errors raised while decoding serialized index columns
#[derive(thiserror::Error, Debug)]
pub enum ColumnError {
    /// The column ended in the middle of a record
    ///
    /// # Arguments
    /// * `String` - The column being decoded
    #[error("Column {0} is truncated")]
    Truncated(String),

    /// A length prefix or code did not match the expected layout
    #[error("Column {column} is malformed at byte {position}")]
    Malformed { column: String, position: usize },

    /// A string does not fit its u32 length prefix
    #[error("Value of {0} bytes is too long to be written")]
    ValueTooLong(usize),
}
