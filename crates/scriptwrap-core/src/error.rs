//! Unified error types for scriptwrap.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ScriptWrapError (top-level wrapper)
//! ├── ConfigError       - Invalid isolate configuration
//! ├── RegistrationError - Class declaration and object registration invariants
//! ├── NativeError       - Failures inside native callbacks (marshaling, `this`, construction)
//! └── Exception         - Script-visible exception raised at a call boundary
//! ```
//!
//! Registration errors are invariant violations: they are returned from the
//! declaring or wrapping call and are expected to abort the embedder's setup.
//! Native errors never escape a script call directly; the isolate converts
//! them into an [`Exception`] that script code (or the embedder driving it)
//! can catch.

use thiserror::Error;

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors that can occur when converting between Rust and script values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Type mismatch during conversion
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Integer overflow during conversion
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow {
        value: i64,
        target_type: &'static str,
    },

    /// The value is not a proxy for the requested native class
    #[error("expected an object of class {class}")]
    NotWrapped { class: &'static str },

    /// Generic conversion failure
    #[error("conversion failed: {message}")]
    Failed { message: String },
}

// ============================================================================
// Native Errors
// ============================================================================

/// Errors that can occur during native function execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Error converting arguments or return values
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Invalid `this` reference for method call
    #[error("invalid 'this' reference: {message}")]
    InvalidThis { message: String },

    /// The class has no constructor trampoline
    #[error("{class}: create is not allowed")]
    ConstructionNotAllowed { class: String },

    /// A registration invariant was violated while running a callback
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// An exception thrown by a nested script call
    #[error(transparent)]
    Exception(#[from] Exception),

    /// Generic native error
    #[error("native error: {message}")]
    Other { message: String },
}

impl NativeError {
    /// Create an "invalid this" error with a message.
    pub fn invalid_this(message: impl Into<String>) -> Self {
        NativeError::InvalidThis {
            message: message.into(),
        }
    }

    /// Create a generic native error.
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other {
            message: message.into(),
        }
    }
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Invariant violations raised while declaring classes or registering objects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// The base class is already a direct base of the derived class.
    #[error("duplicated base class: {derived} already inherits {base}")]
    DuplicateBase {
        /// Derived class name.
        derived: String,
        /// Base class name.
        base: String,
    },

    /// Adding the base would make the inheritance graph cyclic.
    #[error("inheritance cycle: {base} already derives from {derived}")]
    InheritanceCycle {
        /// Derived class name.
        derived: String,
        /// Base class name.
        base: String,
    },

    /// The native address is already registered for this class.
    #[error("duplicate object: {class} at {address:#x} is already wrapped")]
    DuplicateObject {
        /// Class name.
        class: String,
        /// Native address.
        address: usize,
    },

    /// The native address is not registered for this class.
    #[error("no object: {class} at {address:#x} is not wrapped")]
    ObjectNotFound {
        /// Class name.
        class: String,
        /// Native address.
        address: usize,
    },

    /// No descriptor exists for the type identity in this isolate.
    #[error("type #{identity} is not registered in this isolate")]
    UnregisteredType {
        /// Type identity index.
        identity: u32,
    },

    /// Zero-sized types cannot be exposed: their objects share one address.
    #[error("zero-sized class: {class} objects have no distinct address")]
    ZeroSizedClass {
        /// Class name.
        class: String,
    },

    /// The isolate data slot reserved for the class directory holds other
    /// data, or does not exist.
    #[error("isolate data slot {slot} cannot hold the class directory")]
    DirectoryUnavailable {
        /// Data slot index.
        slot: usize,
    },

    /// A constant could not be converted into a script value.
    #[error("invalid constant '{name}': {source}")]
    InvalidConstant {
        /// Constant name.
        name: String,
        /// Underlying conversion failure.
        source: ConversionError,
    },
}

// ============================================================================
// Config Errors
// ============================================================================

/// Errors raised when an isolate configuration is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The directory slot does not fit in the configured data slots.
    #[error("data slot {slot} out of range (isolate has {count} data slots)")]
    SlotOutOfRange { slot: usize, count: usize },

    /// A zero allocation threshold would collect on every safepoint.
    #[error("gc threshold must be greater than zero")]
    ZeroGcThreshold,
}

// ============================================================================
// Exceptions
// ============================================================================

/// A script-level exception.
///
/// Produced when a native callback fails during `call`, `construct`, `get` or
/// `set`; script code sees it as a thrown error it can catch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Uncaught Error: {message}")]
pub struct Exception {
    /// The exception message.
    pub message: String,
}

impl Exception {
    /// Create a new exception with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Create a type error exception.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            message: format!("TypeError: {}", message.into()),
        }
    }
}

impl From<NativeError> for Exception {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::Exception(inner) => inner,
            other => Exception::new(other.to_string()),
        }
    }
}

// ============================================================================
// Top-level Error
// ============================================================================

/// Top-level error wrapping every phase-specific error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptWrapError {
    /// A configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A registration error.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A native callback error.
    #[error(transparent)]
    Native(#[from] NativeError),

    /// A script exception.
    #[error(transparent)]
    Exception(#[from] Exception),
}

impl ScriptWrapError {
    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, ScriptWrapError::Config(_))
    }

    /// Check if this is a registration error.
    pub fn is_registration(&self) -> bool {
        matches!(self, ScriptWrapError::Registration(_))
    }

    /// Check if this is a native error.
    pub fn is_native(&self) -> bool {
        matches!(self, ScriptWrapError::Native(_))
    }

    /// Check if this is a script exception.
    pub fn is_exception(&self) -> bool {
        matches!(self, ScriptWrapError::Exception(_))
    }
}
