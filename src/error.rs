use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum BillingError {
    #[error("invalid parameter: {0}")]
    #[diagnostic(code(creditline::invalid_parameter))]
    InvalidParameter(String),

    #[error("invalid config value: {0}")]
    #[diagnostic(code(creditline::invalid_config_value))]
    InvalidConfigValue(String),

    #[error("{kind} with name '{name}' already exists")]
    #[diagnostic(code(creditline::duplicate_name))]
    DuplicateName { kind: &'static str, name: String },

    #[error("capability '{capability}' is already served by active fusion chain '{existing}'")]
    #[diagnostic(
        code(creditline::conflicting_mapping),
        help("deactivate the existing chain before creating a new one for this capability")
    )]
    ConflictingMapping { capability: String, existing: String },

    #[error("{kind} '{id}' not found")]
    #[diagnostic(code(creditline::not_found))]
    NotFound { kind: &'static str, id: String },

    #[error("insufficient credits: required {required}, available {available}")]
    #[diagnostic(code(creditline::insufficient_balance))]
    InsufficientBalance { required: u64, available: u64 },

    #[error("generation failed: {0}")]
    #[diagnostic(code(creditline::upstream_failure))]
    UpstreamFailure(String),

    #[error("'{0}' requires an active subscription")]
    #[diagnostic(code(creditline::subscription_required))]
    SubscriptionRequired(String),

    #[error("external reference '{0}' was already recorded")]
    #[diagnostic(code(creditline::duplicate_reference))]
    DuplicateReference(String),

    #[error("configuration error: {0}")]
    #[diagnostic(code(creditline::config))]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

impl BillingError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BillingError {
    fn from(err: rocksdb::Error) -> Self {
        BillingError::Storage(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
