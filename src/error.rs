use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterErrorCode {
    Io,
    Spawn,
    InvalidConfig,
    Unavailable,
    NotAuthorising,
    Parse,
    BadOption,
    BadDate,
    TableNotFound,
    EmptyBlock,
    BlockClosed,
    RowOutsideBlock,
    UnterminatedSql,
    Execution,
    TransientExhausted,
    Allocation,
    ApplyFailed,
}

impl UpdaterErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdaterErrorCode::Io => "io",
            UpdaterErrorCode::Spawn => "spawn",
            UpdaterErrorCode::InvalidConfig => "invalid_config",
            UpdaterErrorCode::Unavailable => "unavailable",
            UpdaterErrorCode::NotAuthorising => "not_authorising",
            UpdaterErrorCode::Parse => "parse",
            UpdaterErrorCode::BadOption => "bad_option",
            UpdaterErrorCode::BadDate => "bad_date",
            UpdaterErrorCode::TableNotFound => "table_not_found",
            UpdaterErrorCode::EmptyBlock => "empty_block",
            UpdaterErrorCode::BlockClosed => "block_closed",
            UpdaterErrorCode::RowOutsideBlock => "row_outside_block",
            UpdaterErrorCode::UnterminatedSql => "unterminated_sql",
            UpdaterErrorCode::Execution => "execution",
            UpdaterErrorCode::TransientExhausted => "transient_exhausted",
            UpdaterErrorCode::Allocation => "allocation",
            UpdaterErrorCode::ApplyFailed => "apply_failed",
        }
    }
}

/// Reasons a single `BEGIN_TABLE` block is rejected before any write.
///
/// Kept `Clone` so a failed block can carry its reason for later reporting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("cannot parse line: {line}")]
    Parse { line: String },
    #[error("cannot parse options: '{options}'")]
    Options { options: String },
    #[error("bad option key: '{key}'")]
    UnknownKey { key: String },
    #[error("bad {key} option value: '{value}'")]
    BadValue { key: String, value: String },
    #[error("bad date '{date}' in {line}")]
    BadDate { date: String, line: String },
    #[error("table {table} does not exist")]
    TableNotFound { table: String },
    #[error("block for table {table} has no rows")]
    Empty { table: String },
    #[error("block for table {table} is already applied or failed")]
    Closed { table: String },
}

impl BlockError {
    pub fn code(&self) -> UpdaterErrorCode {
        match self {
            BlockError::Parse { .. } | BlockError::Options { .. } => UpdaterErrorCode::Parse,
            BlockError::UnknownKey { .. } | BlockError::BadValue { .. } => {
                UpdaterErrorCode::BadOption
            }
            BlockError::BadDate { .. } => UpdaterErrorCode::BadDate,
            BlockError::TableNotFound { .. } => UpdaterErrorCode::TableNotFound,
            BlockError::Empty { .. } => UpdaterErrorCode::EmptyBlock,
            BlockError::Closed { .. } => UpdaterErrorCode::BlockClosed,
        }
    }
}

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("database unavailable with account info: {account}")]
    Unavailable { account: String },
    #[error("connected database is not authorising i.e. does not have a GLOBALSEQNO table")]
    NotAuthorising,
    #[error("failing update; {0}")]
    Block(#[from] BlockError),
    #[error("line {line_no}: data row outside of a BEGIN_TABLE block")]
    RowOutsideBlock { line_no: usize },
    #[error("line {line_no}: SQL statement is not terminated by ';': {statement}")]
    UnterminatedSql { line_no: usize, statement: String },
    #[error("statement failed with exit code {exit_code}: {statement}")]
    Execution {
        statement: String,
        exit_code: i32,
        output: Vec<String>,
    },
    #[error("client failed to execute the statement on all {attempts} attempts: {statement}")]
    TransientExhausted { attempts: u32, statement: String },
    #[error("failed to allocate a sequence number for {table}: {message}")]
    Allocation { table: String, message: String },
    #[error("update of {table} for validity range '{start_date}' - '{end_date}' failed: {source}")]
    ApplyFailed {
        table: String,
        start_date: String,
        end_date: String,
        #[source]
        source: Box<UpdaterError>,
    },
}

impl UpdaterError {
    pub fn code(&self) -> UpdaterErrorCode {
        match self {
            UpdaterError::Io(_) => UpdaterErrorCode::Io,
            UpdaterError::Spawn { .. } => UpdaterErrorCode::Spawn,
            UpdaterError::InvalidConfig { .. } => UpdaterErrorCode::InvalidConfig,
            UpdaterError::Unavailable { .. } => UpdaterErrorCode::Unavailable,
            UpdaterError::NotAuthorising => UpdaterErrorCode::NotAuthorising,
            UpdaterError::Block(err) => err.code(),
            UpdaterError::RowOutsideBlock { .. } => UpdaterErrorCode::RowOutsideBlock,
            UpdaterError::UnterminatedSql { .. } => UpdaterErrorCode::UnterminatedSql,
            UpdaterError::Execution { .. } => UpdaterErrorCode::Execution,
            UpdaterError::TransientExhausted { .. } => UpdaterErrorCode::TransientExhausted,
            UpdaterError::Allocation { .. } => UpdaterErrorCode::Allocation,
            UpdaterError::ApplyFailed { .. } => UpdaterErrorCode::ApplyFailed,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    /// Code of the innermost error, looking through `ApplyFailed` wrappers.
    pub fn root_code(&self) -> UpdaterErrorCode {
        match self {
            UpdaterError::ApplyFailed { source, .. } => source.root_code(),
            other => other.code(),
        }
    }
}
