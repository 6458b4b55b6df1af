use derive_setters::Setters;
use polars::error::PolarsError;
use thiserror::Error;
use url::Url;

pub const ITEMS_PER_PAGE: u32 = 20;
pub const LOCAL_PAGE_SIZE: usize = 10;
pub const TOTAL_COUNT_RESPONSE_HEADER: &str = "X-Total-Count";
pub const PAGE_PARAM: &str = "page";
pub const SORT_PARAM: &str = "sort";
pub const ASC: &str = "asc";
pub const DESC: &str = "desc";
pub const DEFAULT_SORT: &str = "id,asc";
pub const CONTACTS_RESOURCE: &str = "api/contacts";

pub const HELP_TEXT: &str = "\
q       quit
↑ ↓     move selection
n p     next / previous server page
] [     next / previous local page
g G     first / last local page (Home / End)
s       toggle server sort on the selected column
a z     local sort ascending / descending
/       free-text filter
f       add filter (name=value, e.g. nom.contains=dup; -name=value removes)
x       clear filters
d       delete the selected contact
r       reload the current page
b       back to the previous query
e       export rows to a file
y       copy the selected row
?       this help
Esc     clear the search and local sort, close popups
";

#[derive(Debug, Error)]
pub enum ListError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend rejected the request ({status}): {message}")]
    BackendRejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("contact {0} not found")]
    NotFound(i64),

    #[error("nothing to export")]
    EmptyExport,

    #[error("unknown file type: {0}")]
    UnknownFileType(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl ListError {
    pub fn user_message(&self) -> String {
        match self {
            Self::BackendUnavailable(_) => "Loading failed: the server could not be reached.".into(),
            Self::BackendRejected { status, .. } => format!("Loading failed: server answered {status}."),
            Self::MalformedResponse(_) => "Loading failed: unexpected server response.".into(),
            Self::NotFound(id) => format!("Contact {id} does not exist."),
            Self::EmptyExport => "Nothing to export.".into(),
            other => other.to_string(),
        }
    }

    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::BackendRejected { .. } | Self::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for ListError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::BackendRejected {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::BackendUnavailable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ListError>;

/// Columns the list view can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Nom,
    Prenom,
    Age,
    Address,
    Action,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Id,
        Column::Nom,
        Column::Prenom,
        Column::Age,
        Column::Address,
        Column::Action,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Nom => "nom",
            Column::Prenom => "prenom",
            Column::Age => "age",
            Column::Address => "address",
            Column::Action => "action",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Id | Column::Age)
    }

    /// The action column is a placeholder and cannot be sorted on the server.
    pub fn is_sortable(&self) -> bool {
        !matches!(self, Column::Action)
    }
}

pub fn default_columns() -> Vec<Column> {
    vec![
        Column::Nom,
        Column::Prenom,
        Column::Age,
        Column::Address,
        Column::Action,
    ]
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ListConfig {
    pub api_url: Url,
    pub items_per_page: u32,
    pub local_page_size: usize,
    pub columns: Vec<Column>,
    #[setters(strip_option)]
    pub route_default_sort: Option<String>,
    pub honor_route_default_sort: bool,
    pub export_delimiter: char,
    pub event_poll_time: u64,
    pub request_timeout: u64,
}

impl ListConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            items_per_page: ITEMS_PER_PAGE,
            local_page_size: LOCAL_PAGE_SIZE,
            columns: default_columns(),
            route_default_sort: None,
            honor_route_default_sort: false,
            export_delimiter: ',',
            event_poll_time: 100,
            request_timeout: 30,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.items_per_page == 0 {
            return Err(ListError::InvalidConfig("page size must be positive".into()));
        }
        if self.local_page_size == 0 {
            return Err(ListError::InvalidConfig("local page size must be positive".into()));
        }
        if self.columns.is_empty() {
            return Err(ListError::InvalidConfig("at least one column is required".into()));
        }
        Ok(())
    }

}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    FreeText,
    AddFilter,
    Export,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    NextLocalPage,
    PrevLocalPage,
    FirstLocalPage,
    LastLocalPage,
    ToggleServerSort,
    SortAscending,
    SortDescending,
    Search,
    Filter,
    ClearFilters,
    Delete,
    Reload,
    Back,
    Export,
    CopyRow,
    Help,
    Enter,
    Exit,
    Resize(usize, usize),
    RawKey(ratatui::crossterm::event::KeyEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ListConfig {
        ListConfig::new(Url::parse("http://localhost:8080/").unwrap())
    }

    #[test]
    fn validate_rejects_zero_page_sizes() {
        assert!(config().validate().is_ok());
        assert!(matches!(
            config().with_items_per_page(0).validate(),
            Err(ListError::InvalidConfig(_))
        ));
        assert!(matches!(
            config().with_local_page_size(0).validate(),
            Err(ListError::InvalidConfig(_))
        ));
    }

    #[test]
    fn backend_errors_are_classified() {
        assert!(ListError::BackendUnavailable("down".into()).is_backend());
        assert!(ListError::BackendRejected { status: 400, message: String::new() }.is_backend());
        assert!(!ListError::EmptyExport.is_backend());
        assert_eq!(
            ListError::BackendRejected { status: 500, message: String::new() }.user_message(),
            "Loading failed: server answered 500."
        );
    }
}
