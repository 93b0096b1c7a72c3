use frag_registry::Fragment;
use frag_types::{default_fragment_name, TypeError};
use serde::{Deserialize, Serialize};

/// Records per page when a filter does not say.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Selects managed objects for a query.
///
/// All parts are optional and combine with AND. The query expression is
/// handed to the store verbatim; this type never parses it.
///
/// ```ignore
/// let filter = InventoryFilter::by_fragment::<CustomDevice>()?
///     .with_query("@cookbook_CustomDevice.manufacturer eq 'Acme Corp'")
///     .page_size(20);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_type: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

impl InventoryFilter {
    /// Matches every object.
    pub fn all() -> Self {
        Self::default()
    }

    /// Objects carrying a fragment with this name.
    pub fn by_fragment_type(name: impl Into<String>) -> Self {
        Self::default().with_fragment_type(name)
    }

    /// Objects carrying a `T` under its default fragment name.
    pub fn by_fragment<T: Fragment>() -> Result<Self, TypeError> {
        Ok(Self::by_fragment_type(default_fragment_name(&T::type_tag())?))
    }

    /// Objects whose `type` attribute equals `type_`.
    pub fn by_type(type_: impl Into<String>) -> Self {
        Self::default().with_type(type_)
    }

    /// Objects matching a store query expression.
    pub fn by_query(query: impl Into<String>) -> Self {
        Self::default().with_query(query)
    }

    pub fn with_fragment_type(mut self, name: impl Into<String>) -> Self {
        self.fragment_type = Some(name.into());
        self
    }

    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}
