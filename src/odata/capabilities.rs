//! Query capability declarations.

/// Which query options a collection endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCapabilities {
    pub filter: bool,
    pub order_by: bool,
    pub select: bool,
    pub expand: bool,
    pub count: bool,
    pub top: bool,
    /// Upper bound for `$top`; `None` means unbounded.
    pub max_top: Option<u64>,
    pub skip: bool,
}

impl QueryCapabilities {
    /// Every option allowed, `$top` unbounded.
    pub const fn all() -> Self {
        Self {
            filter: true,
            order_by: true,
            select: true,
            expand: true,
            count: true,
            top: true,
            max_top: None,
            skip: true,
        }
    }

    pub const fn without_select(self) -> Self {
        Self { select: false, ..self }
    }
}

/// `/odata/Categories`: everything except `$select`, no page-size cap.
pub const CATEGORY_CAPABILITIES: QueryCapabilities = QueryCapabilities::all().without_select();
