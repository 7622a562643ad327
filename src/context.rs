//! Unit-of-work style access to the Category set.
//!
//! A [`CategoryContext`] exposes a lazy, queryable view of all categories and
//! stages additions until [`save_changes`](CategoryContext::save_changes)
//! commits them together.
//!
//! ```
//! use category_odata::context::CategoryContext;
//! use category_odata::entity::NewCategory;
//! use category_odata::store::memory::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let mut context = CategoryContext::new(&store);
//! context.add(NewCategory::new("Books"));
//! context.add_range(vec![NewCategory::new("Toys"), NewCategory::new("Games")]);
//!
//! let saved = context.save_changes().unwrap();
//! assert_eq!(saved.len(), 3);
//! assert_eq!(context.categories().all().unwrap().len(), 3);
//! ```

use crate::entity::{Category, NewCategory, CATEGORY_SCHEMA};
use crate::executor::StorageError;
use crate::odata::ComposedQuery;
use crate::store::{CategoryStore, QueryPage};

/// Request-scoped context over a [`CategoryStore`].
pub struct CategoryContext<'s, S: CategoryStore + ?Sized> {
    store: &'s S,
    staged: Vec<NewCategory>,
}

impl<'s, S: CategoryStore + ?Sized> CategoryContext<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            staged: Vec::new(),
        }
    }

    /// Lazy query over the full set. Nothing runs until it is executed.
    pub fn categories(&self) -> CategoryQuery<'s, S> {
        CategoryQuery { store: self.store }
    }

    /// Stage one new category.
    pub fn add(&mut self, category: NewCategory) {
        self.staged.push(category);
    }

    /// Stage several new categories.
    pub fn add_range<I>(&mut self, categories: I)
    where
        I: IntoIterator<Item = NewCategory>,
    {
        self.staged.extend(categories);
    }

    /// Categories staged but not yet saved.
    pub fn staged(&self) -> &[NewCategory] {
        &self.staged
    }

    /// Persist every staged category in a single atomic write.
    ///
    /// On success the staging area is cleared and the saved rows are returned
    /// with their assigned ids. On failure nothing is persisted and the staged
    /// rows are kept, so the call can be retried.
    pub fn save_changes(&mut self) -> Result<Vec<Category>, StorageError> {
        if self.staged.is_empty() {
            return Ok(Vec::new());
        }
        let saved = self.store.insert_all(&self.staged)?;
        self.staged.clear();
        Ok(saved)
    }
}

/// Deferred query over the Category set.
pub struct CategoryQuery<'s, S: CategoryStore + ?Sized> {
    store: &'s S,
}

impl<S: CategoryStore + ?Sized> CategoryQuery<'_, S> {
    /// Run a composed query against the underlying store.
    pub fn execute(&self, query: &ComposedQuery) -> Result<QueryPage<Category>, StorageError> {
        self.store.fetch(query)
    }

    /// Size of the filtered set described by `query`.
    pub fn count(&self, query: &ComposedQuery) -> Result<u64, StorageError> {
        self.store.count(query)
    }

    /// Every category, ordered by key.
    pub fn all(&self) -> Result<Vec<Category>, StorageError> {
        Ok(self.execute(&ComposedQuery::unfiltered(&CATEGORY_SCHEMA))?.items)
    }
}
