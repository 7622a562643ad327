//! Synthetic category data.

use crate::context::CategoryContext;
use crate::entity::{Category, NewCategory};
use crate::executor::StorageError;
use crate::store::CategoryStore;
use fake::{Dummy, Fake, Faker};
use rand::seq::SliceRandom;
use rand::Rng;

/// Rows added by one call to the seed endpoint.
pub const DEFAULT_SEED_COUNT: usize = 100;

/// Commercial department names.
pub const DEPARTMENTS: &[&str] = &[
    "Books",
    "Movies",
    "Music",
    "Games",
    "Electronics",
    "Computers",
    "Home",
    "Garden",
    "Tools",
    "Grocery",
    "Health",
    "Beauty",
    "Toys",
    "Kids",
    "Baby",
    "Clothing",
    "Shoes",
    "Jewelery",
    "Sports",
    "Outdoors",
    "Automotive",
    "Industrial",
];

/// Faker for a commercial category name, e.g. `"Garden"`.
pub struct CommerceCategory;

impl Dummy<CommerceCategory> for String {
    fn dummy_with_rng<R: Rng + ?Sized>(_: &CommerceCategory, rng: &mut R) -> Self {
        DEPARTMENTS.choose(rng).copied().unwrap_or("Books").to_string()
    }
}

/// Stage `count` fake categories on `context` and commit them in one go.
///
/// Returns the inserted rows with their storage-assigned ids. Nothing is
/// deduplicated against earlier calls.
pub fn seed_categories<S>(
    context: &mut CategoryContext<'_, S>,
    count: usize,
) -> Result<Vec<Category>, StorageError>
where
    S: CategoryStore + ?Sized,
{
    context.add_range((0..count).map(|_| Faker.fake::<NewCategory>()));
    let inserted = context.save_changes()?;
    log::info!("Seeded {} categories", inserted.len());
    Ok(inserted)
}
