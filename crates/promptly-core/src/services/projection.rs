//! Read-side projections over catalog aggregates.

use crate::domain::{AuthorCatalog, ProjectedItem, project};

/// Every entry of every catalog, merged with its author root.
pub fn flatten(catalogs: &[AuthorCatalog]) -> Vec<ProjectedItem> {
    catalogs
        .iter()
        .flat_map(|catalog| {
            let root = catalog.root();
            catalog
                .entries
                .iter()
                .map(move |item| project(item, &root))
        })
        .collect()
}

pub fn newest_first(items: &mut [ProjectedItem]) {
    items.sort_by(|a, b| b.item.created_at.cmp(&a.item.created_at));
}

/// Public feed: visible items, newest first, at most `limit`.
pub fn feed(catalogs: &[AuthorCatalog], limit: usize) -> Vec<ProjectedItem> {
    let mut items: Vec<ProjectedItem> = flatten(catalogs)
        .into_iter()
        .filter(|view| !view.item.is_hidden)
        .collect();
    newest_first(&mut items);
    items.truncate(limit);
    items
}

/// Keeps the requested items, ordered by *descending* position in `ids`:
/// the first requested id comes out last.
pub fn order_by_request(items: Vec<ProjectedItem>, ids: &[String]) -> Vec<ProjectedItem> {
    let position = |id: &str| ids.iter().position(|wanted| wanted == id);

    let mut ranked: Vec<(usize, ProjectedItem)> = items
        .into_iter()
        .filter_map(|view| position(view.id()).map(|rank| (rank, view)))
        .collect();
    ranked.sort_by(|(a, _), (b, _)| b.cmp(a));
    ranked.into_iter().map(|(_, view)| view).collect()
}
