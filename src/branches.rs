use crate::models::{Branch, BranchId};
use crate::store::Store;
use anyhow::Result;

/// Branch directory lookups. Missing books or branches read as empty, never
/// as errors.
#[derive(Debug, Clone)]
pub struct Branches {
    store: Store,
}

impl Branches {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Branch ids holding an available copy of the book, from the book's
    /// embedded copy list.
    pub async fn available_branches(&self, book_id: &str) -> Result<Vec<BranchId>> {
        let Some(book) = self.store.book_get(book_id).await? else {
            return Ok(Vec::new());
        };

        Ok(book
            .copies
            .iter()
            .filter(|copy| copy.available)
            .map(|copy| copy.branch_id)
            .collect())
    }

    /// Display metadata for a set of branch ids; unresolved ids are omitted.
    pub async fn branches_get(&self, ids: &[BranchId]) -> Result<Vec<Branch>> {
        self.store.branches_get(ids).await
    }
}

#[cfg(test)]
mod test {
    use super::Branches;
    use crate::models::{Book, Branch, BranchCopy};
    use crate::store::{Seed, Store};

    fn branches() -> Branches {
        let store = Store::new();
        store
            .apply_seed(Seed {
                books: vec![Book {
                    id: "b1".into(),
                    title: "Moby Dick".into(),
                    genres: vec!["classics".into()],
                    pages: 635,
                    copies: vec![
                        BranchCopy {
                            branch_id: 1,
                            available: true,
                        },
                        BranchCopy {
                            branch_id: 2,
                            available: false,
                        },
                        BranchCopy {
                            branch_id: 3,
                            available: true,
                        },
                    ],
                }],
                perpus: vec![
                    Branch {
                        id: 1,
                        name: "Central Library".into(),
                    },
                    Branch {
                        id: 3,
                        name: "East Branch".into(),
                    },
                ],
                ..Seed::default()
            })
            .unwrap();
        Branches::new(store)
    }

    #[actix_web::test]
    async fn test_available_branches_filters_on_flag() {
        let branches = branches();
        let ids = branches.available_branches("b1").await.unwrap();
        assert_eq!(ids, vec![1, 3]);
    }

    #[actix_web::test]
    async fn test_missing_book_reads_as_empty() {
        let branches = branches();
        let ids = branches.available_branches("nope").await.unwrap();
        assert!(ids.is_empty());
    }

    #[actix_web::test]
    async fn test_unresolved_branch_ids_are_skipped() {
        let branches = branches();
        let ids = branches.available_branches("b1").await.unwrap();
        // branch 3 resolves, the unseeded id does not
        let resolved = branches.branches_get(&ids).await.unwrap();
        let names: Vec<_> = resolved.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Central Library", "East Branch"]);
    }
}
