//! Choosing which article a participant sees next.
//!
//! Nothing here is stored: the next article is recomputed from the
//! participant's responses on every call, so reloading a page can never
//! advance or rewind progress.

use rand::{seq::SliceRandom, Rng};

use crate::model::{db::participant::Responses, mongodb::Id};

use super::catalog::Catalog;

/// What a participant should be shown next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextArticle {
    /// An article that has not been rated yet.
    Article(Id),
    /// Every catalog article has been rated (or excluded).
    Complete,
}

/// Pick uniformly at random among the catalog articles that are neither rated
/// nor `exclude`d.
///
/// `exclude` keeps the article currently on screen out of the draw while its
/// rating is still in flight; the no-repeat guarantee itself comes from the
/// responses.
pub fn next_article<R: Rng + ?Sized>(
    responses: &Responses,
    catalog: &Catalog,
    exclude: Option<Id>,
    rng: &mut R,
) -> NextArticle {
    let remaining: Vec<Id> = catalog
        .ids()
        .filter(|id| !responses.is_rated(id) && Some(*id) != exclude)
        .collect();

    remaining
        .choose(rng)
        .copied()
        .map_or(NextArticle::Complete, NextArticle::Article)
}

/// Has every catalog article been rated? Orphaned responses don't count.
pub fn is_complete(responses: &Responses, catalog: &Catalog) -> bool {
    catalog.ids().all(|id| responses.is_rated(&id))
}

/// Can `article` still be offered to this participant?
pub fn is_eligible(article: &Id, responses: &Responses, catalog: &Catalog) -> bool {
    catalog.contains(article) && !responses.is_rated(article)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::{rngs::StdRng, SeedableRng};

    use crate::model::common::score::Score;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    fn score(value: i64) -> Score {
        Score::try_from(value).unwrap()
    }

    #[test]
    fn empty_catalog_is_complete() {
        let catalog = Catalog::default();
        let responses = Responses::default();
        let mut rng = rng();
        assert_eq!(
            next_article(&responses, &catalog, None, &mut rng),
            NextArticle::Complete
        );
        assert!(is_complete(&responses, &catalog));
    }

    #[test]
    fn two_article_walk() {
        let catalog = Catalog::example(2);
        let ids: Vec<Id> = catalog.ids().collect();
        let (a, b) = (ids[0], ids[1]);
        let mut responses = Responses::default();
        let mut rng = rng();

        let first = next_article(&responses, &catalog, None, &mut rng);
        assert!(first == NextArticle::Article(a) || first == NextArticle::Article(b));

        responses.record(a, score(4));
        for _ in 0..20 {
            assert_eq!(
                next_article(&responses, &catalog, None, &mut rng),
                NextArticle::Article(b)
            );
        }

        responses.record(b, score(2));
        assert_eq!(
            next_article(&responses, &catalog, None, &mut rng),
            NextArticle::Complete
        );
        assert!(is_complete(&responses, &catalog));
    }

    #[test]
    fn never_offers_rated_articles() {
        let catalog = Catalog::example(6);
        let ids: Vec<Id> = catalog.ids().collect();
        let responses: Responses = ids[..4].iter().map(|id| (*id, score(3))).collect();
        let mut rng = rng();

        for _ in 0..200 {
            match next_article(&responses, &catalog, None, &mut rng) {
                NextArticle::Article(id) => assert!(id == ids[4] || id == ids[5]),
                NextArticle::Complete => panic!("two articles are still unrated"),
            }
        }
    }

    #[test]
    fn walk_visits_every_article_once() {
        let catalog = Catalog::example(10);
        let mut responses = Responses::default();
        let mut rng = rng();
        let mut seen = Vec::new();

        while let NextArticle::Article(id) = next_article(&responses, &catalog, None, &mut rng) {
            assert!(!seen.contains(&id));
            seen.push(id);
            assert!(responses.record(id, score(1)));
            assert!(responses.len() <= catalog.len());
        }

        assert_eq!(seen.len(), catalog.len());
        for _ in 0..5 {
            assert_eq!(
                next_article(&responses, &catalog, None, &mut rng),
                NextArticle::Complete
            );
        }
    }

    #[test]
    fn excluded_article_is_skipped() {
        let catalog = Catalog::example(3);
        let ids: Vec<Id> = catalog.ids().collect();
        let responses = Responses::default();
        let mut rng = rng();

        for _ in 0..100 {
            let next = next_article(&responses, &catalog, Some(ids[1]), &mut rng);
            assert_ne!(next, NextArticle::Article(ids[1]));
            assert_ne!(next, NextArticle::Complete);
        }
    }

    #[test]
    fn excluding_the_last_article_completes() {
        let catalog = Catalog::example(2);
        let ids: Vec<Id> = catalog.ids().collect();
        let responses: Responses = [(ids[0], score(5))].into_iter().collect();
        let mut rng = rng();

        assert_eq!(
            next_article(&responses, &catalog, Some(ids[1]), &mut rng),
            NextArticle::Complete
        );
        // Excluding doesn't make the participant complete.
        assert!(!is_complete(&responses, &catalog));
    }

    #[test]
    fn orphaned_responses_are_ignored() {
        let catalog = Catalog::example(2);
        let ids: Vec<Id> = catalog.ids().collect();
        let orphan = Id::new();
        let responses: Responses = [(orphan, score(2)), (ids[0], score(3))]
            .into_iter()
            .collect();
        let mut rng = rng();

        assert_eq!(
            next_article(&responses, &catalog, None, &mut rng),
            NextArticle::Article(ids[1])
        );
        assert!(!is_complete(&responses, &catalog));
        assert!(!is_eligible(&orphan, &responses, &catalog));
    }

    #[test]
    fn eligibility() {
        let catalog = Catalog::example(2);
        let ids: Vec<Id> = catalog.ids().collect();
        let responses: Responses = [(ids[0], score(2))].into_iter().collect();

        assert!(!is_eligible(&ids[0], &responses, &catalog));
        assert!(is_eligible(&ids[1], &responses, &catalog));
        assert!(!is_eligible(&Id::new(), &responses, &catalog));
    }

    #[test]
    fn selection_is_roughly_uniform() {
        let catalog = Catalog::example(4);
        let responses = Responses::default();
        let mut rng = rng();
        let mut counts: HashMap<Id, usize> = HashMap::new();

        for _ in 0..4000 {
            if let NextArticle::Article(id) = next_article(&responses, &catalog, None, &mut rng) {
                *counts.entry(id).or_default() += 1;
            }
        }

        assert_eq!(counts.len(), 4);
        for count in counts.values() {
            assert!((800..=1200).contains(count), "{count}");
        }
    }
}
