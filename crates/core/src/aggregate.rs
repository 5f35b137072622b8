//! Progress summaries derived from the card collection.
//!
//! Every function here is pure and recomputes from its inputs; callers are
//! expected to pass the current snapshot rather than keep results around.

use std::collections::HashMap;

use crate::model::{Card, Category, CategorySummary, StudyTotals, TagSummary};

/// Summaries for each category, in the order `categories` was given.
///
/// Cards whose `category_id` matches no category are not counted anywhere.
#[must_use]
pub fn summarize_categories(cards: &[Card], categories: &[Category]) -> Vec<CategorySummary> {
    categories
        .iter()
        .map(|category| {
            let (card_count, studied_count) = cards
                .iter()
                .filter(|card| card.category_id == category.id)
                .fold((0, 0), |(total, studied), card| {
                    (total + 1, studied + usize::from(card.is_studied()))
                });
            CategorySummary {
                category: category.clone(),
                card_count,
                studied_count,
            }
        })
        .collect()
}

/// Summaries for every tag that appears on at least one card.
///
/// Entries come out in first-encounter order, which callers must not rely on.
#[must_use]
pub fn summarize_tags(cards: &[Card]) -> Vec<TagSummary> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut summaries: Vec<TagSummary> = Vec::new();

    for card in cards {
        let studied = usize::from(card.is_studied());
        for tag in card.distinct_tags() {
            let slot = *index.entry(tag).or_insert_with(|| {
                summaries.push(TagSummary {
                    name: tag.to_owned(),
                    card_count: 0,
                    studied_count: 0,
                });
                summaries.len() - 1
            });
            let summary = &mut summaries[slot];
            summary.card_count += 1;
            summary.studied_count += studied;
        }
    }

    summaries
}

#[must_use]
pub fn study_totals(cards: &[Card]) -> StudyTotals {
    StudyTotals {
        total_cards: cards.len(),
        studied_cards: cards.iter().filter(|card| card.is_studied()).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CardId, CategoryId};
    use crate::time::fixed_now;

    fn card(id: u64, category: u64, study_count: u32, tags: &[&str]) -> Card {
        Card {
            id: CardId::new(id),
            front: format!("Q{id}"),
            back: format!("A{id}"),
            category_id: CategoryId::new(category),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            study_count,
            next_study: None,
            created_at: fixed_now(),
        }
    }

    fn category(id: u64, name: &str) -> Category {
        Category {
            id: CategoryId::new(id),
            name: name.to_owned(),
            description: None,
            priority: 0,
            created_at: fixed_now(),
            created_by: None,
        }
    }

    #[test]
    fn spanish_category_counts_studied_cards() {
        let categories = vec![category(1, "Spanish")];
        let cards = vec![card(1, 1, 0, &[]), card(2, 1, 2, &[])];

        let summaries = summarize_categories(&cards, &categories);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].category.id, CategoryId::new(1));
        assert_eq!(summaries[0].category.name, "Spanish");
        assert_eq!(summaries[0].card_count, 2);
        assert_eq!(summaries[0].studied_count, 1);
    }

    #[test]
    fn category_summaries_partition_known_cards() {
        let categories = vec![category(2, "German"), category(1, "Spanish")];
        let cards = vec![
            card(1, 1, 0, &[]),
            card(2, 2, 1, &[]),
            card(3, 2, 0, &[]),
            card(4, 9, 3, &[]),
        ];

        let summaries = summarize_categories(&cards, &categories);

        let ids: Vec<_> = summaries.iter().map(|s| s.category.id.value()).collect();
        assert_eq!(ids, [2, 1]);
        let total: usize = summaries.iter().map(|s| s.card_count).sum();
        assert_eq!(total, 3);
        assert!(summaries.iter().all(|s| s.studied_count <= s.card_count));
    }

    #[test]
    fn card_with_two_tags_feeds_both_summaries() {
        let cards = vec![card(1, 1, 1, &["a", "b"]), card(2, 1, 0, &["b"])];

        let mut tags = summarize_tags(&cards);
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            tags,
            vec![
                TagSummary { name: "a".into(), card_count: 1, studied_count: 1 },
                TagSummary { name: "b".into(), card_count: 2, studied_count: 1 },
            ]
        );
    }

    #[test]
    fn duplicate_tag_on_one_card_counts_once() {
        let cards = vec![card(1, 1, 1, &["verbs", "verbs"])];

        let tags = summarize_tags(&cards);

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].card_count, 1);
        assert_eq!(tags[0].studied_count, 1);
    }

    #[test]
    fn empty_inputs_yield_empty_outputs() {
        assert!(summarize_categories(&[], &[]).is_empty());
        assert!(summarize_tags(&[]).is_empty());
        assert_eq!(study_totals(&[]), StudyTotals::default());
    }

    #[test]
    fn totals_count_studied_cards() {
        let cards = vec![card(1, 1, 0, &[]), card(2, 1, 4, &[]), card(3, 2, 1, &[])];
        assert_eq!(
            study_totals(&cards),
            StudyTotals { total_cards: 3, studied_cards: 2 }
        );
    }
}
