mod card;
mod category;
mod ids;
mod summary;
mod tag;

pub use ids::{CardId, CategoryId, ParseIdError};

pub use card::Card;
pub use category::Category;
pub use summary::{CategorySummary, StudyTotals, TagSummary};
pub use tag::{TagError, TagName};
