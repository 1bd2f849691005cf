mod news;
mod profiles;
mod traits;

pub use news::SqliteNewsRepository;
pub use profiles::SqliteProfileRepository;
pub use traits::{
    NewsOrder, NewsQuery, NewsQueryResult, NewsRepository, ProfileRepository,
};
