pub mod application;
pub mod article;
pub mod calendar;
pub mod filter;
pub mod photo;
pub mod profile;
pub mod record;
pub mod repository;
pub mod tag_utils;

pub use application::{Application, Platforms};
pub use article::Article;
pub use calendar::CalendarEvent;
pub use filter::QueryFilter;
pub use photo::Photo;
pub use profile::Profile;
pub use record::{classify_kind, IdentityKey, KindClass, Record};
pub use repository::Repository;
