pub mod trello;

pub use trello::{TrelloClient, TrelloCredentials};
